//! Storage abstraction layer for the dependency graph.
//!
//! This module provides the core storage trait and factory for creating
//! storage backends:
//!
//! - **In-memory**: Fast, ephemeral storage backed by HashMap and petgraph
//! - **JSONL**: The in-memory graph, persisted to a JSON Lines file
//!
//! # Architecture
//!
//! The storage layer is an async trait. It is object-safe, allowing for
//! dynamic dispatch via `Box<dyn DependencyStorage>`. Every operation takes
//! the [`Caller`] explicitly: queries from an anonymous caller see nothing,
//! mutations from one fail with [`Error::Unauthorized`](crate::error::Error::Unauthorized).
//!
//! Tasks are not stored here. Backends look them up through a shared
//! [`TaskDirectory`].
//!
//! # Test Utilities
//!
//! This module provides a [`MockStorage`] implementation for testing code that
//! depends on the [`DependencyStorage`] trait. To use it in your tests, enable
//! the `test-util` feature:
//!
//! ```toml
//! [dev-dependencies]
//! taskdeps = { version = "...", features = ["test-util"] }
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use taskdeps::domain::{Caller, TaskId};
//! use taskdeps::storage::{StorageBackend, create_storage};
//! use taskdeps::tasks::InMemoryTaskDirectory;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let tasks = Arc::new(InMemoryTaskDirectory::new());
//!     let mut storage = create_storage(StorageBackend::InMemory, tasks).await?;
//!
//!     let caller = Caller::user("alice");
//!     let id = storage
//!         .create(&caller, &TaskId::new("write-report"), &TaskId::new("collect-data"))
//!         .await?;
//!     println!("Created dependency: {id}");
//!
//!     Ok(())
//! }
//! ```

use crate::domain::{Caller, Dependency, DependencyId, DependencyMap, LinkedTask, Task, TaskId};
use crate::error::Result;
use crate::jsonl::FileLock;
use crate::tasks::TaskDirectory;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// Storage backend implementations
pub mod in_memory;

pub use in_memory::LoadWarning;

/// Core storage trait for the dependency graph.
///
/// Implementations must be `Send + Sync` to support concurrent access in
/// async contexts.
///
/// # Method Categories
///
/// - **Mutations**: `create`, `remove`, `remove_by_id`
/// - **Queries**: `get`, `list`, `would_create_cycle`, `get_blockers_for_task`,
///   `get_blocked_by_task`, `get_dependencies_for_tasks_batch`,
///   `get_available_blockers`
/// - **Batch Operations**: `import_dependencies`, `export_all`
/// - **Persistence**: `save`, `reload`
///
/// # Invariants
///
/// After every successful mutation, for each owner:
/// - no edge links a task to itself
/// - at most one edge exists per ordered `(blocking, blocked)` pair
/// - the edges form no cycle
/// - both endpoints of an edge share a project and are owned by the edge's owner
#[async_trait]
pub trait DependencyStorage: Send + Sync {
    // ========== Mutations ==========

    /// Record that `blocking` must finish before `blocked` can start.
    ///
    /// Checks run in a fixed order and the first failure is returned. A
    /// failed call leaves the graph unchanged.
    ///
    /// # Errors
    ///
    /// In order of precedence:
    /// - `Error::Unauthorized` if the caller is anonymous
    /// - `Error::SelfDependency` if `blocked == blocking`
    /// - `Error::BlockedTaskNotFound` / `Error::BlockingTaskNotFound` if a
    ///   task is missing or owned by someone else
    /// - `Error::ProjectMismatch` if the tasks are in different projects
    /// - `Error::DuplicateDependency` if the edge already exists
    /// - `Error::CircularDependency` if the edge would close a cycle
    async fn create(
        &mut self,
        caller: &Caller,
        blocked: &TaskId,
        blocking: &TaskId,
    ) -> Result<DependencyId>;

    /// Remove the edge `blocking -> blocked` owned by the caller.
    ///
    /// # Errors
    ///
    /// - `Error::Unauthorized` if the caller is anonymous, or only another
    ///   user owns such an edge
    /// - `Error::DependencyNotFound` if no such edge exists
    async fn remove(&mut self, caller: &Caller, blocked: &TaskId, blocking: &TaskId) -> Result<()>;

    /// Remove an edge by id.
    ///
    /// # Errors
    ///
    /// - `Error::Unauthorized` if the caller is anonymous or does not own the edge
    /// - `Error::DependencyNotFound` if no edge has this id
    async fn remove_by_id(&mut self, caller: &Caller, id: &DependencyId) -> Result<()>;

    // ========== Queries ==========

    /// Get an edge by id. Edges owned by someone else are reported as `None`.
    async fn get(&self, caller: &Caller, id: &DependencyId) -> Result<Option<Dependency>>;

    /// All edges the caller owns, oldest first.
    async fn list(&self, caller: &Caller) -> Result<Vec<Dependency>>;

    /// Whether adding `blocking -> blocked` would create a cycle in the
    /// caller's graph.
    async fn would_create_cycle(
        &self,
        caller: &Caller,
        blocked: &TaskId,
        blocking: &TaskId,
    ) -> Result<bool>;

    /// Direct blockers of `task`, oldest edge first.
    ///
    /// Edges whose blocking task no longer exists are skipped.
    async fn get_blockers_for_task(&self, caller: &Caller, task: &TaskId) -> Result<Vec<LinkedTask>>;

    /// Tasks directly blocked by `task`, oldest edge first.
    async fn get_blocked_by_task(&self, caller: &Caller, task: &TaskId) -> Result<Vec<LinkedTask>>;

    /// Blocker and blocked ids for several tasks at once.
    ///
    /// Every requested id is a key of the result, with empty lists if it
    /// has no edges. An anonymous caller gets an empty map.
    async fn get_dependencies_for_tasks_batch(
        &self,
        caller: &Caller,
        task_ids: &[TaskId],
    ) -> Result<DependencyMap>;

    /// Tasks that could be added as a blocker of `task` right now.
    ///
    /// `candidate` is in the result exactly when
    /// `create(caller, task, candidate)` would succeed.
    async fn get_available_blockers(&self, caller: &Caller, task: &TaskId) -> Result<Vec<Task>>;

    // ========== Batch Operations ==========

    /// Import edges, re-checking the graph invariants one by one.
    ///
    /// Offending edges are skipped and reported, the rest are kept.
    async fn import_dependencies(&mut self, dependencies: Vec<Dependency>) -> Result<Vec<LoadWarning>>;

    /// Every edge of every owner, suitable for JSONL export.
    async fn export_all(&self) -> Result<Vec<Dependency>>;

    // ========== Persistence ==========

    /// Save changes to persistent storage.
    ///
    /// Takes `&self` so a save can follow read-only work; implementations
    /// use interior mutability. No-op for pure in-memory storage, and for
    /// file storage whose mutations have already been written.
    async fn save(&self) -> Result<()>;

    /// Reload state from persistent storage, discarding in-memory changes.
    ///
    /// Long-running processes call this after a failed `save()` so memory
    /// and disk agree again. No-op for pure in-memory storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing file cannot be read.
    async fn reload(&mut self) -> Result<()>;
}

/// Storage backend configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// In-memory storage (ephemeral)
    InMemory,

    /// JSONL file storage (persistent)
    Jsonl(PathBuf),
}

impl StorageBackend {
    /// Returns the data file path for file-based backends.
    pub fn data_path(&self) -> Option<&Path> {
        match self {
            StorageBackend::Jsonl(path) => Some(path),
            StorageBackend::InMemory => None,
        }
    }
}

/// Wrapper that adds JSONL file persistence to the in-memory graph.
///
/// Mutations write through. Each one takes the file lock, re-reads the
/// file, applies the change to that fresh graph and writes it back before
/// releasing the lock. Another process sharing the file therefore either
/// sees a committed edge or waits for it, and never overwrites it.
struct JsonlBackedStorage {
    inner: Box<dyn DependencyStorage>,
    path: PathBuf,
    tasks: Arc<dyn TaskDirectory>,
}

impl JsonlBackedStorage {
    async fn load(path: PathBuf, tasks: Arc<dyn TaskDirectory>) -> Result<Self> {
        let inner = load_or_empty(&path, Arc::clone(&tasks)).await?;
        Ok(Self { inner, path, tasks })
    }

    /// Take the file lock and replace the graph with what is on disk.
    async fn lock_and_refresh(&mut self) -> Result<FileLock> {
        let lock = FileLock::acquire(&self.path).await?;
        self.inner = load_or_empty(&self.path, Arc::clone(&self.tasks)).await?;
        Ok(lock)
    }

    /// Write the graph while `_lock` is held. A failed write restores the
    /// on-disk state so memory never holds an edge the file lacks.
    async fn commit(&mut self, _lock: &FileLock) -> Result<()> {
        if let Err(save_error) = in_memory::save_to_jsonl(self.inner.as_ref(), &self.path).await {
            tracing::warn!(error = %save_error, "Write failed, restoring graph from disk");
            match load_or_empty(&self.path, Arc::clone(&self.tasks)).await {
                Ok(inner) => self.inner = inner,
                Err(reload_error) => {
                    tracing::warn!(error = %reload_error, "Reload after failed write also failed");
                }
            }
            return Err(save_error);
        }
        Ok(())
    }
}

async fn load_or_empty(
    path: &Path,
    tasks: Arc<dyn TaskDirectory>,
) -> Result<Box<dyn DependencyStorage>> {
    if !path.exists() {
        // First run: nothing saved yet
        return Ok(in_memory::new_in_memory_storage(tasks));
    }

    let (storage, warnings) = in_memory::load_from_jsonl(path, tasks).await?;
    for warning in &warnings {
        // Storage is still usable, the offending records were skipped
        tracing::warn!(warning = ?warning, "JSONL load warning");
    }
    Ok(storage)
}

#[async_trait]
impl DependencyStorage for JsonlBackedStorage {
    async fn create(
        &mut self,
        caller: &Caller,
        blocked: &TaskId,
        blocking: &TaskId,
    ) -> Result<DependencyId> {
        let lock = self.lock_and_refresh().await?;
        let id = self.inner.create(caller, blocked, blocking).await?;
        self.commit(&lock).await?;
        Ok(id)
    }

    async fn remove(&mut self, caller: &Caller, blocked: &TaskId, blocking: &TaskId) -> Result<()> {
        let lock = self.lock_and_refresh().await?;
        self.inner.remove(caller, blocked, blocking).await?;
        self.commit(&lock).await
    }

    async fn remove_by_id(&mut self, caller: &Caller, id: &DependencyId) -> Result<()> {
        let lock = self.lock_and_refresh().await?;
        self.inner.remove_by_id(caller, id).await?;
        self.commit(&lock).await
    }

    async fn get(&self, caller: &Caller, id: &DependencyId) -> Result<Option<Dependency>> {
        self.inner.get(caller, id).await
    }

    async fn list(&self, caller: &Caller) -> Result<Vec<Dependency>> {
        self.inner.list(caller).await
    }

    async fn would_create_cycle(
        &self,
        caller: &Caller,
        blocked: &TaskId,
        blocking: &TaskId,
    ) -> Result<bool> {
        self.inner.would_create_cycle(caller, blocked, blocking).await
    }

    async fn get_blockers_for_task(&self, caller: &Caller, task: &TaskId) -> Result<Vec<LinkedTask>> {
        self.inner.get_blockers_for_task(caller, task).await
    }

    async fn get_blocked_by_task(&self, caller: &Caller, task: &TaskId) -> Result<Vec<LinkedTask>> {
        self.inner.get_blocked_by_task(caller, task).await
    }

    async fn get_dependencies_for_tasks_batch(
        &self,
        caller: &Caller,
        task_ids: &[TaskId],
    ) -> Result<DependencyMap> {
        self.inner
            .get_dependencies_for_tasks_batch(caller, task_ids)
            .await
    }

    async fn get_available_blockers(&self, caller: &Caller, task: &TaskId) -> Result<Vec<Task>> {
        self.inner.get_available_blockers(caller, task).await
    }

    async fn import_dependencies(&mut self, dependencies: Vec<Dependency>) -> Result<Vec<LoadWarning>> {
        let lock = self.lock_and_refresh().await?;
        let warnings = self.inner.import_dependencies(dependencies).await?;
        self.commit(&lock).await?;
        Ok(warnings)
    }

    async fn export_all(&self) -> Result<Vec<Dependency>> {
        self.inner.export_all().await
    }

    async fn save(&self) -> Result<()> {
        // Every mutation was committed under the file lock
        Ok(())
    }

    async fn reload(&mut self) -> Result<()> {
        // A missing file resets to empty storage
        self.inner = load_or_empty(&self.path, Arc::clone(&self.tasks)).await?;
        Ok(())
    }
}

/// Create a storage instance for the given backend.
///
/// # Arguments
///
/// * `backend` - The storage backend to use
/// * `tasks` - Task lookups shared with the rest of the application
///
/// # Errors
///
/// - `Error::Io` if the JSONL file exists but cannot be read
pub async fn create_storage(
    backend: StorageBackend,
    tasks: Arc<dyn TaskDirectory>,
) -> Result<Box<dyn DependencyStorage>> {
    match backend {
        StorageBackend::InMemory => Ok(in_memory::new_in_memory_storage(tasks)),
        StorageBackend::Jsonl(path) => Ok(Box::new(JsonlBackedStorage::load(path, tasks).await?)),
    }
}

// ========== Test Utilities ==========

/// The hardcoded dependency ID returned by [`MockStorage`].
#[cfg(any(test, feature = "test-util"))]
pub const MOCK_DEPENDENCY_ID: &str = "dep-mock0001";

/// Stateless mock implementation of [`DependencyStorage`] for testing.
///
/// # Behavior
///
/// - `create`: Always returns [`MOCK_DEPENDENCY_ID`]
/// - `remove`, `remove_by_id`: Always succeed
/// - Queries: Return empty results; `would_create_cycle` is always `false`
/// - Batch and persistence operations: No-ops
///
/// Use [`in_memory::new_in_memory_storage`] when a test needs a real graph.
#[cfg(any(test, feature = "test-util"))]
#[derive(Clone, Copy, Default)]
#[non_exhaustive]
pub struct MockStorage;

#[cfg(any(test, feature = "test-util"))]
impl MockStorage {
    /// Create a new MockStorage instance.
    pub fn new() -> Self {
        Self
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl DependencyStorage for MockStorage {
    async fn create(
        &mut self,
        _caller: &Caller,
        _blocked: &TaskId,
        _blocking: &TaskId,
    ) -> Result<DependencyId> {
        Ok(DependencyId::new(MOCK_DEPENDENCY_ID))
    }

    async fn remove(&mut self, _caller: &Caller, _blocked: &TaskId, _blocking: &TaskId) -> Result<()> {
        Ok(())
    }

    async fn remove_by_id(&mut self, _caller: &Caller, _id: &DependencyId) -> Result<()> {
        Ok(())
    }

    async fn get(&self, _caller: &Caller, _id: &DependencyId) -> Result<Option<Dependency>> {
        Ok(None)
    }

    async fn list(&self, _caller: &Caller) -> Result<Vec<Dependency>> {
        Ok(vec![])
    }

    async fn would_create_cycle(
        &self,
        _caller: &Caller,
        _blocked: &TaskId,
        _blocking: &TaskId,
    ) -> Result<bool> {
        Ok(false)
    }

    async fn get_blockers_for_task(&self, _caller: &Caller, _task: &TaskId) -> Result<Vec<LinkedTask>> {
        Ok(vec![])
    }

    async fn get_blocked_by_task(&self, _caller: &Caller, _task: &TaskId) -> Result<Vec<LinkedTask>> {
        Ok(vec![])
    }

    async fn get_dependencies_for_tasks_batch(
        &self,
        _caller: &Caller,
        _task_ids: &[TaskId],
    ) -> Result<DependencyMap> {
        Ok(DependencyMap::new())
    }

    async fn get_available_blockers(&self, _caller: &Caller, _task: &TaskId) -> Result<Vec<Task>> {
        Ok(vec![])
    }

    async fn import_dependencies(&mut self, _dependencies: Vec<Dependency>) -> Result<Vec<LoadWarning>> {
        Ok(vec![])
    }

    async fn export_all(&self) -> Result<Vec<Dependency>> {
        Ok(vec![])
    }

    async fn save(&self) -> Result<()> {
        Ok(())
    }

    async fn reload(&mut self) -> Result<()> {
        // MockStorage has no backing store, so reload is a no-op
        Ok(())
    }
}
