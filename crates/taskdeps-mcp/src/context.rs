//! Workspace context management for the MCP server.
//!
//! This module handles:
//! - Workspace detection (walking up to find `.taskdeps/`)
//! - Path canonicalization
//! - Per-workspace storage and identity
//!
//! # Lock Ordering
//!
//! When using `Context` with `Tools`, locks must be acquired in this order:
//! 1. `Context` read/write lock (via `Arc<RwLock<Context>>`)
//! 2. Storage read/write lock (via `Arc<RwLock<Box<dyn DependencyStorage>>>`)
//!
//! Never attempt to acquire a context lock while holding a storage lock.

use crate::error::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use taskdeps::app::App;
use taskdeps::commands::init::TASKDEPS_DIR_NAME;
use taskdeps::domain::Caller;
use taskdeps::storage::DependencyStorage;
use tokio::sync::RwLock;
use tracing::debug;

/// Maximum number of cached workspaces.
///
/// When this limit is reached, the oldest workspace is evicted from cache.
const MAX_CACHED_WORKSPACES: usize = 32;

/// Shared handle to one workspace's storage.
pub type SharedStorage = Arc<RwLock<Box<dyn DependencyStorage>>>;

/// A loaded workspace: its storage and who tool calls act as.
#[derive(Clone)]
pub struct Workspace {
    /// Storage for the workspace's dependency graph.
    pub storage: SharedStorage,

    /// Identity every tool call in this workspace runs as.
    pub caller: Caller,

    /// Path of the dependencies file, `None` for in-memory storage.
    pub dependencies_path: Option<PathBuf>,

    /// Path of the tasks file.
    pub tasks_path: PathBuf,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("caller", &self.caller)
            .field("dependencies_path", &self.dependencies_path)
            .field("tasks_path", &self.tasks_path)
            .finish_non_exhaustive()
    }
}

/// Global context state for the MCP server.
pub struct Context {
    /// The current active workspace root.
    current_workspace: Option<PathBuf>,

    /// Loaded workspaces (limited to [`MAX_CACHED_WORKSPACES`]).
    workspaces: HashMap<PathBuf, Workspace>,

    /// Insertion order for FIFO cache eviction.
    cache_order: VecDeque<PathBuf>,
}

impl Context {
    /// Create a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current_workspace: None,
            workspaces: HashMap::new(),
            cache_order: VecDeque::new(),
        }
    }

    /// Set the current workspace root.
    ///
    /// This will:
    /// 1. Canonicalize the path (resolves `..` and symlinks, validates existence)
    /// 2. Verify a `.taskdeps/` directory exists
    /// 3. Load config, tasks and dependencies from disk
    ///
    /// The workspace is always re-read, so tasks written by other tools
    /// since the last call are picked up.
    ///
    /// # Errors
    ///
    /// Returns an error if the workspace path doesn't exist, has no
    /// `.taskdeps/` directory, or if loading fails.
    pub async fn set_workspace(&mut self, workspace_root: &Path) -> Result<WorkspaceInfo> {
        debug!(path = %workspace_root.display(), "Setting workspace");

        let canonical = workspace_root
            .canonicalize()
            .map_err(|e| Error::WorkspaceNotFound {
                path: workspace_root.display().to_string(),
                source: Some(e),
            })?;

        validate_path(&canonical)?;

        let taskdeps_dir = canonical.join(TASKDEPS_DIR_NAME);
        if !taskdeps_dir.is_dir() {
            debug!(path = %taskdeps_dir.display(), "No .taskdeps directory found");
            return Err(Error::NoTaskdepsDirectory(canonical.display().to_string()));
        }

        let app = App::from_directory(&canonical, None).await?;
        let workspace = Workspace {
            caller: app.caller().clone(),
            dependencies_path: app.data_path().map(Path::to_path_buf),
            tasks_path: app.tasks_path().to_path_buf(),
            storage: Arc::new(RwLock::new(app.into_storage())),
        };
        debug!(caller = %workspace.caller, "Loaded workspace");

        let info = WorkspaceInfo::new(canonical.clone(), &workspace);
        self.insert(canonical.clone(), workspace);
        self.current_workspace = Some(canonical);

        Ok(info)
    }

    fn insert(&mut self, root: PathBuf, workspace: Workspace) {
        if self.workspaces.insert(root.clone(), workspace).is_some() {
            self.cache_order.retain(|p| p != &root);
        } else {
            while self.workspaces.len() > MAX_CACHED_WORKSPACES {
                self.evict_oldest();
            }
        }
        self.cache_order.push_back(root);
    }

    /// Evict the oldest cached workspace to make room for new entries.
    fn evict_oldest(&mut self) {
        if let Some(oldest) = self.cache_order.pop_front() {
            self.workspaces.remove(&oldest);
            if self.current_workspace.as_ref() == Some(&oldest) {
                self.current_workspace = None;
            }
            debug!(workspace = %oldest.display(), "Evicted workspace from cache");
        }
    }

    /// Get the current workspace root.
    #[must_use]
    pub fn current_workspace(&self) -> Option<&PathBuf> {
        self.current_workspace.as_ref()
    }

    /// Describe the current workspace, if one is set.
    #[must_use]
    pub fn current_info(&self) -> Option<WorkspaceInfo> {
        let root = self.current_workspace.as_ref()?;
        self.workspaces
            .get(root)
            .map(|ws| WorkspaceInfo::new(root.clone(), ws))
    }

    /// Get a specific workspace, or the current one if not specified.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No context is set and no workspace path is provided
    /// - The workspace path doesn't exist
    /// - The workspace exists but wasn't initialized via `set_workspace()`
    pub fn workspace_for(&self, workspace_root: Option<&Path>) -> Result<Workspace> {
        let workspace = match workspace_root {
            Some(path) => path.canonicalize().map_err(|e| Error::WorkspaceNotFound {
                path: path.display().to_string(),
                source: Some(e),
            })?,
            None => self.current_workspace.clone().ok_or(Error::NoContext)?,
        };

        self.workspaces
            .get(&workspace)
            .cloned()
            .ok_or_else(|| Error::WorkspaceNotInitialized(workspace.display().to_string()))
    }

    /// Discover and set the workspace by walking up from the given directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no `.taskdeps/` directory is found in the path
    /// hierarchy, or if loading fails.
    pub async fn discover_and_set_workspace(&mut self, start: &Path) -> Result<WorkspaceInfo> {
        let workspace_root = discover_workspace(start)?;
        self.set_workspace(&workspace_root).await
    }

    /// Register a workspace with injected storage, bypassing disk.
    #[cfg(test)]
    pub(crate) fn set_test_workspace(
        &mut self,
        root: PathBuf,
        storage: Box<dyn DependencyStorage>,
        caller: Caller,
    ) {
        let workspace = Workspace {
            storage: Arc::new(RwLock::new(storage)),
            caller,
            dependencies_path: None,
            tasks_path: PathBuf::from("test://tasks"),
        };
        self.insert(root.clone(), workspace);
        self.current_workspace = Some(root);
    }

    #[cfg(test)]
    fn cache_size(&self) -> usize {
        self.workspaces.len()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Information about a workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceInfo {
    /// The canonical path to the workspace root.
    pub workspace_root: PathBuf,

    /// The path to the dependencies file, if persisted.
    pub dependencies_path: Option<PathBuf>,

    /// The path to the tasks file.
    pub tasks_path: PathBuf,

    /// Who tool calls act as.
    pub caller: Caller,
}

impl WorkspaceInfo {
    fn new(workspace_root: PathBuf, workspace: &Workspace) -> Self {
        Self {
            workspace_root,
            dependencies_path: workspace.dependencies_path.clone(),
            tasks_path: workspace.tasks_path.clone(),
            caller: workspace.caller.clone(),
        }
    }
}

/// Validate that a canonicalized path is safe to use as a workspace.
fn validate_path(path: &Path) -> Result<()> {
    if !path.is_absolute() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Workspace path must be absolute",
        )));
    }

    if path.to_string_lossy().contains('\0') {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Workspace path contains invalid characters",
        )));
    }

    if path
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Workspace path contains parent directory references",
        )));
    }

    Ok(())
}

/// Discover a taskdeps workspace by walking up from the given directory.
///
/// Returns the canonicalized workspace root (directory containing `.taskdeps/`).
///
/// # Errors
///
/// Returns `Error::NoTaskdepsDirectory` if no `.taskdeps/` directory is found,
/// or `Error::WorkspaceNotFound` if the path cannot be canonicalized.
pub fn discover_workspace(start: &Path) -> Result<PathBuf> {
    let root = taskdeps::commands::init::find_taskdeps_root(start)
        .ok_or_else(|| Error::NoTaskdepsDirectory(start.display().to_string()))?;

    // Canonicalize to resolve symlinks (e.g., /var -> /private/var on macOS)
    root.canonicalize().map_err(|e| Error::WorkspaceNotFound {
        path: root.display().to_string(),
        source: Some(e),
    })
}
