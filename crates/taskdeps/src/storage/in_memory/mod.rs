//! In-memory storage backend using HashMap and petgraph.
//!
//! All edges are held in RAM. On its own this backend is **ephemeral**;
//! `load_from_jsonl()` / `save_to_jsonl()` (or the `Jsonl` storage backend,
//! which wraps them) provide file persistence.
//!
//! # Architecture
//!
//! - `HashMap<DependencyId, Dependency>` for O(1) edge lookups by id
//! - One `petgraph::StableDiGraph` per owner, edges pointing
//!   **blocking -> blocked**, weighted by the edge's id
//! - `HashMap<TaskId, NodeIndex>` per owner for O(1) node lookups
//! - A shared [`TaskDirectory`] for read-only task lookups
//!
//! For a task `t` in an owner's graph:
//!
//! - incoming edges of `t` come from the tasks that block `t`
//! - outgoing edges of `t` go to the tasks `t` blocks
//!
//! # Atomicity
//!
//! The storage is an `Arc<Mutex<InMemoryStorageInner>>`. Every operation
//! holds the lock from its first read to its last write, including the task
//! lookups `create` makes. Validation and insert therefore happen as one
//! step, and two concurrent `create` calls cannot jointly slip a cycle
//! past the check.
//!
//! # Performance Characteristics
//!
//! - `create`: two task lookups plus an O(V + E) cycle search in the owner's graph
//! - `remove` / `remove_by_id`: O(d) where d is the degree of the endpoints
//! - `get_blockers_for_task` / `get_blocked_by_task`: O(d) plus one task lookup per edge
//! - `get_dependencies_for_tasks_batch`: O(E log E) over the owner's edges
//! - `get_available_blockers`: one O(V + E) cycle search per candidate

mod graph;
mod inner;
mod jsonl;
mod trait_impl;

use crate::storage::DependencyStorage;
use crate::tasks::TaskDirectory;
use inner::InMemoryStorageInner;
use std::sync::Arc;
use tokio::sync::Mutex;

// Re-export public API
pub use jsonl::{LoadWarning, load_from_jsonl, save_to_jsonl};

/// Thread-safe in-memory storage.
///
/// Implements [`DependencyStorage`] via the trait implementation in
/// `trait_impl.rs`.
pub(crate) type InMemoryStorage = Arc<Mutex<InMemoryStorageInner>>;

/// Create a new, empty in-memory storage instance.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use taskdeps::storage::in_memory::new_in_memory_storage;
/// use taskdeps::tasks::InMemoryTaskDirectory;
///
/// let tasks = Arc::new(InMemoryTaskDirectory::new());
/// let storage = new_in_memory_storage(tasks);
/// ```
pub fn new_in_memory_storage(tasks: Arc<dyn TaskDirectory>) -> Box<dyn DependencyStorage> {
    Box::new(Arc::new(Mutex::new(InMemoryStorageInner::new(tasks))))
}
