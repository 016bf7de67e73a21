//! Read-only access to tasks.
//!
//! Tasks belong to an external task manager. The dependency graph only needs
//! to look a task up by id and to list the tasks of a project, so that is all
//! [`TaskDirectory`] offers. [`InMemoryTaskDirectory`] is the bundled
//! implementation; it can be filled from `tasks.jsonl`, which the task
//! manager maintains.

use crate::domain::{ProjectId, Task, TaskId, UserId};
use crate::error::Result;
use crate::jsonl::{JsonlWarning, read_jsonl_resilient};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Read-only view of the task store.
#[async_trait]
pub trait TaskDirectory: Send + Sync {
    /// Look up a task by id.
    ///
    /// Returns `None` if no such task exists (for example, it was deleted
    /// after edges referencing it were created).
    async fn get(&self, id: &TaskId) -> Result<Option<Task>>;

    /// List the tasks of `project` owned by `owner`.
    async fn list_by_project(&self, owner: &UserId, project: &ProjectId) -> Result<Vec<Task>>;

    /// Number of tasks visible through this directory.
    async fn count(&self) -> Result<usize>;
}

/// Task directory held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryTaskDirectory {
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl InMemoryTaskDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory holding `tasks`. Later duplicates replace earlier ones.
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let tasks = tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
        Self {
            tasks: RwLock::new(tasks),
        }
    }

    /// Load tasks from a JSONL file.
    ///
    /// A missing file yields an empty directory. Malformed lines are skipped
    /// and reported as warnings.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn load_from_jsonl(path: &Path) -> Result<(Self, Vec<JsonlWarning>)> {
        if !path.exists() {
            debug!(path = %path.display(), "No tasks file, starting with an empty directory");
            return Ok((Self::new(), Vec::new()));
        }

        let (tasks, warnings) = read_jsonl_resilient::<Task>(path).await?;
        for warning in &warnings {
            warn!(
                line = warning.line_number,
                error = %warning.error,
                "Skipped malformed task record"
            );
        }
        debug!(count = tasks.len(), path = %path.display(), "Loaded tasks");

        Ok((Self::from_tasks(tasks), warnings))
    }

    /// Insert or replace a task.
    ///
    /// Used by whoever feeds this directory (tests, importers); the
    /// dependency graph itself never writes tasks.
    pub async fn insert(&self, task: Task) {
        self.tasks.write().await.insert(task.id.clone(), task);
    }

    /// Remove a task, returning it if it existed.
    pub async fn remove(&self, id: &TaskId) -> Option<Task> {
        self.tasks.write().await.remove(id)
    }
}

#[async_trait]
impl TaskDirectory for InMemoryTaskDirectory {
    async fn get(&self, id: &TaskId) -> Result<Option<Task>> {
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn list_by_project(&self, owner: &UserId, project: &ProjectId) -> Result<Vec<Task>> {
        let tasks = self.tasks.read().await;
        let mut found: Vec<Task> = tasks
            .values()
            .filter(|t| &t.project_id == project && t.is_owned_by(owner))
            .cloned()
            .collect();
        // HashMap order is arbitrary; keep listings stable
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.tasks.read().await.len())
    }
}
