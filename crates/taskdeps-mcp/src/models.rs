//! MCP request and response models.
//!
//! Parameter types derive `JsonSchema` so rmcp can advertise them. Response
//! types flatten taskdeps domain types into plain strings for transport.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use taskdeps::domain::{DependencyMap, LinkedTask, Task, TaskDependencies};

// ========== Parameters ==========

/// Parameters for `set_context`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SetContextParams {
    /// Directory containing `.taskdeps/` (or any directory below it).
    pub workspace_root: String,
}

/// Parameters for tools that take a single task.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TaskParams {
    /// The task to query.
    pub task_id: String,

    /// Workspace to use instead of the current context.
    #[serde(default)]
    pub workspace_root: Option<String>,
}

/// Parameters for `get_dependencies_for_tasks_batch`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchParams {
    /// Tasks to look up. Every id appears in the result.
    pub task_ids: Vec<String>,

    /// Workspace to use instead of the current context.
    #[serde(default)]
    pub workspace_root: Option<String>,
}

/// Parameters for `create_dependency` and `remove_dependency`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DependencyParams {
    /// The task that is gated.
    pub blocked_task_id: String,

    /// The task that must finish first.
    pub blocking_task_id: String,

    /// Workspace to use instead of the current context.
    #[serde(default)]
    pub workspace_root: Option<String>,
}

/// Parameters for `remove_dependency_by_id`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DependencyIdParams {
    /// Id of the dependency to remove.
    pub dependency_id: String,

    /// Workspace to use instead of the current context.
    #[serde(default)]
    pub workspace_root: Option<String>,
}

// ========== Responses ==========

/// Response from the `set_context` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SetContextResponse {
    /// The workspace root that was set.
    pub workspace_root: String,

    /// The dependencies file, if persisted.
    pub dependencies_path: Option<String>,

    /// The tasks file.
    pub tasks_path: String,

    /// The user tool calls act as, if any.
    pub user: Option<String>,

    /// Status message.
    pub message: String,
}

/// Response from the `where_am_i` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WhereAmIResponse {
    /// The current workspace root, if set.
    pub workspace_root: Option<String>,

    /// The dependencies file, if set and persisted.
    pub dependencies_path: Option<String>,

    /// The tasks file, if set.
    pub tasks_path: Option<String>,

    /// The user tool calls act as, if any.
    pub user: Option<String>,

    /// Whether a context is currently set.
    pub context_set: bool,
}

/// Task representation for MCP responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct McpTask {
    /// Unique identifier.
    pub id: String,

    /// Project the task belongs to.
    pub project_id: String,

    /// Display title.
    pub title: String,

    /// Workflow status (`todo`, `in_progress` or `done`).
    pub status: String,
}

impl From<Task> for McpTask {
    fn from(task: Task) -> Self {
        Self {
            id: task.id.0,
            project_id: task.project_id.0,
            title: task.title,
            status: task.status.to_string(),
        }
    }
}

/// A neighbouring task and the edge that links it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct McpLinkedTask {
    /// The edge connecting the queried task to `task`.
    pub dependency_id: String,

    /// The task on the other end of the edge.
    pub task: McpTask,
}

impl From<LinkedTask> for McpLinkedTask {
    fn from(linked: LinkedTask) -> Self {
        Self {
            dependency_id: linked.dependency_id.0,
            task: linked.task.into(),
        }
    }
}

/// Direct neighbours of one task, as ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct McpTaskDependencies {
    /// Tasks that block this task.
    pub blocker_ids: Vec<String>,

    /// Tasks this task blocks.
    pub blocking_ids: Vec<String>,
}

impl From<TaskDependencies> for McpTaskDependencies {
    fn from(deps: TaskDependencies) -> Self {
        Self {
            blocker_ids: deps.blocker_ids.into_iter().map(|id| id.0).collect(),
            blocking_ids: deps.blocking_ids.into_iter().map(|id| id.0).collect(),
        }
    }
}

/// Batch lookup result keyed by task id.
pub type McpDependencyMap = BTreeMap<String, McpTaskDependencies>;

/// Convert a core batch result for transport.
#[must_use]
pub fn dependency_map_to_mcp(map: DependencyMap) -> McpDependencyMap {
    map.into_iter()
        .map(|(id, deps)| (id.0, deps.into()))
        .collect()
}

/// Response from `create_dependency`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateDependencyResponse {
    /// Id of the new edge.
    pub dependency_id: String,

    /// The task that is gated.
    pub blocked_task_id: String,

    /// The task that must finish first.
    pub blocking_task_id: String,
}
