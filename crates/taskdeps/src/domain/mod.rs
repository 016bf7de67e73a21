//! Domain types for the task dependency graph.
//!
//! Tasks are owned by an external task manager and only referenced here by
//! id. Dependency edges are owned by this crate.
//!
//! # Edge Direction
//!
//! A [`Dependency`] reads "`blocking_task_id` must finish before
//! `blocked_task_id` is considered unblocked". Throughout the crate the
//! graph edge points `blocking -> blocked`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Maximum accepted length for any identifier.
pub const MAX_ID_LENGTH: usize = 128;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new identifier
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Unique identifier for a task
    TaskId
);
string_id!(
    /// Unique identifier for a project
    ProjectId
);
string_id!(
    /// Unique identifier for a user (the owner of tasks and edges)
    UserId
);
string_id!(
    /// Unique identifier for a dependency edge
    DependencyId
);

/// Workflow status of a task, as reported by the task manager.
///
/// Carried through for display only; the graph never reads or changes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started
    #[default]
    Todo,

    /// Currently being worked on
    InProgress,

    /// Finished
    Done,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Todo => write!(f, "todo"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// A task as seen by the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier for the task
    pub id: TaskId,

    /// Project the task belongs to
    pub project_id: ProjectId,

    /// Owner of the task
    pub user_id: UserId,

    /// Display title
    #[serde(default)]
    pub title: String,

    /// Workflow status
    #[serde(default)]
    pub status: TaskStatus,
}

impl Task {
    /// Whether `user` owns this task
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.user_id == user
    }
}

/// Kind of dependency relationship.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    /// The blocking task must finish before the blocked task can start
    #[default]
    FinishToStart,
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FinishToStart => write!(f, "finish_to_start"),
        }
    }
}

/// A directed "blocks" edge between two tasks of the same project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Unique identifier, assigned at creation
    pub id: DependencyId,

    /// Owner of the edge (and of both endpoint tasks)
    pub user_id: UserId,

    /// Task that must finish first
    pub blocking_task_id: TaskId,

    /// Task that is gated
    pub blocked_task_id: TaskId,

    /// Relationship kind
    #[serde(default)]
    pub dependency_type: DependencyType,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Identity of whoever issued a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Caller {
    /// No identity was supplied
    #[default]
    Anonymous,

    /// An authenticated user
    User(UserId),
}

impl Caller {
    /// Build a caller for `user`
    pub fn user(user: impl Into<UserId>) -> Self {
        Self::User(user.into())
    }

    /// Build a caller from an optional user id
    pub fn from_option(user: Option<UserId>) -> Self {
        user.map_or(Self::Anonymous, Self::User)
    }

    /// The caller's user id, if authenticated
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Anonymous => None,
            Self::User(id) => Some(id),
        }
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => write!(f, "<anonymous>"),
            Self::User(id) => write!(f, "{id}"),
        }
    }
}

/// A task reached through one dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedTask {
    /// The edge connecting the queried task to `task`
    pub dependency_id: DependencyId,

    /// The task on the other end of the edge
    pub task: Task,
}

/// Direct neighbours of one task, as ids only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDependencies {
    /// Tasks that block this task
    pub blocker_ids: Vec<TaskId>,

    /// Tasks this task blocks
    pub blocking_ids: Vec<TaskId>,
}

/// Result of a batch dependency lookup, keyed by requested task id.
pub type DependencyMap = BTreeMap<TaskId, TaskDependencies>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let id = TaskId::new("task-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"task-1\"");
        assert_eq!(id.to_string(), "task-1");
        assert_eq!(id.as_str(), "task-1");
    }

    #[test]
    fn test_task_defaults_optional_fields() {
        let task: Task =
            serde_json::from_str(r#"{"id":"t1","project_id":"p1","user_id":"u1"}"#).unwrap();
        assert_eq!(task.title, "");
        assert_eq!(task.status, TaskStatus::Todo);
        assert!(task.is_owned_by(&UserId::new("u1")));
        assert!(!task.is_owned_by(&UserId::new("u2")));
    }

    #[test]
    fn test_dependency_type_wire_name() {
        assert_eq!(
            serde_json::to_string(&DependencyType::FinishToStart).unwrap(),
            "\"finish_to_start\""
        );
    }

    #[test]
    fn test_caller() {
        assert_eq!(Caller::from_option(None), Caller::Anonymous);
        assert_eq!(Caller::Anonymous.user_id(), None);

        let caller = Caller::user("alice");
        assert_eq!(caller.user_id(), Some(&UserId::new("alice")));
        assert_eq!(caller.to_string(), "alice");
    }
}
