//! Error types for taskdeps.
//!
//! The dependency-graph variants carry fixed, user-facing messages. Callers
//! (the CLI, the MCP server, a UI) display them verbatim, so their wording
//! is part of the public contract and must not change.

use std::io;
use thiserror::Error;

/// The error type for taskdeps operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller is anonymous, or does not own the referenced edge.
    #[error("Unauthorized")]
    Unauthorized,

    /// `blocked` and `blocking` refer to the same task.
    #[error("A task cannot block itself")]
    SelfDependency,

    /// The blocked task is missing or owned by someone else.
    #[error("Blocked task not found")]
    BlockedTaskNotFound,

    /// The blocking task is missing or owned by someone else.
    #[error("Blocking task not found")]
    BlockingTaskNotFound,

    /// The two tasks live in different projects.
    #[error("Tasks must belong to the same project")]
    ProjectMismatch,

    /// An edge for the same ordered pair already exists.
    #[error("This dependency already exists")]
    DuplicateDependency,

    /// Inserting the edge would close a loop.
    #[error("This dependency would create a circular reference")]
    CircularDependency,

    /// No edge matches the given pair or id.
    #[error("Dependency not found")]
    DependencyNotFound,

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error occurred.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Storage error.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unauthenticated caller or foreign ownership.
    Authorization,
    /// Self-dependency, duplicate edge or cross-project edge.
    Validation,
    /// The edge would create a cycle.
    Integrity,
    /// A task or edge is missing.
    NotFound,
    /// IO, configuration or persistence failure.
    Internal,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized => ErrorKind::Authorization,
            Self::SelfDependency | Self::ProjectMismatch | Self::DuplicateDependency => {
                ErrorKind::Validation
            }
            Self::CircularDependency => ErrorKind::Integrity,
            Self::BlockedTaskNotFound | Self::BlockingTaskNotFound | Self::DependencyNotFound => {
                ErrorKind::NotFound
            }
            Self::Io(_) | Self::Json(_) | Self::Config(_) | Self::Storage(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Whether the message is meant to be shown to an end user as-is.
    pub fn is_user_facing(&self) -> bool {
        self.kind() != ErrorKind::Internal
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No `.taskdeps/` directory in the current directory or its parents.
    #[error("Not a taskdeps repository (or any of the parent directories). Run 'taskdeps init' first.")]
    NotInitialized,

    /// `.taskdeps/` already exists.
    #[error("Taskdeps is already initialized in {0}")]
    AlreadyInitialized(String),

    /// The configured or supplied user id is unusable.
    #[error("Invalid user: {0}")]
    InvalidUser(String),

    /// The configuration file could not be parsed, or holds bad values.
    #[error("Configuration error: {0}")]
    Parse(String),
}

/// Storage and persistence errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A data file is structurally unusable.
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    /// A record could not be serialized.
    #[error("Serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// No unique dependency id could be generated.
    #[error("ID generation failed: {0}")]
    IdGeneration(String),
}

/// A specialized Result type for taskdeps operations.
pub type Result<T> = std::result::Result<T, Error>;
