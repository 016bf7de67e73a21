//! Error types for the taskdeps MCP server.

use thiserror::Error;

/// Errors that can occur in the taskdeps MCP server.
#[derive(Debug, Error)]
pub enum Error {
    /// No workspace context has been set.
    #[error("No workspace context set. Call set_context first.")]
    NoContext,

    /// Invalid argument value provided.
    #[error("Invalid {field}: {reason}")]
    InvalidArgument {
        /// The field name that had an invalid value.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The specified workspace was not found or path is invalid.
    #[error("Workspace not found: {path}")]
    WorkspaceNotFound {
        /// The path that was not found.
        path: String,
        /// The underlying IO error, if any.
        #[source]
        source: Option<std::io::Error>,
    },

    /// Workspace exists but was not initialized via `set_context`.
    #[error("Workspace not initialized: {0}. Call set_context first.")]
    WorkspaceNotInitialized(String),

    /// Failed to discover a taskdeps workspace.
    #[error("No .taskdeps directory found in {0} or parent directories")]
    NoTaskdepsDirectory(String),

    /// An error from the taskdeps core.
    #[error(transparent)]
    Taskdeps(#[from] taskdeps::error::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// MCP protocol error.
    #[error("MCP error: {0}")]
    Mcp(String),
}

impl Error {
    /// Whether the error describes a bad request rather than a server fault.
    ///
    /// User-facing errors are reported as invalid parameters.
    pub fn is_user_facing(&self) -> bool {
        match self {
            Self::NoContext
            | Self::InvalidArgument { .. }
            | Self::WorkspaceNotFound { .. }
            | Self::WorkspaceNotInitialized(_)
            | Self::NoTaskdepsDirectory(_) => true,
            Self::Taskdeps(e) => e.is_user_facing(),
            Self::Io(_) | Self::Mcp(_) => false,
        }
    }
}

/// Result type for taskdeps MCP operations.
pub type Result<T> = std::result::Result<T, Error>;
