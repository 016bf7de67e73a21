//! Application context for CLI command execution.
//!
//! This module provides the `App` struct that loads the workspace
//! configuration, the task directory and the dependency storage, and
//! resolves who the caller is.
//!
//! # Example
//!
//! ```no_run
//! use taskdeps::app::App;
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let app = App::from_directory(Path::new("."), None).await?;
//!     println!("Running as {}", app.caller());
//!     Ok(())
//! }
//! ```

use crate::commands::init::{
    CONFIG_FILE_NAME, TASKDEPS_DIR_NAME, TaskdepsConfig, find_taskdeps_root, validate_user,
};
use crate::domain::{Caller, UserId};
use crate::error::{ConfigError, Result};
use crate::storage::{DependencyStorage, StorageBackend, create_storage};
use crate::tasks::{InMemoryTaskDirectory, TaskDirectory};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Environment variable naming the acting user.
pub const USER_ENV_VAR: &str = "TASKDEPS_USER";

/// Pick the acting user: explicit override, then the environment, then config.
///
/// Blank values are treated as absent.
///
/// # Errors
///
/// Returns `ConfigError::InvalidUser` if the chosen value is malformed.
pub fn resolve_user(
    explicit: Option<&str>,
    env: Option<&str>,
    configured: Option<&str>,
) -> Result<Option<UserId>> {
    let chosen = [explicit, env, configured]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|u| !u.is_empty());

    match chosen {
        Some(user) => {
            validate_user(user)?;
            Ok(Some(UserId::new(user)))
        }
        None => Ok(None),
    }
}

/// Application context for CLI operations.
///
/// Storage is loaded from the taskdeps directory on creation.
pub struct App {
    /// The storage backend (trait object for polymorphism)
    storage: Box<dyn DependencyStorage>,

    /// Read-only task lookups shared with the storage
    tasks: Arc<dyn TaskDirectory>,

    /// Identity every command runs as
    caller: Caller,

    /// Path to the taskdeps directory (.taskdeps)
    taskdeps_dir: PathBuf,

    /// Where edges are persisted, if anywhere
    data_path: Option<PathBuf>,

    /// Where tasks are read from
    tasks_path: PathBuf,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("taskdeps_dir", &self.taskdeps_dir)
            .field("caller", &self.caller)
            .field("data_path", &self.data_path)
            .field("tasks_path", &self.tasks_path)
            .field("storage", &"<dyn DependencyStorage>")
            .finish_non_exhaustive()
    }
}

impl App {
    /// Create an App instance from the given working directory.
    ///
    /// Searches up the directory tree to find a `.taskdeps/` directory,
    /// loads configuration, tasks and storage. `user` overrides both
    /// `TASKDEPS_USER` and the configured user.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No taskdeps workspace is found in the directory tree
    /// - Configuration cannot be loaded, or names an invalid user
    /// - Tasks or storage cannot be loaded
    pub async fn from_directory(working_dir: &Path, user: Option<&str>) -> Result<Self> {
        let root_dir = find_taskdeps_root(working_dir).ok_or(ConfigError::NotInitialized)?;

        let taskdeps_dir = root_dir.join(TASKDEPS_DIR_NAME);
        let config = TaskdepsConfig::load(&taskdeps_dir.join(CONFIG_FILE_NAME)).await?;

        let env_user = std::env::var(USER_ENV_VAR).ok();
        let caller = Caller::from_option(resolve_user(
            user,
            env_user.as_deref(),
            config.user.as_deref(),
        )?);

        let tasks_path = config.storage.tasks_path(&root_dir)?;
        let (directory, _warnings) = InMemoryTaskDirectory::load_from_jsonl(&tasks_path).await?;
        let tasks: Arc<dyn TaskDirectory> = Arc::new(directory);

        let backend = config.storage.to_backend(&root_dir)?;
        let data_path = backend.data_path().map(Path::to_path_buf);
        let storage = create_storage(backend, Arc::clone(&tasks)).await?;

        tracing::debug!(root = %root_dir.display(), %caller, "Opened taskdeps workspace");

        Ok(Self {
            storage,
            tasks,
            caller,
            taskdeps_dir,
            data_path,
            tasks_path,
        })
    }

    /// Build an App around already-constructed parts.
    ///
    /// Used by tests and embedders that do not read a workspace from disk.
    pub async fn with_parts(
        backend: StorageBackend,
        tasks: Arc<dyn TaskDirectory>,
        caller: Caller,
    ) -> Result<Self> {
        let data_path = backend.data_path().map(Path::to_path_buf);
        let storage = create_storage(backend, Arc::clone(&tasks)).await?;
        Ok(Self {
            storage,
            tasks,
            caller,
            taskdeps_dir: PathBuf::from(TASKDEPS_DIR_NAME),
            data_path,
            tasks_path: PathBuf::new(),
        })
    }

    /// Get a mutable reference to the storage.
    pub fn storage_mut(&mut self) -> &mut dyn DependencyStorage {
        self.storage.as_mut()
    }

    /// Get an immutable reference to the storage.
    pub fn storage(&self) -> &dyn DependencyStorage {
        self.storage.as_ref()
    }

    /// Take ownership of the storage, for callers that manage their own locking.
    pub fn into_storage(self) -> Box<dyn DependencyStorage> {
        self.storage
    }

    /// Get the task directory.
    pub fn tasks(&self) -> &dyn TaskDirectory {
        self.tasks.as_ref()
    }

    /// The identity commands run as.
    pub fn caller(&self) -> &Caller {
        &self.caller
    }

    /// Get the path to the taskdeps directory.
    pub fn taskdeps_dir(&self) -> &Path {
        &self.taskdeps_dir
    }

    /// Path of the dependencies file, `None` for in-memory storage.
    pub fn data_path(&self) -> Option<&Path> {
        self.data_path.as_deref()
    }

    /// Path of the tasks file.
    pub fn tasks_path(&self) -> &Path {
        &self.tasks_path
    }

    /// Save storage state to persistent storage.
    ///
    /// This should be called after any mutating operations.
    pub async fn save(&self) -> Result<()> {
        self.storage.save().await
    }
}
