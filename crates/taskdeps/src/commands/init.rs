//! Implementation of the `init` command.
//!
//! This module handles initialization of a new taskdeps workspace, creating
//! the `.taskdeps/` directory with configuration and data files. It also owns
//! the configuration format, which every other entry point reads.

use crate::domain::MAX_ID_LENGTH;
use crate::error::{ConfigError, Result};
use crate::storage::StorageBackend;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Name of the taskdeps directory
pub const TASKDEPS_DIR_NAME: &str = ".taskdeps";

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Name of the dependencies data file
pub const DEPENDENCIES_FILE_NAME: &str = "dependencies.jsonl";

/// Name of the tasks file, written by the task manager
pub const TASKS_FILE_NAME: &str = "tasks.jsonl";

/// Name of the gitignore file within .taskdeps
pub const GITIGNORE_FILE_NAME: &str = ".gitignore";

/// Maximum directory depth to traverse when searching for the taskdeps root
pub const MAX_TRAVERSAL_DEPTH: usize = 256;

/// Backend name for the persistent JSONL store
pub const BACKEND_JSONL: &str = "jsonl";

/// Backend name for the ephemeral in-memory store
pub const BACKEND_MEMORY: &str = "memory";

/// Configuration file structure for taskdeps
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskdepsConfig {
    /// Default identity for commands run in this workspace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Storage configuration
    pub storage: StorageConfig,
}

/// Storage configuration section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// Storage backend type: "jsonl" or "memory"
    pub backend: String,

    /// Path to the dependencies file, relative to the workspace root
    #[serde(rename = "data-file")]
    pub data_file: String,

    /// Path to the tasks file, relative to the workspace root
    #[serde(rename = "tasks-file")]
    pub tasks_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BACKEND_JSONL.to_string(),
            data_file: format!("{TASKDEPS_DIR_NAME}/{DEPENDENCIES_FILE_NAME}"),
            tasks_file: format!("{TASKDEPS_DIR_NAME}/{TASKS_FILE_NAME}"),
        }
    }
}

impl StorageConfig {
    /// Resolve the configured backend against the workspace root.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for an unknown backend, or for a data
    /// path that is absolute or escapes `root`.
    pub fn to_backend(&self, root: &Path) -> Result<StorageBackend> {
        match self.backend.as_str() {
            BACKEND_JSONL => Ok(StorageBackend::Jsonl(resolve_in_root(root, &self.data_file)?)),
            BACKEND_MEMORY => Ok(StorageBackend::InMemory),
            other => Err(ConfigError::Parse(format!(
                "Unknown storage backend '{other}' (expected '{BACKEND_JSONL}' or '{BACKEND_MEMORY}')"
            ))
            .into()),
        }
    }

    /// Resolve the tasks file against the workspace root.
    ///
    /// # Errors
    ///
    /// Same path rules as [`StorageConfig::to_backend`].
    pub fn tasks_path(&self, root: &Path) -> Result<PathBuf> {
        resolve_in_root(root, &self.tasks_file)
    }
}

/// Join a configured relative path onto `root`, refusing to leave it.
fn resolve_in_root(root: &Path, relative: &str) -> Result<PathBuf> {
    let path = Path::new(relative);
    if path.is_absolute() {
        return Err(ConfigError::Parse(format!("Path '{relative}' must be relative")).into());
    }
    let escapes = path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(
            ConfigError::Parse(format!("Path '{relative}' must stay inside the workspace")).into(),
        );
    }
    Ok(root.join(path))
}

impl TaskdepsConfig {
    /// Create a new configuration with an optional default user
    pub fn new(user: Option<&str>) -> Self {
        Self {
            user: user.map(str::to_string),
            storage: StorageConfig::default(),
        }
    }

    /// Load configuration from a file
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if let Some(user) = &config.user {
            validate_user(user)?;
        }
        Ok(config)
    }

    /// Save configuration to a file
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Parse(format!("YAML error: {e}")))?;
        fs::write(path, content).await?;
        Ok(())
    }
}

impl Default for TaskdepsConfig {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Result of the init command
#[derive(Debug)]
pub struct InitResult {
    /// Path to the created taskdeps directory
    pub taskdeps_dir: PathBuf,
    /// Path to the created config file
    pub config_file: PathBuf,
    /// Path to the created dependencies file
    pub dependencies_file: PathBuf,
    /// Path to the created tasks file
    pub tasks_file: PathBuf,
    /// Path to the created gitignore file
    pub gitignore_file: PathBuf,
    /// Default user recorded in the config
    pub user: Option<String>,
}

/// Validate a user id.
///
/// Requirements:
/// - Not empty
/// - No whitespace
/// - At most [`MAX_ID_LENGTH`] characters
pub fn validate_user(user: &str) -> Result<()> {
    if user.is_empty() {
        return Err(ConfigError::InvalidUser("user cannot be empty".to_string()).into());
    }

    if user.chars().count() > MAX_ID_LENGTH {
        return Err(ConfigError::InvalidUser(format!(
            "user cannot exceed {MAX_ID_LENGTH} characters"
        ))
        .into());
    }

    if user.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidUser("user cannot contain whitespace".to_string()).into());
    }

    Ok(())
}

/// Initialize a new taskdeps workspace in the given directory.
///
/// # Arguments
///
/// * `base_dir` - The base directory where `.taskdeps/` will be created
/// * `user` - Optional default user recorded in the config
///
/// # Errors
///
/// Returns an error if:
/// - The `.taskdeps/` directory already exists
/// - The user is invalid
/// - File system operations fail
pub async fn init(base_dir: &Path, user: Option<&str>) -> Result<InitResult> {
    let user = user.map(str::trim);
    if let Some(user) = user {
        validate_user(user)?;
    }

    let taskdeps_dir = base_dir.join(TASKDEPS_DIR_NAME);

    if taskdeps_dir.exists() {
        return Err(ConfigError::AlreadyInitialized(base_dir.display().to_string()).into());
    }

    fs::create_dir_all(&taskdeps_dir).await?;

    let config_file = taskdeps_dir.join(CONFIG_FILE_NAME);
    TaskdepsConfig::new(user).save(&config_file).await?;

    let dependencies_file = taskdeps_dir.join(DEPENDENCIES_FILE_NAME);
    fs::write(&dependencies_file, "").await?;

    let tasks_file = taskdeps_dir.join(TASKS_FILE_NAME);
    fs::write(&tasks_file, "").await?;

    let gitignore_file = taskdeps_dir.join(GITIGNORE_FILE_NAME);
    let gitignore_content = "\
# Taskdeps scratch files that should not be tracked
*.tmp
*.lock
";
    fs::write(&gitignore_file, gitignore_content).await?;

    debug!(dir = %taskdeps_dir.display(), "Initialized taskdeps workspace");

    Ok(InitResult {
        taskdeps_dir,
        config_file,
        dependencies_file,
        tasks_file,
        gitignore_file,
        user: user.map(str::to_string),
    })
}

/// Check if a directory has been initialized with taskdeps.
pub fn is_initialized(base_dir: &Path) -> bool {
    base_dir.join(TASKDEPS_DIR_NAME).exists()
}

/// Find the taskdeps root directory by searching up the directory tree.
///
/// Starts from the given directory and traverses parent directories
/// until a `.taskdeps/` directory is found, the root is reached, or
/// the maximum traversal depth is exceeded.
pub fn find_taskdeps_root(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    let mut depth = 0;

    loop {
        if current.join(TASKDEPS_DIR_NAME).is_dir() {
            return Some(current);
        }

        depth += 1;
        if depth > MAX_TRAVERSAL_DEPTH || !current.pop() {
            return None;
        }
    }
}
