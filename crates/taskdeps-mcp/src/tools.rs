//! MCP tool implementations.
//!
//! Each tool resolves its workspace, takes the storage lock, runs one
//! graph operation as the workspace's caller and, for mutations, saves.

use crate::context::{Context, Workspace};
use crate::error::{Error, Result};
use crate::models::{
    CreateDependencyResponse, McpDependencyMap, McpLinkedTask, McpTask, SetContextResponse,
    WhereAmIResponse, dependency_map_to_mcp,
};
use std::path::Path;
use std::sync::Arc;
use taskdeps::cli::{validate_dependency_id, validate_task_id};
use taskdeps::domain::{DependencyId, TaskId};
use taskdeps::storage::DependencyStorage;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Tool implementations for the taskdeps MCP server.
pub struct Tools {
    context: Arc<RwLock<Context>>,
}

impl Tools {
    /// Create a new Tools instance with the given context.
    pub fn new(context: Arc<RwLock<Context>>) -> Self {
        Self { context }
    }

    async fn workspace(&self, workspace_root: Option<&str>) -> Result<Workspace> {
        let context = self.context.read().await;
        context.workspace_for(workspace_root.map(Path::new))
    }

    /// Set the workspace context.
    ///
    /// # Errors
    ///
    /// Returns an error if the workspace path is invalid or has no `.taskdeps/` directory.
    pub async fn set_context(&self, workspace_root: &str) -> Result<SetContextResponse> {
        let mut context = self.context.write().await;
        let info = context.set_workspace(Path::new(workspace_root)).await?;

        Ok(SetContextResponse {
            workspace_root: info.workspace_root.display().to_string(),
            dependencies_path: info.dependencies_path.map(|p| p.display().to_string()),
            tasks_path: info.tasks_path.display().to_string(),
            user: info.caller.user_id().map(ToString::to_string),
            message: "Context set successfully".to_string(),
        })
    }

    /// Get current workspace information.
    pub async fn where_am_i(&self) -> WhereAmIResponse {
        let context = self.context.read().await;

        match context.current_info() {
            Some(info) => WhereAmIResponse {
                workspace_root: Some(info.workspace_root.display().to_string()),
                dependencies_path: info.dependencies_path.map(|p| p.display().to_string()),
                tasks_path: Some(info.tasks_path.display().to_string()),
                user: info.caller.user_id().map(ToString::to_string),
                context_set: true,
            },
            None => WhereAmIResponse {
                workspace_root: None,
                dependencies_path: None,
                tasks_path: None,
                user: None,
                context_set: false,
            },
        }
    }

    /// Tasks that block `task_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set, the id is malformed, or storage fails.
    pub async fn get_blockers_for_task(
        &self,
        task_id: &str,
        workspace_root: Option<&str>,
    ) -> Result<Vec<McpLinkedTask>> {
        let task = parse_task_id("task_id", task_id)?;
        let ws = self.workspace(workspace_root).await?;
        let storage = ws.storage.read().await;

        let linked = storage.get_blockers_for_task(&ws.caller, &task).await?;
        Ok(linked.into_iter().map(Into::into).collect())
    }

    /// Tasks that `task_id` blocks.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set, the id is malformed, or storage fails.
    pub async fn get_blocked_by_task(
        &self,
        task_id: &str,
        workspace_root: Option<&str>,
    ) -> Result<Vec<McpLinkedTask>> {
        let task = parse_task_id("task_id", task_id)?;
        let ws = self.workspace(workspace_root).await?;
        let storage = ws.storage.read().await;

        let linked = storage.get_blocked_by_task(&ws.caller, &task).await?;
        Ok(linked.into_iter().map(Into::into).collect())
    }

    /// Blocker and blocked ids for each of `task_ids`.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set, an id is malformed, or storage fails.
    pub async fn get_dependencies_for_tasks_batch(
        &self,
        task_ids: &[String],
        workspace_root: Option<&str>,
    ) -> Result<McpDependencyMap> {
        let ids = task_ids
            .iter()
            .map(|id| parse_task_id("task_ids", id))
            .collect::<Result<Vec<_>>>()?;
        let ws = self.workspace(workspace_root).await?;
        let storage = ws.storage.read().await;

        let map = storage
            .get_dependencies_for_tasks_batch(&ws.caller, &ids)
            .await?;
        Ok(dependency_map_to_mcp(map))
    }

    /// Tasks that could be added as blockers of `task_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set, the id is malformed, or storage fails.
    pub async fn get_available_blockers(
        &self,
        task_id: &str,
        workspace_root: Option<&str>,
    ) -> Result<Vec<McpTask>> {
        let task = parse_task_id("task_id", task_id)?;
        let ws = self.workspace(workspace_root).await?;
        let storage = ws.storage.read().await;

        let tasks = storage.get_available_blockers(&ws.caller, &task).await?;
        Ok(tasks.into_iter().map(Into::into).collect())
    }

    /// Record that `blocking_task_id` blocks `blocked_task_id`.
    ///
    /// # Errors
    ///
    /// Returns the graph's validation error, or an error if saving fails.
    pub async fn create_dependency(
        &self,
        blocked_task_id: &str,
        blocking_task_id: &str,
        workspace_root: Option<&str>,
    ) -> Result<CreateDependencyResponse> {
        let blocked = parse_task_id("blocked_task_id", blocked_task_id)?;
        let blocking = parse_task_id("blocking_task_id", blocking_task_id)?;
        let ws = self.workspace(workspace_root).await?;
        let mut storage = ws.storage.write().await;

        let id = storage.create(&ws.caller, &blocked, &blocking).await?;
        save_or_reload(storage.as_mut()).await?;
        info!(dependency = %id, "Created dependency via MCP");

        Ok(CreateDependencyResponse {
            dependency_id: id.0,
            blocked_task_id: blocked.0,
            blocking_task_id: blocking.0,
        })
    }

    /// Remove the edge `blocking_task_id -> blocked_task_id`.
    ///
    /// # Errors
    ///
    /// Returns the graph's error if the edge is missing or foreign, or an
    /// error if saving fails.
    pub async fn remove_dependency(
        &self,
        blocked_task_id: &str,
        blocking_task_id: &str,
        workspace_root: Option<&str>,
    ) -> Result<String> {
        let blocked = parse_task_id("blocked_task_id", blocked_task_id)?;
        let blocking = parse_task_id("blocking_task_id", blocking_task_id)?;
        let ws = self.workspace(workspace_root).await?;
        let mut storage = ws.storage.write().await;

        storage.remove(&ws.caller, &blocked, &blocking).await?;
        save_or_reload(storage.as_mut()).await?;

        Ok(format!("Removed dependency: {blocking} no longer blocks {blocked}"))
    }

    /// Remove an edge by id.
    ///
    /// # Errors
    ///
    /// Returns the graph's error if the edge is missing or foreign, or an
    /// error if saving fails.
    pub async fn remove_dependency_by_id(
        &self,
        dependency_id: &str,
        workspace_root: Option<&str>,
    ) -> Result<String> {
        let id = parse_dependency_id("dependency_id", dependency_id)?;
        let ws = self.workspace(workspace_root).await?;
        let mut storage = ws.storage.write().await;

        storage.remove_by_id(&ws.caller, &id).await?;
        save_or_reload(storage.as_mut()).await?;

        Ok(format!("Removed dependency: {id}"))
    }
}

fn parse_task_id(field: &'static str, value: &str) -> Result<TaskId> {
    validate_task_id(value)
        .map(TaskId::new)
        .map_err(|reason| Error::InvalidArgument { field, reason })
}

fn parse_dependency_id(field: &'static str, value: &str) -> Result<DependencyId> {
    validate_dependency_id(value)
        .map(DependencyId::new)
        .map_err(|reason| Error::InvalidArgument { field, reason })
}

/// Persist a mutation. On failure, reload so memory matches disk again.
async fn save_or_reload(storage: &mut dyn DependencyStorage) -> Result<()> {
    if let Err(save_error) = storage.save().await {
        warn!(error = %save_error, "Save failed, reloading from disk");
        if let Err(reload_error) = storage.reload().await {
            warn!(error = %reload_error, "Reload after failed save also failed");
        }
        return Err(save_error.into());
    }
    Ok(())
}
