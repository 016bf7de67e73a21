//! MCP server implementation.
//!
//! This module contains the main server setup using rmcp.

use crate::context::Context;
use crate::error::Error;
use crate::models::{
    BatchParams, DependencyIdParams, DependencyParams, SetContextParams, TaskParams,
};
use crate::tools::Tools;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{
    ErrorData as McpError, ServiceExt, handler::server::ServerHandler, tool, tool_handler,
    tool_router, transport::stdio,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Convert a tool outcome into an MCP result.
///
/// Bad requests (including every graph rule violation) become
/// `invalid_params`; anything else is an `internal_error`.
fn respond<T: Serialize>(
    result: crate::error::Result<T>,
) -> std::result::Result<CallToolResult, McpError> {
    match result {
        Ok(value) => Ok(CallToolResult::success(vec![Content::json(value)?])),
        Err(e) => Err(to_mcp_error(&e)),
    }
}

fn respond_text(
    result: crate::error::Result<String>,
) -> std::result::Result<CallToolResult, McpError> {
    match result {
        Ok(message) => Ok(CallToolResult::success(vec![Content::text(message)])),
        Err(e) => Err(to_mcp_error(&e)),
    }
}

fn to_mcp_error(error: &Error) -> McpError {
    if error.is_user_facing() {
        McpError::invalid_params(error.to_string(), None)
    } else {
        tracing::error!(error = %error, "Tool call failed");
        McpError::internal_error(error.to_string(), None)
    }
}

/// The taskdeps MCP server.
///
/// Provides MCP protocol handling over stdio transport.
#[derive(Clone)]
pub struct TaskdepsMcpServer {
    /// Shared context for workspace management.
    context: Arc<RwLock<Context>>,
    /// Tool implementations.
    tools: Arc<Tools>,
    /// Tool router for MCP dispatch.
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl TaskdepsMcpServer {
    /// Set the workspace context for subsequent operations.
    #[tool(
        description = "Set the workspace root directory (containing .taskdeps/) for all subsequent operations. Call this first before using other tools."
    )]
    async fn set_context(
        &self,
        Parameters(params): Parameters<SetContextParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        respond(self.tools.set_context(&params.workspace_root).await)
    }

    /// Get current workspace context information.
    #[tool(description = "Show the current workspace, data files and acting user. Useful for debugging.")]
    async fn where_am_i(&self) -> std::result::Result<CallToolResult, McpError> {
        respond(Ok(self.tools.where_am_i().await))
    }

    /// Direct blockers of a task.
    #[tool(
        description = "List the tasks that block the given task, with the id of each dependency edge."
    )]
    async fn get_blockers_for_task(
        &self,
        Parameters(params): Parameters<TaskParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        respond(
            self.tools
                .get_blockers_for_task(&params.task_id, params.workspace_root.as_deref())
                .await,
        )
    }

    /// Tasks directly blocked by a task.
    #[tool(
        description = "List the tasks that the given task blocks, with the id of each dependency edge."
    )]
    async fn get_blocked_by_task(
        &self,
        Parameters(params): Parameters<TaskParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        respond(
            self.tools
                .get_blocked_by_task(&params.task_id, params.workspace_root.as_deref())
                .await,
        )
    }

    /// Blocker and blocked ids for many tasks at once.
    #[tool(
        description = "For each task id, return the ids of its blockers and of the tasks it blocks. Every requested id appears in the result."
    )]
    async fn get_dependencies_for_tasks_batch(
        &self,
        Parameters(params): Parameters<BatchParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        respond(
            self.tools
                .get_dependencies_for_tasks_batch(
                    &params.task_ids,
                    params.workspace_root.as_deref(),
                )
                .await,
        )
    }

    /// Candidate blockers for a task.
    #[tool(
        description = "List tasks in the same project that can be added as blockers of the given task without creating a cycle or duplicate."
    )]
    async fn get_available_blockers(
        &self,
        Parameters(params): Parameters<TaskParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        respond(
            self.tools
                .get_available_blockers(&params.task_id, params.workspace_root.as_deref())
                .await,
        )
    }

    /// Record that one task blocks another.
    #[tool(
        description = "Record that blocking_task_id must finish before blocked_task_id can start. Rejects self-dependencies, cross-project edges, duplicates and cycles."
    )]
    async fn create_dependency(
        &self,
        Parameters(params): Parameters<DependencyParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        respond(
            self.tools
                .create_dependency(
                    &params.blocked_task_id,
                    &params.blocking_task_id,
                    params.workspace_root.as_deref(),
                )
                .await,
        )
    }

    /// Remove an edge by its endpoints.
    #[tool(description = "Remove the dependency where blocking_task_id blocks blocked_task_id.")]
    async fn remove_dependency(
        &self,
        Parameters(params): Parameters<DependencyParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        respond_text(
            self.tools
                .remove_dependency(
                    &params.blocked_task_id,
                    &params.blocking_task_id,
                    params.workspace_root.as_deref(),
                )
                .await,
        )
    }

    /// Remove an edge by id.
    #[tool(description = "Remove a dependency by its id (as returned by create_dependency).")]
    async fn remove_dependency_by_id(
        &self,
        Parameters(params): Parameters<DependencyIdParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        respond_text(
            self.tools
                .remove_dependency_by_id(&params.dependency_id, params.workspace_root.as_deref())
                .await,
        )
    }
}

impl TaskdepsMcpServer {
    /// Create a new taskdeps MCP server.
    #[must_use]
    pub fn new() -> Self {
        let context = Arc::new(RwLock::new(Context::new()));
        let tools = Arc::new(Tools::new(Arc::clone(&context)));

        Self {
            context,
            tools,
            tool_router: Self::tool_router(),
        }
    }

    /// Get a reference to the context.
    #[must_use]
    pub fn context(&self) -> &Arc<RwLock<Context>> {
        &self.context
    }

    /// Serve over stdio until the client disconnects.
    ///
    /// # Errors
    ///
    /// Returns `Error::Mcp` if the transport fails to start or the service
    /// task ends abnormally.
    pub async fn run(self) -> crate::error::Result<()> {
        let service = self
            .serve(stdio())
            .await
            .map_err(|e| Error::Mcp(e.to_string()))?;

        let reason = service
            .waiting()
            .await
            .map_err(|e| Error::Mcp(e.to_string()))?;
        tracing::info!(?reason, "MCP session ended");

        Ok(())
    }
}

impl Default for TaskdepsMcpServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for TaskdepsMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "taskdeps-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Taskdeps MCP server for task dependencies. Call set_context first to set the workspace. Tool calls act as the workspace's configured user."
                    .into(),
            ),
        }
    }
}
