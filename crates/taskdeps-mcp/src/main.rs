//! Taskdeps MCP server binary.
//!
//! Runs the MCP server over stdio. Logs go to stderr since stdout carries
//! the protocol.

use taskdeps_mcp::TaskdepsMcpServer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting taskdeps-mcp server");

    let server = TaskdepsMcpServer::new();

    // Pick up a workspace around the launch directory, if there is one
    if let Ok(cwd) = std::env::current_dir() {
        let mut context = server.context().write().await;
        match context.discover_and_set_workspace(&cwd).await {
            Ok(info) => {
                tracing::info!(workspace = %info.workspace_root.display(), "Using workspace");
            }
            Err(e) => tracing::debug!(error = %e, "No workspace at startup"),
        }
    }

    server.run().await?;

    Ok(())
}
