//! MCP server for the taskdeps dependency graph.
//!
//! Exposes the dependency operations of the `taskdeps` crate to AI
//! assistants over the Model Context Protocol.
//!
//! # Architecture
//!
//! The server uses `rmcp` for protocol handling and wraps the
//! `DependencyStorage` trait directly. Each workspace gets one storage
//! instance behind an `RwLock`, and every tool call acts as the workspace's
//! configured user (`TASKDEPS_USER` first, then `.taskdeps/config.yaml`).
//!
//! # Tools
//!
//! ## Context Management
//! - `set_context` - Set the workspace root for all operations
//! - `where_am_i` - Show current workspace context
//!
//! ## Queries
//! - `get_blockers_for_task` - Tasks that block a task
//! - `get_blocked_by_task` - Tasks a task blocks
//! - `get_dependencies_for_tasks_batch` - Blocker and blocked ids for many tasks
//! - `get_available_blockers` - Tasks that may be added as blockers
//!
//! ## Mutations
//! - `create_dependency` - Record that one task blocks another
//! - `remove_dependency` - Remove an edge by its endpoints
//! - `remove_dependency_by_id` - Remove an edge by id

pub mod context;
pub mod error;
pub mod models;
pub mod server;
pub mod tools;

pub use error::{Error, Result};
pub use server::TaskdepsMcpServer;
