//! CLI argument structs for all commands.
//!
//! Each command has its own argument struct with clap derive attributes
//! for parsing and validation.

use clap::{Parser, Subcommand};

use super::validators::{validate_dependency_id, validate_task_id};

/// Arguments for the `init` command
///
/// The global `--user` is recorded as the workspace's default user.
#[derive(Parser, Debug, Clone)]
pub struct InitArgs {
    /// Suppress output messages
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug, Clone)]
pub struct InfoArgs {}

/// Arguments for the `dep` command
#[derive(Parser, Debug, Clone)]
pub struct DepArgs {
    /// Dependency subcommand
    #[command(subcommand)]
    pub action: DepAction,
}

/// Dependency management actions
#[derive(Subcommand, Debug, Clone)]
pub enum DepAction {
    /// Record that one task blocks another
    Add {
        /// Task that is gated
        #[arg(value_parser = validate_task_id)]
        blocked: String,

        /// Task that must finish first
        #[arg(value_parser = validate_task_id)]
        blocking: String,
    },

    /// Remove the edge between two tasks
    Remove {
        /// Task that is gated
        #[arg(value_parser = validate_task_id)]
        blocked: String,

        /// Task that must finish first
        #[arg(value_parser = validate_task_id)]
        blocking: String,
    },

    /// Remove an edge by its dependency id
    #[command(name = "remove-id")]
    RemoveId {
        /// Dependency id (e.g., dep-a1b2c3d4)
        #[arg(value_parser = validate_dependency_id)]
        id: String,
    },

    /// Show the tasks that block a task
    Blockers {
        /// Task to inspect
        #[arg(value_parser = validate_task_id)]
        task: String,
    },

    /// Show the tasks a task blocks
    Blocking {
        /// Task to inspect
        #[arg(value_parser = validate_task_id)]
        task: String,
    },

    /// Show blockers and blocked tasks for several tasks at once
    Batch {
        /// Tasks to inspect
        #[arg(required = true, num_args = 1.., value_parser = validate_task_id)]
        tasks: Vec<String>,
    },

    /// Show the tasks that could be added as blockers of a task
    Available {
        /// Task that would be blocked
        #[arg(value_parser = validate_task_id)]
        task: String,
    },

    /// List all of your dependencies
    List,
}
