//! CLI argument parsing and command dispatch.
//!
//! This module provides the command-line interface for taskdeps using clap's
//! derive API.
//!
//! # Commands
//!
//! - `init`: Initialize a new taskdeps workspace
//! - `info`: Show workspace information
//! - `dep`: Add, remove and query dependencies
//!
//! # Global Flags
//!
//! - `--json`: Output in JSON format (applies to all commands)
//! - `--user`: Act as this user (overrides `TASKDEPS_USER` and the config)
//!
//! # Example
//!
//! ```bash
//! taskdeps init --user alice
//! taskdeps dep add write-report collect-data
//! taskdeps dep blockers write-report
//! taskdeps --json dep batch write-report collect-data
//! ```

mod args;
mod execute;
mod validators;

use anyhow::Result;
use clap::{Parser, Subcommand};

// Re-export argument structs
pub use args::{DepAction, DepArgs, InfoArgs, InitArgs};

// Re-export validators for external use
pub use validators::{validate_dependency_id, validate_task_id, validate_user_id};

/// Taskdeps - cycle-safe task dependencies
///
/// Track which tasks block which, with cycle detection. Dependencies are
/// stored in `.taskdeps/dependencies.jsonl`; tasks are read from
/// `.taskdeps/tasks.jsonl`.
#[derive(Parser, Debug)]
#[command(name = "taskdeps")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Act as this user
    #[arg(long, global = true, value_parser = validate_user_id)]
    pub user: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Initialize a new taskdeps workspace
    ///
    /// Creates the `.taskdeps/` directory with configuration and empty data
    /// files. `--user` is recorded as the default user.
    Init(InitArgs),

    /// Show workspace information
    ///
    /// Displays data paths, the acting user, and dependency and task counts.
    Info(InfoArgs),

    /// Manage dependencies between tasks
    ///
    /// Add or remove "blocks" edges, and query blockers, blocked tasks and
    /// candidate blockers.
    Dep(DepArgs),
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        use crate::app::App;
        use crate::output::OutputMode;

        let output_mode = if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };
        let user = self.user.as_deref();

        match &self.command {
            Some(Commands::Init(args)) => execute::execute_init(args, user).await,
            Some(Commands::Info(_)) => {
                let app = App::from_directory(&std::env::current_dir()?, user).await?;
                execute::execute_info(&app, output_mode).await
            }
            Some(Commands::Dep(args)) => {
                let mut app = App::from_directory(&std::env::current_dir()?, user).await?;
                execute::execute_dep(&mut app, args, output_mode).await
            }
            None => {
                println!("Taskdeps task dependency graph");
                println!("Use --help for more information");
                Ok(())
            }
        }
    }
}
