//! Command execution logic.
//!
//! This module contains the implementation of all CLI commands.

use anyhow::Result;

use super::args::{DepAction, DepArgs, InitArgs};
use crate::app::App;
use crate::domain::{DependencyId, TaskId};
use crate::output::{self, Direction, OutputConfig, OutputMode};

/// Execute the init command
pub async fn execute_init(args: &InitArgs, user: Option<&str>) -> Result<()> {
    use crate::commands::init;

    let current_dir = std::env::current_dir()?;

    if !args.quiet {
        println!(
            "Initializing taskdeps workspace{}...",
            user.map(|u| format!(" for user '{u}'"))
                .unwrap_or_default()
        );
    }

    let result = init::init(&current_dir, user).await?;

    if !args.quiet {
        println!("Initialized taskdeps in {}", result.taskdeps_dir.display());
        println!("  Config:       {}", result.config_file.display());
        println!("  Dependencies: {}", result.dependencies_file.display());
        println!("  Tasks:        {}", result.tasks_file.display());
    }

    Ok(())
}

/// Execute the info command
pub async fn execute_info(app: &App, output_mode: OutputMode) -> Result<()> {
    let caller = app.caller();
    let edges = app.storage().list(caller).await?.len();
    let total_edges = app.storage().export_all().await?.len();
    let tasks = app.tasks().count().await?;
    let data_path = app
        .data_path()
        .map_or_else(|| "(in-memory)".to_string(), |p| p.display().to_string());

    match output_mode {
        OutputMode::Json => {
            output::print_json(&serde_json::json!({
                "taskdeps_dir": app.taskdeps_dir().display().to_string(),
                "dependencies_path": data_path,
                "tasks_path": app.tasks_path().display().to_string(),
                "user": caller.user_id(),
                "dependencies": {
                    "mine": edges,
                    "total": total_edges,
                },
                "tasks": tasks,
            }))?;
        }
        OutputMode::Text => {
            println!("Taskdeps Workspace Information");
            println!("==============================");
            println!();
            println!("Dependencies: {data_path}");
            println!("Tasks:        {}", app.tasks_path().display());
            println!("User:         {caller}");
            println!();
            println!("Dependencies: {edges} yours ({total_edges} total)");
            println!("Tasks:        {tasks}");
        }
    }

    Ok(())
}

/// Execute a `dep` subcommand
pub async fn execute_dep(app: &mut App, args: &DepArgs, output_mode: OutputMode) -> Result<()> {
    let caller = app.caller().clone();
    let config = OutputConfig::from_env();

    match &args.action {
        DepAction::Add { blocked, blocking } => {
            let id = app
                .storage_mut()
                .create(&caller, &TaskId::new(blocked), &TaskId::new(blocking))
                .await?;
            app.save().await?;

            match output_mode {
                OutputMode::Json => output::print_json(&serde_json::json!({
                    "action": "add",
                    "dependency_id": id,
                    "blocked_task_id": blocked,
                    "blocking_task_id": blocking,
                    "status": "success"
                }))?,
                OutputMode::Text => println!(
                    "{} {id}: {blocking} blocks {blocked}",
                    output::success("Added dependency", &config)
                ),
            }
        }
        DepAction::Remove { blocked, blocking } => {
            app.storage_mut()
                .remove(&caller, &TaskId::new(blocked), &TaskId::new(blocking))
                .await?;
            app.save().await?;

            match output_mode {
                OutputMode::Json => output::print_json(&serde_json::json!({
                    "action": "remove",
                    "blocked_task_id": blocked,
                    "blocking_task_id": blocking,
                    "status": "success"
                }))?,
                OutputMode::Text => println!(
                    "{}: {blocking} no longer blocks {blocked}",
                    output::success("Removed dependency", &config)
                ),
            }
        }
        DepAction::RemoveId { id } => {
            app.storage_mut()
                .remove_by_id(&caller, &DependencyId::new(id))
                .await?;
            app.save().await?;

            match output_mode {
                OutputMode::Json => output::print_json(&serde_json::json!({
                    "action": "remove",
                    "dependency_id": id,
                    "status": "success"
                }))?,
                OutputMode::Text => println!(
                    "{} {id}",
                    output::success("Removed dependency", &config)
                ),
            }
        }
        DepAction::Blockers { task } => {
            let task = TaskId::new(task);
            let linked = app.storage().get_blockers_for_task(&caller, &task).await?;
            output::print_linked_tasks(&task, Direction::Blockers, &linked, output_mode)?;
        }
        DepAction::Blocking { task } => {
            let task = TaskId::new(task);
            let linked = app.storage().get_blocked_by_task(&caller, &task).await?;
            output::print_linked_tasks(&task, Direction::Blocking, &linked, output_mode)?;
        }
        DepAction::Batch { tasks } => {
            let ids: Vec<TaskId> = tasks.iter().map(TaskId::new).collect();
            let map = app
                .storage()
                .get_dependencies_for_tasks_batch(&caller, &ids)
                .await?;
            output::print_dependency_map(&map, output_mode)?;
        }
        DepAction::Available { task } => {
            let available = app
                .storage()
                .get_available_blockers(&caller, &TaskId::new(task))
                .await?;
            output::print_tasks(&available, output_mode)?;
        }
        DepAction::List => {
            let deps = app.storage().list(&caller).await?;
            output::print_dependencies(&deps, output_mode)?;
        }
    }

    Ok(())
}
