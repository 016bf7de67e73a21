//! Output formatting for CLI commands.
//!
//! This module provides utilities for formatting command output in both
//! human-readable text format and JSON format for programmatic use.
//!
//! Submodules:
//! - [`color`]: Color and styling helpers (semantic colors, icons)

pub mod color;

use crate::domain::{Dependency, DependencyMap, LinkedTask, Task, TaskId};
use serde::Serialize;
use std::env;
use std::io::{self, Write};

pub use color::{error, info, success, warning};

use color::{arrow, bold, colored_status_icon, colorize_id, colorize_status, dimmed};

// ============================================================================
// Output Configuration
// ============================================================================

/// Configuration for output formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Whether to use ASCII-only icons instead of Unicode.
    pub use_ascii: bool,
    /// Whether to use colors in output.
    pub use_colors: bool,
}

impl OutputConfig {
    /// Create a new OutputConfig with explicit values.
    pub fn new(use_ascii: bool, use_colors: bool) -> Self {
        Self {
            use_ascii,
            use_colors,
        }
    }

    /// Create an OutputConfig by reading from environment variables.
    ///
    /// Reads:
    /// - `TASKDEPS_ASCII`: Set to "1" or "true" for ASCII-only icons (default: false)
    /// - `NO_COLOR`: Standard env var to disable colors (any value disables colors)
    /// - `TASKDEPS_COLOR`: Set to "0" or "false" to disable colors (default: true)
    pub fn from_env() -> Self {
        let use_ascii = match env::var("TASKDEPS_ASCII") {
            Ok(v) if v == "1" || v.eq_ignore_ascii_case("true") => true,
            Ok(v) if v == "0" || v.eq_ignore_ascii_case("false") || v.is_empty() => false,
            Ok(v) => {
                tracing::warn!(
                    env_var = "TASKDEPS_ASCII",
                    value = %v,
                    "Invalid value (expected '1', 'true', '0', or 'false'), using default"
                );
                false
            }
            Err(_) => false,
        };

        // Respect NO_COLOR standard (https://no-color.org/)
        let use_colors = env::var("NO_COLOR").is_err()
            && env::var("TASKDEPS_COLOR")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true);

        Self {
            use_ascii,
            use_colors,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            use_ascii: false,
            use_colors: true,
        }
    }
}

/// Output format mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

/// Which side of an edge a neighbour list shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Tasks that block the queried task
    Blockers,
    /// Tasks the queried task blocks
    Blocking,
}

// ============================================================================
// Public Dispatch Functions
// ============================================================================

/// Print any value as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(handle, "{json}")
}

/// Print the direct neighbours of `task`.
pub fn print_linked_tasks(
    task: &TaskId,
    direction: Direction,
    linked: &[LinkedTask],
    mode: OutputMode,
) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(&linked),
        OutputMode::Text => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            write_linked_tasks(&mut handle, task, direction, linked, &OutputConfig::from_env())
        }
    }
}

/// Print a list of tasks.
pub fn print_tasks(tasks: &[Task], mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(&tasks),
        OutputMode::Text => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            write_tasks(&mut handle, tasks, &OutputConfig::from_env())
        }
    }
}

/// Print the result of a batch lookup.
pub fn print_dependency_map(map: &DependencyMap, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(map),
        OutputMode::Text => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            write_dependency_map(&mut handle, map, &OutputConfig::from_env())
        }
    }
}

/// Print a list of dependency edges.
pub fn print_dependencies(dependencies: &[Dependency], mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(&dependencies),
        OutputMode::Text => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            write_dependencies(&mut handle, dependencies, &OutputConfig::from_env())
        }
    }
}

// ============================================================================
// Text Formatting
// ============================================================================

fn write_task_line<W: Write>(w: &mut W, task: &Task, config: &OutputConfig) -> io::Result<()> {
    write!(
        w,
        "{} {} {}",
        colored_status_icon(task.status, config),
        colorize_id(task.id.as_str(), config),
        colorize_status(task.status, config),
    )?;
    if !task.title.is_empty() {
        write!(w, " {}", task.title)?;
    }
    writeln!(w)
}

pub(crate) fn write_linked_tasks<W: Write>(
    w: &mut W,
    task: &TaskId,
    direction: Direction,
    linked: &[LinkedTask],
    config: &OutputConfig,
) -> io::Result<()> {
    let heading = match direction {
        Direction::Blockers => format!("Blockers of {task}"),
        Direction::Blocking => format!("Blocked by {task}"),
    };
    writeln!(w, "{}", bold(&heading, config))?;

    if linked.is_empty() {
        return writeln!(w, "  {}", dimmed("(none)", config));
    }

    for entry in linked {
        write!(
            w,
            "  {} {} ",
            dimmed(entry.dependency_id.as_str(), config),
            arrow(config)
        )?;
        write_task_line(w, &entry.task, config)?;
    }
    Ok(())
}

pub(crate) fn write_tasks<W: Write>(w: &mut W, tasks: &[Task], config: &OutputConfig) -> io::Result<()> {
    if tasks.is_empty() {
        return writeln!(w, "{}", dimmed("No tasks available", config));
    }
    for task in tasks {
        write_task_line(w, task, config)?;
    }
    Ok(())
}

pub(crate) fn write_dependency_map<W: Write>(
    w: &mut W,
    map: &DependencyMap,
    config: &OutputConfig,
) -> io::Result<()> {
    let join = |ids: &[TaskId]| {
        if ids.is_empty() {
            dimmed("-", config)
        } else {
            ids.iter()
                .map(|id| colorize_id(id.as_str(), config))
                .collect::<Vec<_>>()
                .join(", ")
        }
    };

    for (task, deps) in map {
        writeln!(w, "{}", bold(task.as_str(), config))?;
        writeln!(w, "  {} {}", dimmed("blocked by:", config), join(&deps.blocker_ids))?;
        writeln!(w, "  {}     {}", dimmed("blocks:", config), join(&deps.blocking_ids))?;
    }
    Ok(())
}

pub(crate) fn write_dependencies<W: Write>(
    w: &mut W,
    dependencies: &[Dependency],
    config: &OutputConfig,
) -> io::Result<()> {
    if dependencies.is_empty() {
        return writeln!(w, "{}", dimmed("No dependencies", config));
    }
    for dep in dependencies {
        writeln!(
            w,
            "{} {} {} {} {}",
            colorize_id(dep.id.as_str(), config),
            dep.blocking_task_id,
            arrow(config),
            dep.blocked_task_id,
            dimmed(&dep.created_at.format("%Y-%m-%d %H:%M").to_string(), config),
        )?;
    }
    Ok(())
}
