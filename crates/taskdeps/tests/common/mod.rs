//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;
use taskdeps::domain::{Caller, ProjectId, Task, TaskId, TaskStatus, UserId};
use taskdeps::storage::DependencyStorage;
use taskdeps::storage::in_memory::new_in_memory_storage;
use taskdeps::tasks::InMemoryTaskDirectory;

/// Build a task with an empty title.
pub fn task(id: &str, project: &str, user: &str) -> Task {
    Task {
        id: TaskId::new(id),
        project_id: ProjectId::new(project),
        user_id: UserId::new(user),
        title: String::new(),
        status: TaskStatus::Todo,
    }
}

/// Shorthand for a task id.
pub fn tid(id: &str) -> TaskId {
    TaskId::new(id)
}

/// Caller for `user`.
pub fn as_user(user: &str) -> Caller {
    Caller::user(user)
}

/// Fresh in-memory storage over `tasks`, plus the directory so tests can
/// add or delete tasks afterwards.
pub fn storage_with(
    tasks: impl IntoIterator<Item = Task>,
) -> (Arc<InMemoryTaskDirectory>, Box<dyn DependencyStorage>) {
    let directory = Arc::new(InMemoryTaskDirectory::from_tasks(tasks));
    let storage = new_in_memory_storage(directory.clone());
    (directory, storage)
}

/// Tasks `names` in project `p1`, all owned by alice.
pub fn alice_tasks(names: &[&str]) -> Vec<Task> {
    names.iter().map(|n| task(n, "p1", "alice")).collect()
}

/// Write `tasks` as JSONL to `path`.
pub fn write_tasks_file(path: &Path, tasks: &[Task]) {
    let body: String = tasks
        .iter()
        .map(|t| serde_json::to_string(t).unwrap() + "\n")
        .collect();
    std::fs::write(path, body).unwrap();
}

/// Run the taskdeps binary in `dir`, with `TASKDEPS_USER` cleared.
pub fn run_taskdeps_in_dir(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_taskdeps"))
        .args(args)
        .current_dir(dir)
        .env_remove("TASKDEPS_USER")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute taskdeps binary")
}
