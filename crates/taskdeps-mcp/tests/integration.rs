//! Integration tests for the taskdeps MCP server.
//!
//! These tests exercise the MCP tools against real `.taskdeps/` workspaces
//! to verify end-to-end behavior including:
//! - Persistence of mutations to `dependencies.jsonl`
//! - Multi-workspace context switching
//! - Error responses

use rstest::rstest;
use std::path::Path;
use std::sync::Arc;
use taskdeps::domain::{ProjectId, Task, TaskId, TaskStatus, UserId};
use taskdeps_mcp::context::Context;
use taskdeps_mcp::error::Error;
use taskdeps_mcp::tools::Tools;
use tempfile::TempDir;
use tokio::sync::RwLock;

mod helpers {
    use super::*;

    pub fn task(id: &str, project: &str, user: &str) -> Task {
        Task {
            id: TaskId::new(id),
            project_id: ProjectId::new(project),
            user_id: UserId::new(user),
            title: format!("Task {id}"),
            status: TaskStatus::Todo,
        }
    }

    /// Create an initialized workspace owned by `user` with the given tasks.
    pub async fn create_workspace(user: &str, tasks: &[Task]) -> TempDir {
        let temp = TempDir::new().expect("Failed to create temp dir");
        taskdeps::commands::init::init(temp.path(), Some(user))
            .await
            .expect("init should succeed");

        let body: String = tasks
            .iter()
            .map(|t| serde_json::to_string(t).unwrap() + "\n")
            .collect();
        std::fs::write(temp.path().join(".taskdeps/tasks.jsonl"), body).unwrap();
        temp
    }

    /// Workspace for alice with tasks a, b, c in p1 and x in p2.
    pub async fn alice_workspace() -> TempDir {
        create_workspace(
            "alice",
            &[
                task("a", "p1", "alice"),
                task("b", "p1", "alice"),
                task("c", "p1", "alice"),
                task("x", "p2", "alice"),
            ],
        )
        .await
    }

    pub fn create_tools() -> Tools {
        Tools::new(Arc::new(RwLock::new(Context::new())))
    }

    pub async fn set_context(tools: &Tools, path: &Path) {
        tools
            .set_context(&path.display().to_string())
            .await
            .expect("set_context should succeed");
    }

    pub fn saved_lines(path: &Path) -> usize {
        std::fs::read_to_string(path.join(".taskdeps/dependencies.jsonl"))
            .unwrap()
            .lines()
            .count()
    }

    /// Whether the identity comes from the workspace config in this run.
    pub fn config_user_applies() -> bool {
        std::env::var(taskdeps::app::USER_ENV_VAR).is_err()
    }
}

use helpers::*;

#[tokio::test]
async fn test_dependency_lifecycle_persists() {
    if !config_user_applies() {
        return;
    }
    let ws = alice_workspace().await;
    let tools = create_tools();
    set_context(&tools, ws.path()).await;

    let created = tools.create_dependency("a", "b", None).await.unwrap();
    assert_eq!(created.blocked_task_id, "a");
    assert_eq!(created.blocking_task_id, "b");
    assert_eq!(saved_lines(ws.path()), 1);

    // A fresh server sees the saved edge
    let fresh = create_tools();
    set_context(&fresh, ws.path()).await;
    let blockers = fresh.get_blockers_for_task("a", None).await.unwrap();
    assert_eq!(blockers.len(), 1);
    assert_eq!(blockers[0].dependency_id, created.dependency_id);
    assert_eq!(blockers[0].task.title, "Task b");

    fresh.remove_dependency("a", "b", None).await.unwrap();
    assert_eq!(saved_lines(ws.path()), 0);
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    if !config_user_applies() {
        return;
    }
    let ws = alice_workspace().await;
    let tools = create_tools();
    set_context(&tools, ws.path()).await;

    // C blocks B, then C blocks A
    tools.create_dependency("b", "c", None).await.unwrap();
    tools.create_dependency("a", "c", None).await.unwrap();

    // B blocking C would close a cycle
    let err = tools.create_dependency("c", "b", None).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Taskdeps(taskdeps::error::Error::CircularDependency)
    ));

    // A blocking B is fine
    tools.create_dependency("b", "a", None).await.unwrap();

    let available: Vec<String> = tools
        .get_available_blockers("c", None)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert!(available.is_empty());

    let map = tools
        .get_dependencies_for_tasks_batch(&["a".into(), "b".into(), "c".into()], None)
        .await
        .unwrap();
    assert_eq!(map["c"].blocking_ids.len(), 2);
    assert_eq!(map["b"].blocker_ids.len(), 2);
    assert_eq!(map["a"].blocker_ids, vec!["c"]);
    assert_eq!(map["a"].blocking_ids, vec!["b"]);
    assert_eq!(saved_lines(ws.path()), 3);
}

#[rstest]
#[case::self_dependency("a", "a", "A task cannot block itself")]
#[case::cross_project("a", "x", "Tasks must belong to the same project")]
#[case::missing_blocked("nope", "a", "Blocked task not found")]
#[case::missing_blocking("a", "nope", "Blocking task not found")]
#[tokio::test]
async fn test_create_errors(
    #[case] blocked: &str,
    #[case] blocking: &str,
    #[case] message: &str,
) {
    if !config_user_applies() {
        return;
    }
    let ws = alice_workspace().await;
    let tools = create_tools();
    set_context(&tools, ws.path()).await;

    let err = tools
        .create_dependency(blocked, blocking, None)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), message);
    assert!(err.is_user_facing());
    assert_eq!(saved_lines(ws.path()), 0);
}

#[tokio::test]
async fn test_workspace_root_parameter_override() {
    if !config_user_applies() {
        return;
    }
    let first = alice_workspace().await;
    let second = alice_workspace().await;
    let tools = create_tools();

    set_context(&tools, first.path()).await;
    set_context(&tools, second.path()).await;

    // Current context is the second workspace; target the first explicitly
    let first_root = first.path().display().to_string();
    tools
        .create_dependency("a", "b", Some(&first_root))
        .await
        .unwrap();

    assert_eq!(saved_lines(first.path()), 1);
    assert_eq!(saved_lines(second.path()), 0);
    assert!(tools.get_blockers_for_task("a", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_owners_are_isolated_across_workspaces() {
    if !config_user_applies() {
        return;
    }
    let shared_tasks = [task("a", "p1", "alice"), task("b", "p1", "alice")];
    let alice = create_workspace("alice", &shared_tasks).await;
    let bob = create_workspace("bob", &shared_tasks).await;
    let tools = create_tools();

    set_context(&tools, bob.path()).await;
    let err = tools.create_dependency("a", "b", None).await.unwrap_err();
    assert_eq!(err.to_string(), "Blocked task not found");

    set_context(&tools, alice.path()).await;
    tools.create_dependency("a", "b", None).await.unwrap();
}

#[tokio::test]
async fn test_set_context_picks_up_new_tasks() {
    if !config_user_applies() {
        return;
    }
    let ws = create_workspace("alice", &[task("a", "p1", "alice")]).await;
    let tools = create_tools();
    set_context(&tools, ws.path()).await;
    assert!(tools.get_available_blockers("a", None).await.unwrap().is_empty());

    let body = [task("a", "p1", "alice"), task("b", "p1", "alice")]
        .iter()
        .map(|t| serde_json::to_string(t).unwrap() + "\n")
        .collect::<String>();
    std::fs::write(ws.path().join(".taskdeps/tasks.jsonl"), body).unwrap();

    set_context(&tools, ws.path()).await;
    let available = tools.get_available_blockers("a", None).await.unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].id, "b");
}

#[tokio::test]
async fn test_where_am_i_before_and_after() {
    let ws = alice_workspace().await;
    let tools = create_tools();

    let before = tools.where_am_i().await;
    assert!(!before.context_set);
    assert!(before.workspace_root.is_none());

    set_context(&tools, ws.path()).await;
    let after = tools.where_am_i().await;
    assert!(after.context_set);
    assert!(
        after
            .dependencies_path
            .is_some_and(|p| p.ends_with("dependencies.jsonl"))
    );
    assert!(
        after
            .tasks_path
            .is_some_and(|p| p.ends_with("tasks.jsonl"))
    );
}

#[tokio::test]
async fn test_error_no_context() {
    let tools = create_tools();
    let err = tools.get_blockers_for_task("a", None).await.unwrap_err();
    assert!(matches!(err, Error::NoContext));
    assert!(err.is_user_facing());
}

#[tokio::test]
async fn test_error_no_taskdeps_directory() {
    let temp = TempDir::new().unwrap();
    let tools = create_tools();

    let err = tools
        .set_context(&temp.path().display().to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoTaskdepsDirectory(_)));
}

#[tokio::test]
async fn test_error_workspace_not_found() {
    let tools = create_tools();
    let err = tools
        .set_context("/nonexistent/path/for/taskdeps")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::WorkspaceNotFound { .. }));
}

#[tokio::test]
async fn test_error_workspace_not_initialized() {
    let ws = alice_workspace().await;
    let tools = create_tools();

    let root = ws.path().display().to_string();
    let err = tools
        .get_blockers_for_task("a", Some(&root))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::WorkspaceNotInitialized(_)));
}

#[tokio::test]
async fn test_invalid_batch_id() {
    let ws = alice_workspace().await;
    let tools = create_tools();
    set_context(&tools, ws.path()).await;

    let err = tools
        .get_dependencies_for_tasks_batch(&["a".into(), String::new()], None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidArgument {
            field: "task_ids",
            ..
        }
    ));
}

#[cfg(unix)]
#[tokio::test]
async fn test_failed_save_reloads_from_disk() {
    use std::os::unix::fs::PermissionsExt;

    if !config_user_applies() {
        return;
    }
    let ws = alice_workspace().await;
    let tools = create_tools();
    set_context(&tools, ws.path()).await;
    tools.create_dependency("a", "b", None).await.unwrap();

    // Saves write a temp file next to the data file, so a read-only
    // directory makes the next save fail.
    let dir = ws.path().join(".taskdeps");
    std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o555)).unwrap();
    let scratch = dir.join("scratch");
    let writable = std::fs::write(&scratch, "").is_ok();
    if writable {
        // Running as root; permissions are not enforced
        std::fs::remove_file(&scratch).unwrap();
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let err = tools.create_dependency("b", "c", None).await.unwrap_err();
    assert!(!err.is_user_facing());

    // The unsaved edge was rolled back
    let blockers = tools.get_blockers_for_task("b", None).await.unwrap();
    assert!(blockers.is_empty());
    assert_eq!(tools.get_blockers_for_task("a", None).await.unwrap().len(), 1);

    std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o755)).unwrap();
}
