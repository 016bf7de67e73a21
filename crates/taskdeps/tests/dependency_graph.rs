//! Integration tests for the dependency graph.
//!
//! These tests drive the in-memory backend through the `DependencyStorage`
//! trait: validation order, cycle rejection, removal, the read queries, and
//! ownership isolation between users.

use proptest::prelude::*;
use rstest::rstest;
use std::collections::BTreeSet;
use std::sync::Arc;
use taskdeps::domain::{Caller, DependencyId, TaskDependencies, TaskId};
use taskdeps::error::{Error, ErrorKind};
use taskdeps::storage::DependencyStorage;
use tokio::sync::RwLock;

mod common;
use common::{alice_tasks, as_user, storage_with, task, tid};

fn ids(tasks: &[taskdeps::domain::Task]) -> Vec<&str> {
    tasks.iter().map(|t| t.id.as_str()).collect()
}

// ========== Create: Validation ==========

#[tokio::test]
async fn test_create_returns_generated_id() {
    let (_, mut storage) = storage_with(alice_tasks(&["a", "b"]));
    let alice = as_user("alice");

    let id = storage.create(&alice, &tid("a"), &tid("b")).await.unwrap();

    assert!(id.as_str().starts_with("dep-"));
    let dep = storage.get(&alice, &id).await.unwrap().unwrap();
    assert_eq!(dep.blocked_task_id, tid("a"));
    assert_eq!(dep.blocking_task_id, tid("b"));
    assert_eq!(dep.user_id.as_str(), "alice");
    assert_eq!(dep.dependency_type.to_string(), "finish_to_start");
}

#[rstest]
#[case::existing("a")]
#[case::missing("ghost")]
#[tokio::test]
async fn test_create_self_dependency_fails(#[case] t: &str) {
    let (_, mut storage) = storage_with(alice_tasks(&["a"]));

    let err = storage
        .create(&as_user("alice"), &tid(t), &tid(t))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::SelfDependency));
    assert_eq!(err.to_string(), "A task cannot block itself");
}

#[tokio::test]
async fn test_create_anonymous_is_unauthorized() {
    let (_, mut storage) = storage_with(alice_tasks(&["a", "b"]));

    let err = storage
        .create(&Caller::Anonymous, &tid("a"), &tid("b"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Unauthorized));
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[tokio::test]
async fn test_create_unauthorized_precedes_self_check() {
    let (_, mut storage) = storage_with(alice_tasks(&["a"]));

    let err = storage
        .create(&Caller::Anonymous, &tid("a"), &tid("a"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Unauthorized));
}

#[rstest]
#[case::blocked_missing("ghost", "a", "Blocked task not found")]
#[case::blocking_missing("a", "ghost", "Blocking task not found")]
#[case::both_missing("ghost", "phantom", "Blocked task not found")]
#[case::blocked_foreign("bob-task", "a", "Blocked task not found")]
#[case::blocking_foreign("a", "bob-task", "Blocking task not found")]
#[tokio::test]
async fn test_create_missing_or_foreign_task(
    #[case] blocked: &str,
    #[case] blocking: &str,
    #[case] expected: &str,
) {
    let mut tasks = alice_tasks(&["a"]);
    tasks.push(task("bob-task", "p1", "bob"));
    let (_, mut storage) = storage_with(tasks);

    let err = storage
        .create(&as_user("alice"), &tid(blocked), &tid(blocking))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), expected);
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_create_cross_project_fails() {
    let (_, mut storage) = storage_with([task("a", "p1", "alice"), task("x", "p2", "alice")]);
    let alice = as_user("alice");

    for (blocked, blocking) in [("a", "x"), ("x", "a")] {
        let err = storage
            .create(&alice, &tid(blocked), &tid(blocking))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProjectMismatch));
        assert_eq!(err.to_string(), "Tasks must belong to the same project");
    }
    assert!(storage.list(&alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_duplicate_fails_and_keeps_one_edge() {
    let (_, mut storage) = storage_with(alice_tasks(&["a", "b"]));
    let alice = as_user("alice");

    storage.create(&alice, &tid("a"), &tid("b")).await.unwrap();
    let err = storage
        .create(&alice, &tid("a"), &tid("b"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::DuplicateDependency));
    assert_eq!(err.to_string(), "This dependency already exists");

    let deps = storage.list(&alice).await.unwrap();
    let pair_count = deps
        .iter()
        .filter(|d| d.blocked_task_id == tid("a") && d.blocking_task_id == tid("b"))
        .count();
    assert_eq!(pair_count, 1);
}

#[tokio::test]
async fn test_create_reverse_of_existing_edge_is_cycle() {
    let (_, mut storage) = storage_with(alice_tasks(&["a", "b"]));
    let alice = as_user("alice");

    storage.create(&alice, &tid("a"), &tid("b")).await.unwrap();
    let err = storage
        .create(&alice, &tid("b"), &tid("a"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::CircularDependency));
    assert_eq!(err.kind(), ErrorKind::Integrity);
}

#[tokio::test]
async fn test_create_transitive_cycle_fails() {
    let (_, mut storage) = storage_with(alice_tasks(&["a", "b", "c"]));
    let alice = as_user("alice");

    // b blocks a, c blocks b
    storage.create(&alice, &tid("a"), &tid("b")).await.unwrap();
    storage.create(&alice, &tid("b"), &tid("c")).await.unwrap();

    // a blocking c would close a -> c -> b -> a
    let err = storage
        .create(&alice, &tid("c"), &tid("a"))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "This dependency would create a circular reference"
    );
    assert_eq!(storage.list(&alice).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_would_create_cycle_query() {
    let (_, mut storage) = storage_with(alice_tasks(&["a", "b", "c"]));
    let alice = as_user("alice");

    storage.create(&alice, &tid("a"), &tid("b")).await.unwrap();
    storage.create(&alice, &tid("b"), &tid("c")).await.unwrap();

    assert!(storage.would_create_cycle(&alice, &tid("c"), &tid("a")).await.unwrap());
    assert!(!storage.would_create_cycle(&alice, &tid("a"), &tid("c")).await.unwrap());
    assert!(storage.would_create_cycle(&alice, &tid("a"), &tid("a")).await.unwrap());
    assert!(
        !storage
            .would_create_cycle(&Caller::Anonymous, &tid("c"), &tid("a"))
            .await
            .unwrap()
    );
}

// ========== Remove ==========

#[tokio::test]
async fn test_remove_by_pair() {
    let (_, mut storage) = storage_with(alice_tasks(&["a", "b"]));
    let alice = as_user("alice");

    storage.create(&alice, &tid("a"), &tid("b")).await.unwrap();
    storage.remove(&alice, &tid("a"), &tid("b")).await.unwrap();

    assert!(storage.list(&alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_nonexistent_fails() {
    let (_, mut storage) = storage_with(alice_tasks(&["a", "b"]));
    let alice = as_user("alice");

    let err = storage
        .remove(&alice, &tid("a"), &tid("b"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DependencyNotFound));
    assert_eq!(err.to_string(), "Dependency not found");

    storage.create(&alice, &tid("a"), &tid("b")).await.unwrap();
    storage.remove(&alice, &tid("a"), &tid("b")).await.unwrap();

    // Second removal is not silently accepted
    let err = storage
        .remove(&alice, &tid("a"), &tid("b"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DependencyNotFound));
}

#[tokio::test]
async fn test_remove_reversed_pair_is_not_found() {
    let (_, mut storage) = storage_with(alice_tasks(&["a", "b"]));
    let alice = as_user("alice");

    storage.create(&alice, &tid("a"), &tid("b")).await.unwrap();
    let err = storage
        .remove(&alice, &tid("b"), &tid("a"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::DependencyNotFound));
    assert_eq!(storage.list(&alice).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_remove_by_id() {
    let (_, mut storage) = storage_with(alice_tasks(&["a", "b"]));
    let alice = as_user("alice");

    let id = storage.create(&alice, &tid("a"), &tid("b")).await.unwrap();
    storage.remove_by_id(&alice, &id).await.unwrap();

    assert!(storage.get(&alice, &id).await.unwrap().is_none());
    let err = storage.remove_by_id(&alice, &id).await.unwrap_err();
    assert!(matches!(err, Error::DependencyNotFound));
}

#[tokio::test]
async fn test_remove_anonymous_is_unauthorized() {
    let (_, mut storage) = storage_with(alice_tasks(&["a", "b"]));
    let alice = as_user("alice");
    let id = storage.create(&alice, &tid("a"), &tid("b")).await.unwrap();

    let err = storage
        .remove(&Caller::Anonymous, &tid("a"), &tid("b"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unauthorized));

    let err = storage
        .remove_by_id(&Caller::Anonymous, &id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unauthorized));

    assert_eq!(storage.list(&alice).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_remove_unblocks_reverse_edge() {
    let (_, mut storage) = storage_with(alice_tasks(&["a", "b"]));
    let alice = as_user("alice");

    storage.create(&alice, &tid("a"), &tid("b")).await.unwrap();
    storage.remove(&alice, &tid("a"), &tid("b")).await.unwrap();

    storage.create(&alice, &tid("b"), &tid("a")).await.unwrap();
}

// ========== Queries ==========

#[tokio::test]
async fn test_blockers_and_blocked_by() {
    let (_, mut storage) = storage_with(alice_tasks(&["a", "b", "c"]));
    let alice = as_user("alice");

    let ab = storage.create(&alice, &tid("a"), &tid("b")).await.unwrap();
    let ac = storage.create(&alice, &tid("a"), &tid("c")).await.unwrap();

    let blockers = storage.get_blockers_for_task(&alice, &tid("a")).await.unwrap();
    let pairs: Vec<(&DependencyId, &str)> = blockers
        .iter()
        .map(|l| (&l.dependency_id, l.task.id.as_str()))
        .collect();
    assert_eq!(pairs, vec![(&ab, "b"), (&ac, "c")]);

    let blocked_by_b = storage.get_blocked_by_task(&alice, &tid("b")).await.unwrap();
    assert_eq!(blocked_by_b.len(), 1);
    assert_eq!(blocked_by_b[0].dependency_id, ab);
    assert_eq!(blocked_by_b[0].task.id, tid("a"));

    assert!(storage.get_blocked_by_task(&alice, &tid("a")).await.unwrap().is_empty());
    assert!(storage.get_blockers_for_task(&alice, &tid("b")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_blockers_skip_deleted_tasks() {
    let (directory, mut storage) = storage_with(alice_tasks(&["a", "b", "c"]));
    let alice = as_user("alice");

    storage.create(&alice, &tid("a"), &tid("b")).await.unwrap();
    storage.create(&alice, &tid("a"), &tid("c")).await.unwrap();

    directory.remove(&tid("b")).await;

    let blockers = storage.get_blockers_for_task(&alice, &tid("a")).await.unwrap();
    assert_eq!(blockers.len(), 1);
    assert_eq!(blockers[0].task.id, tid("c"));

    // The dangling edge itself is still stored
    assert_eq!(storage.list(&alice).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_queries_for_anonymous_are_empty() {
    let (_, mut storage) = storage_with(alice_tasks(&["a", "b"]));
    storage
        .create(&as_user("alice"), &tid("a"), &tid("b"))
        .await
        .unwrap();
    let anon = Caller::Anonymous;

    assert!(storage.get_blockers_for_task(&anon, &tid("a")).await.unwrap().is_empty());
    assert!(storage.get_blocked_by_task(&anon, &tid("b")).await.unwrap().is_empty());
    assert!(storage.get_available_blockers(&anon, &tid("a")).await.unwrap().is_empty());
    assert!(storage.list(&anon).await.unwrap().is_empty());
    assert!(
        storage
            .get_dependencies_for_tasks_batch(&anon, &[tid("a"), tid("b")])
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_batch_consistency() {
    let (_, mut storage) = storage_with(alice_tasks(&["a", "b", "c"]));
    let alice = as_user("alice");

    // a blocks b, b blocks c
    storage.create(&alice, &tid("b"), &tid("a")).await.unwrap();
    storage.create(&alice, &tid("c"), &tid("b")).await.unwrap();

    let map = storage
        .get_dependencies_for_tasks_batch(&alice, &[tid("a"), tid("b"), tid("c")])
        .await
        .unwrap();

    let entry = |blockers: &[&str], blocking: &[&str]| TaskDependencies {
        blocker_ids: blockers.iter().map(|s| tid(s)).collect(),
        blocking_ids: blocking.iter().map(|s| tid(s)).collect(),
    };
    assert_eq!(map.len(), 3);
    assert_eq!(map[&tid("a")], entry(&[], &["b"]));
    assert_eq!(map[&tid("b")], entry(&["a"], &["c"]));
    assert_eq!(map[&tid("c")], entry(&["b"], &[]));
}

#[tokio::test]
async fn test_batch_includes_unknown_ids() {
    let (_, storage) = storage_with(alice_tasks(&["a"]));

    let map = storage
        .get_dependencies_for_tasks_batch(&as_user("alice"), &[tid("a"), tid("nope")])
        .await
        .unwrap();

    assert_eq!(map.len(), 2);
    assert_eq!(map[&tid("nope")], TaskDependencies::default());
}

#[tokio::test]
async fn test_available_blockers_excludes_self_existing_and_cycles() {
    let mut tasks = alice_tasks(&["a", "b", "c", "d"]);
    tasks.push(task("other-project", "p2", "alice"));
    tasks.push(task("bobs", "p1", "bob"));
    let (_, mut storage) = storage_with(tasks);
    let alice = as_user("alice");

    // b blocks a, a blocks c
    storage.create(&alice, &tid("a"), &tid("b")).await.unwrap();
    storage.create(&alice, &tid("c"), &tid("a")).await.unwrap();

    let available = storage.get_available_blockers(&alice, &tid("a")).await.unwrap();

    // a: self, b: already a blocker, c: would close a cycle
    assert_eq!(ids(&available), vec!["d"]);
}

#[tokio::test]
async fn test_available_blockers_for_missing_or_foreign_task() {
    let mut tasks = alice_tasks(&["a", "b"]);
    tasks.push(task("bobs", "p1", "bob"));
    let (_, storage) = storage_with(tasks);
    let alice = as_user("alice");

    assert!(storage.get_available_blockers(&alice, &tid("ghost")).await.unwrap().is_empty());
    assert!(storage.get_available_blockers(&alice, &tid("bobs")).await.unwrap().is_empty());
}

/// Every ordered pair of a small graph: `y` is offered as a blocker of `x`
/// exactly when `create(x, y)` would succeed.
#[rstest]
#[case::empty(&[])]
#[case::chain(&[("b", "a"), ("c", "b")])]
#[case::diamond(&[("b", "a"), ("c", "a"), ("d", "b"), ("d", "c")])]
#[case::star(&[("a", "b"), ("a", "c"), ("a", "d")])]
#[case::two_components(&[("b", "a"), ("d", "c")])]
#[tokio::test]
async fn test_picker_consistency(#[case] edges: &[(&str, &str)]) {
    let names = ["a", "b", "c", "d"];
    let mut tasks = alice_tasks(&names);
    tasks.push(task("z", "p2", "alice"));
    let (_, mut storage) = storage_with(tasks);
    let alice = as_user("alice");

    for (blocked, blocking) in edges {
        storage.create(&alice, &tid(blocked), &tid(blocking)).await.unwrap();
    }

    for x in names {
        let offered: BTreeSet<String> = storage
            .get_available_blockers(&alice, &tid(x))
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id.0)
            .collect();

        for y in names.iter().chain(&["z"]) {
            // Try the create for real, then undo it
            let accepted = match storage.create(&alice, &tid(x), &tid(y)).await {
                Ok(id) => {
                    storage.remove_by_id(&alice, &id).await.unwrap();
                    true
                }
                Err(_) => false,
            };
            assert_eq!(
                offered.contains(*y),
                accepted,
                "x={x} y={y} offered={offered:?}"
            );
        }
    }
}

// ========== Ownership Isolation ==========

#[tokio::test]
async fn test_ownership_isolation() {
    let (_, mut storage) = storage_with([
        task("a", "p1", "alice"),
        task("b", "p1", "alice"),
        task("x", "p1", "bob"),
        task("y", "p1", "bob"),
    ]);
    let alice = as_user("alice");
    let bob = as_user("bob");

    let alice_edge = storage.create(&alice, &tid("a"), &tid("b")).await.unwrap();
    let bob_edge = storage.create(&bob, &tid("x"), &tid("y")).await.unwrap();

    // Bob cannot see or use Alice's tasks and edges
    assert!(storage.get_blockers_for_task(&bob, &tid("a")).await.unwrap().is_empty());
    assert!(storage.get(&bob, &alice_edge).await.unwrap().is_none());
    assert_eq!(storage.list(&bob).await.unwrap().len(), 1);
    let err = storage.create(&bob, &tid("a"), &tid("y")).await.unwrap_err();
    assert!(matches!(err, Error::BlockedTaskNotFound));

    // Foreign edges cannot be removed
    let err = storage.remove_by_id(&bob, &alice_edge).await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized));
    let err = storage.remove(&bob, &tid("a"), &tid("b")).await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized));

    assert!(storage.get(&alice, &alice_edge).await.unwrap().is_some());
    assert!(storage.get(&bob, &bob_edge).await.unwrap().is_some());
}

#[tokio::test]
async fn test_ownership_isolation_with_colliding_edge_ids() {
    use chrono::Utc;
    use taskdeps::domain::{Dependency, DependencyType, UserId};

    let (_, mut storage) = storage_with([task("a", "p1", "alice"), task("b", "p1", "alice")]);

    // Bob's record references Alice's task ids
    let foreign = Dependency {
        id: DependencyId::new("dep-bob00001"),
        user_id: UserId::new("bob"),
        blocking_task_id: tid("b"),
        blocked_task_id: tid("a"),
        dependency_type: DependencyType::FinishToStart,
        created_at: Utc::now(),
    };
    let warnings = storage.import_dependencies(vec![foreign]).await.unwrap();
    assert!(warnings.is_empty());

    let alice = as_user("alice");
    assert!(storage.get_blockers_for_task(&alice, &tid("a")).await.unwrap().is_empty());
    assert!(
        !storage
            .get_available_blockers(&alice, &tid("a"))
            .await
            .unwrap()
            .is_empty()
    );

    // Alice can still create the same pair in her own graph
    storage.create(&alice, &tid("a"), &tid("b")).await.unwrap();
    assert_eq!(storage.export_all().await.unwrap().len(), 2);
}

// ========== End-to-End ==========

#[tokio::test]
async fn test_end_to_end_scenario() {
    let (_, mut storage) = storage_with([
        task("A", "P1", "alice"),
        task("B", "P1", "alice"),
        task("C", "P1", "alice"),
        task("D", "P2", "alice"),
    ]);
    let alice = as_user("alice");

    storage.create(&alice, &tid("A"), &tid("B")).await.unwrap();
    storage.create(&alice, &tid("B"), &tid("C")).await.unwrap();
    storage.create(&alice, &tid("A"), &tid("C")).await.unwrap();

    let err = storage.create(&alice, &tid("C"), &tid("A")).await.unwrap_err();
    assert!(matches!(err, Error::CircularDependency));

    let err = storage.create(&alice, &tid("D"), &tid("A")).await.unwrap_err();
    assert!(matches!(err, Error::ProjectMismatch));

    storage.remove(&alice, &tid("A"), &tid("B")).await.unwrap();
    storage.create(&alice, &tid("B"), &tid("A")).await.unwrap();

    let remaining: BTreeSet<(String, String)> = storage
        .list(&alice)
        .await
        .unwrap()
        .into_iter()
        .map(|d| (d.blocking_task_id.0, d.blocked_task_id.0))
        .collect();
    let expected: BTreeSet<(String, String)> = [("C", "B"), ("C", "A"), ("A", "B")]
        .into_iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();
    assert_eq!(remaining, expected);
}

// ========== Concurrency ==========

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_opposite_creates_admit_one() {
    let (_, storage) = storage_with(alice_tasks(&["a", "b"]));
    let storage = Arc::new(RwLock::new(storage));

    let mut handles = Vec::new();
    for (blocked, blocking) in [("a", "b"), ("b", "a")].repeat(8) {
        let storage = Arc::clone(&storage);
        handles.push(tokio::spawn(async move {
            storage
                .write()
                .await
                .create(&as_user("alice"), &tid(blocked), &tid(blocking))
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(storage.read().await.list(&as_user("alice")).await.unwrap().len(), 1);
}

// ========== Properties ==========

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    /// Whatever sequence of creates is attempted, the accepted edges never
    /// form a cycle.
    #[test]
    fn prop_successful_creates_stay_acyclic(
        attempts in prop::collection::vec((0usize..6, 0usize..6), 0..40)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let names: Vec<String> = (0..6).map(|i| format!("t{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();

        let edges = runtime.block_on(async {
            let (_, mut storage) = storage_with(alice_tasks(&refs));
            let alice = as_user("alice");
            for (blocked, blocking) in &attempts {
                let _ = storage
                    .create(&alice, &tid(&names[*blocked]), &tid(&names[*blocking]))
                    .await;
            }
            storage.list(&alice).await.unwrap()
        });

        let mut graph = petgraph::graphmap::DiGraphMap::<&str, ()>::new();
        for dep in &edges {
            prop_assert_ne!(&dep.blocking_task_id, &dep.blocked_task_id);
            graph.add_edge(dep.blocking_task_id.as_str(), dep.blocked_task_id.as_str(), ());
        }
        prop_assert!(!petgraph::algo::is_cyclic_directed(&graph));

        let pairs: BTreeSet<(&TaskId, &TaskId)> = edges
            .iter()
            .map(|d| (&d.blocking_task_id, &d.blocked_task_id))
            .collect();
        prop_assert_eq!(pairs.len(), edges.len());
    }
}
