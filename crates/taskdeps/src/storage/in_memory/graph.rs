//! Dependency graph traversal.
//!
//! Edges point **blocking -> blocked**. Adding a new edge
//! `candidate_blocking -> candidate_blocked` closes a loop exactly when
//! `candidate_blocked` already (transitively) blocks `candidate_blocking`.
//! [`would_create_cycle`] answers that by walking backwards from
//! `candidate_blocking` through "what blocks this task" until it either
//! meets `candidate_blocked` or runs out of tasks.
//!
//! The same predicate backs both `create` and `get_available_blockers`, so
//! the picker never offers a choice that `create` would reject.

use super::inner::OwnerGraph;
use crate::domain::TaskId;
use petgraph::Direction;
use petgraph::visit::EdgeRef;
use std::collections::{HashSet, VecDeque};

/// Whether adding `candidate_blocking -> candidate_blocked` would create a cycle.
///
/// Breadth-first search over `graph`, starting at `candidate_blocking` and
/// following incoming edges (blockers). Returns as soon as
/// `candidate_blocked` is dequeued. O(V + E) in the owner's graph.
pub(crate) fn would_create_cycle<'a>(
    graph: &'a OwnerGraph,
    candidate_blocked: &TaskId,
    candidate_blocking: &'a TaskId,
) -> bool {
    let mut visited = HashSet::new();
    let mut queue: VecDeque<&'a TaskId> = VecDeque::from([candidate_blocking]);

    while let Some(current) = queue.pop_front() {
        if current == candidate_blocked {
            return true;
        }

        // Tasks without edges have no node, and nothing blocks them
        let Some(node) = graph.node(current) else {
            continue;
        };

        if !visited.insert(node) {
            continue;
        }

        for edge in graph.graph.edges_directed(node, Direction::Incoming) {
            queue.push_back(&graph.graph[edge.source()]);
        }
    }

    false
}
