//! Core in-memory storage data structures.
//!
//! This module contains the inner storage structure that holds all edges
//! and is wrapped in `Arc<Mutex<>>` for thread safety.

use super::jsonl::LoadWarning;
use crate::domain::{Dependency, DependencyId, Task, TaskId, UserId};
use crate::error::Result;
use crate::id_generation::DependencyIdGenerator;
use crate::tasks::TaskDirectory;
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;
use std::sync::Arc;

/// One owner's dependency graph.
///
/// Edges point **blocking -> blocked** and carry the edge's [`DependencyId`].
/// The blockers of a task are therefore its incoming neighbours, and the
/// tasks it blocks are its outgoing neighbours.
///
/// Nodes are created on first use and removed once their last edge goes, so
/// the graph only ever holds tasks that take part in some dependency. A
/// `StableDiGraph` keeps the remaining `NodeIndex` values valid across
/// removals.
#[derive(Debug, Default)]
pub(crate) struct OwnerGraph {
    pub(super) graph: StableDiGraph<TaskId, DependencyId>,

    /// All nodes in `graph` have an entry here, and vice versa.
    pub(super) node_map: HashMap<TaskId, NodeIndex>,
}

impl OwnerGraph {
    pub(super) fn node(&self, task: &TaskId) -> Option<NodeIndex> {
        self.node_map.get(task).copied()
    }

    fn ensure_node(&mut self, task: &TaskId) -> NodeIndex {
        if let Some(node) = self.node(task) {
            return node;
        }
        let node = self.graph.add_node(task.clone());
        self.node_map.insert(task.clone(), node);
        node
    }

    /// Id of the `blocking -> blocked` edge, if present.
    pub(super) fn find_edge(&self, blocking: &TaskId, blocked: &TaskId) -> Option<&DependencyId> {
        let from = self.node(blocking)?;
        let to = self.node(blocked)?;
        let edge = self.graph.find_edge(from, to)?;
        self.graph.edge_weight(edge)
    }

    pub(super) fn add_edge(&mut self, dependency: &Dependency) {
        let from = self.ensure_node(&dependency.blocking_task_id);
        let to = self.ensure_node(&dependency.blocked_task_id);
        self.graph.add_edge(from, to, dependency.id.clone());
    }

    /// Remove the `blocking -> blocked` edge and prune nodes left without edges.
    pub(super) fn remove_edge(&mut self, blocking: &TaskId, blocked: &TaskId) -> Option<DependencyId> {
        let from = self.node(blocking)?;
        let to = self.node(blocked)?;
        let edge = self.graph.find_edge(from, to)?;
        let id = self.graph.remove_edge(edge);

        self.prune(from);
        self.prune(to);

        id
    }

    fn prune(&mut self, node: NodeIndex) {
        let isolated = self
            .graph
            .neighbors_undirected(node)
            .next()
            .is_none();
        if isolated {
            if let Some(task) = self.graph.remove_node(node) {
                self.node_map.remove(&task);
            }
        }
    }

    /// Edges into `task`: `(edge id, blocking task)` pairs.
    pub(super) fn blockers_of(&self, task: &TaskId) -> Vec<(DependencyId, TaskId)> {
        self.neighbours(task, Direction::Incoming)
    }

    /// Edges out of `task`: `(edge id, blocked task)` pairs.
    pub(super) fn dependents_of(&self, task: &TaskId) -> Vec<(DependencyId, TaskId)> {
        self.neighbours(task, Direction::Outgoing)
    }

    fn neighbours(&self, task: &TaskId, direction: Direction) -> Vec<(DependencyId, TaskId)> {
        let Some(node) = self.node(task) else {
            return Vec::new();
        };

        self.graph
            .edges_directed(node, direction)
            .map(|edge| {
                let other = match direction {
                    Direction::Incoming => edge.source(),
                    Direction::Outgoing => edge.target(),
                };
                (edge.weight().clone(), self.graph[other].clone())
            })
            .collect()
    }

    pub(super) fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

/// Inner storage structure (not thread-safe).
///
/// Holds every edge by id plus one [`OwnerGraph`] per user. Graphs are
/// partitioned by owner so one user's edges can never take part in another
/// user's traversal, even if task ids collide.
pub(crate) struct InMemoryStorageInner {
    /// Every edge, indexed by id.
    pub(super) dependencies: HashMap<DependencyId, Dependency>,

    /// Per-owner adjacency.
    ///
    /// Invariant: an edge is in `dependencies` iff it is in the graph of its
    /// `user_id`.
    pub(super) graphs: HashMap<UserId, OwnerGraph>,

    /// ID generator for creating new dependency IDs
    pub(super) id_generator: DependencyIdGenerator,

    /// Read-only task lookups
    pub(super) tasks: Arc<dyn TaskDirectory>,
}

impl InMemoryStorageInner {
    /// Create a new empty storage instance
    pub(crate) fn new(tasks: Arc<dyn TaskDirectory>) -> Self {
        Self {
            dependencies: HashMap::new(),
            graphs: HashMap::new(),
            id_generator: DependencyIdGenerator::new(),
            tasks,
        }
    }

    pub(super) fn graph_for(&self, user: &UserId) -> Option<&OwnerGraph> {
        self.graphs.get(user)
    }

    /// Look up `id` and return it only if `user` owns it.
    pub(super) async fn owned_task(&self, user: &UserId, id: &TaskId) -> Result<Option<Task>> {
        Ok(self
            .tasks
            .get(id)
            .await?
            .filter(|task| task.is_owned_by(user)))
    }

    /// Edges owned by `user`, oldest first.
    pub(super) fn owned_dependencies(&self, user: &UserId) -> Vec<&Dependency> {
        let mut owned: Vec<&Dependency> = self
            .dependencies
            .values()
            .filter(|dep| &dep.user_id == user)
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        owned
    }

    /// Insert an edge whose task-level checks already passed.
    pub(super) fn insert(&mut self, dependency: Dependency) {
        self.id_generator.register_id(&dependency.id);
        self.graphs
            .entry(dependency.user_id.clone())
            .or_default()
            .add_edge(&dependency);
        self.dependencies.insert(dependency.id.clone(), dependency);
    }

    /// Delete an edge by id, keeping the per-owner graph in sync.
    pub(super) fn delete(&mut self, id: &DependencyId) -> Option<Dependency> {
        let dependency = self.dependencies.remove(id)?;
        self.id_generator.release_id(id);

        if let Some(graph) = self.graphs.get_mut(&dependency.user_id) {
            graph.remove_edge(&dependency.blocking_task_id, &dependency.blocked_task_id);
            if graph.edge_count() == 0 {
                self.graphs.remove(&dependency.user_id);
            }
        }

        Some(dependency)
    }

    /// Insert a persisted edge after re-checking the graph invariants.
    ///
    /// Task existence and project membership are not checked here: tasks may
    /// have been deleted since the edge was written, and dangling edges are
    /// tolerated (read paths filter them out).
    pub(super) fn insert_checked(
        &mut self,
        dependency: Dependency,
    ) -> std::result::Result<(), LoadWarning> {
        if dependency.blocking_task_id == dependency.blocked_task_id {
            return Err(LoadWarning::SelfDependency { id: dependency.id });
        }

        if self.dependencies.contains_key(&dependency.id) {
            return Err(LoadWarning::DuplicateId { id: dependency.id });
        }

        if let Some(graph) = self.graphs.get(&dependency.user_id) {
            if graph
                .find_edge(&dependency.blocking_task_id, &dependency.blocked_task_id)
                .is_some()
            {
                return Err(LoadWarning::DuplicateEdge {
                    id: dependency.id,
                    blocking: dependency.blocking_task_id,
                    blocked: dependency.blocked_task_id,
                });
            }

            if super::graph::would_create_cycle(
                graph,
                &dependency.blocked_task_id,
                &dependency.blocking_task_id,
            ) {
                return Err(LoadWarning::CircularDependency {
                    id: dependency.id,
                    blocking: dependency.blocking_task_id,
                    blocked: dependency.blocked_task_id,
                });
            }
        }

        self.insert(dependency);
        Ok(())
    }
}
