//! DependencyStorage trait implementation for in-memory storage.

use super::InMemoryStorage;
use super::graph::would_create_cycle;
use super::jsonl::LoadWarning;
use crate::domain::{
    Caller, Dependency, DependencyId, DependencyMap, DependencyType, LinkedTask, Task, TaskId,
};
use crate::error::{Error, Result, StorageError};
use crate::storage::DependencyStorage;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

#[async_trait]
impl DependencyStorage for InMemoryStorage {
    async fn create(
        &mut self,
        caller: &Caller,
        blocked: &TaskId,
        blocking: &TaskId,
    ) -> Result<DependencyId> {
        let user = caller.user_id().ok_or(Error::Unauthorized)?;

        if blocked == blocking {
            return Err(Error::SelfDependency);
        }

        // Held until the insert below, so validation and insert are one step
        let mut inner = self.lock().await;

        // === Phase 1: All validations (no mutations) ===
        let blocked_task = inner
            .owned_task(user, blocked)
            .await?
            .ok_or(Error::BlockedTaskNotFound)?;
        let blocking_task = inner
            .owned_task(user, blocking)
            .await?
            .ok_or(Error::BlockingTaskNotFound)?;

        if blocked_task.project_id != blocking_task.project_id {
            return Err(Error::ProjectMismatch);
        }

        if let Some(graph) = inner.graph_for(user) {
            if graph.find_edge(blocking, blocked).is_some() {
                return Err(Error::DuplicateDependency);
            }

            if would_create_cycle(graph, blocked, blocking) {
                debug!(%blocked, %blocking, "Rejected dependency that would close a cycle");
                return Err(Error::CircularDependency);
            }
        }

        // === Phase 2: Insert (all validations passed) ===
        let id = inner
            .id_generator
            .generate(user, blocking, blocked)
            .map_err(|e| StorageError::IdGeneration(e.to_string()))?;

        inner.insert(Dependency {
            id: id.clone(),
            user_id: user.clone(),
            blocking_task_id: blocking.clone(),
            blocked_task_id: blocked.clone(),
            dependency_type: DependencyType::FinishToStart,
            created_at: Utc::now(),
        });

        info!(%id, %blocked, %blocking, "Created dependency");
        Ok(id)
    }

    async fn remove(&mut self, caller: &Caller, blocked: &TaskId, blocking: &TaskId) -> Result<()> {
        let user = caller.user_id().ok_or(Error::Unauthorized)?;
        let mut inner = self.lock().await;

        let owned = inner
            .graph_for(user)
            .and_then(|graph| graph.find_edge(blocking, blocked))
            .cloned();

        let Some(id) = owned else {
            // Same pair under another owner: it exists, but not for this caller
            let foreign = inner.dependencies.values().any(|dep| {
                &dep.blocked_task_id == blocked && &dep.blocking_task_id == blocking
            });
            return Err(if foreign {
                Error::Unauthorized
            } else {
                Error::DependencyNotFound
            });
        };

        inner.delete(&id);
        info!(%id, %blocked, %blocking, "Removed dependency");
        Ok(())
    }

    async fn remove_by_id(&mut self, caller: &Caller, id: &DependencyId) -> Result<()> {
        let user = caller.user_id().ok_or(Error::Unauthorized)?;
        let mut inner = self.lock().await;

        let dependency = inner
            .dependencies
            .get(id)
            .ok_or(Error::DependencyNotFound)?;
        if &dependency.user_id != user {
            return Err(Error::Unauthorized);
        }

        inner.delete(id);
        info!(%id, "Removed dependency");
        Ok(())
    }

    async fn get(&self, caller: &Caller, id: &DependencyId) -> Result<Option<Dependency>> {
        let Some(user) = caller.user_id() else {
            return Ok(None);
        };
        let inner = self.lock().await;
        Ok(inner
            .dependencies
            .get(id)
            .filter(|dep| &dep.user_id == user)
            .cloned())
    }

    async fn list(&self, caller: &Caller) -> Result<Vec<Dependency>> {
        let Some(user) = caller.user_id() else {
            return Ok(Vec::new());
        };
        let inner = self.lock().await;
        Ok(inner
            .owned_dependencies(user)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn would_create_cycle(
        &self,
        caller: &Caller,
        blocked: &TaskId,
        blocking: &TaskId,
    ) -> Result<bool> {
        let Some(user) = caller.user_id() else {
            return Ok(false);
        };
        if blocked == blocking {
            return Ok(true);
        }
        let inner = self.lock().await;
        Ok(inner
            .graph_for(user)
            .is_some_and(|graph| would_create_cycle(graph, blocked, blocking)))
    }

    async fn get_blockers_for_task(&self, caller: &Caller, task: &TaskId) -> Result<Vec<LinkedTask>> {
        let Some(user) = caller.user_id() else {
            return Ok(Vec::new());
        };
        let inner = self.lock().await;
        let Some(graph) = inner.graph_for(user) else {
            return Ok(Vec::new());
        };

        let edges = graph.blockers_of(task);
        let linked = resolve_linked(&inner, user, edges).await?;
        Ok(linked)
    }

    async fn get_blocked_by_task(&self, caller: &Caller, task: &TaskId) -> Result<Vec<LinkedTask>> {
        let Some(user) = caller.user_id() else {
            return Ok(Vec::new());
        };
        let inner = self.lock().await;
        let Some(graph) = inner.graph_for(user) else {
            return Ok(Vec::new());
        };

        let edges = graph.dependents_of(task);
        let linked = resolve_linked(&inner, user, edges).await?;
        Ok(linked)
    }

    async fn get_dependencies_for_tasks_batch(
        &self,
        caller: &Caller,
        task_ids: &[TaskId],
    ) -> Result<DependencyMap> {
        let Some(user) = caller.user_id() else {
            return Ok(DependencyMap::new());
        };

        let mut result: DependencyMap = task_ids
            .iter()
            .map(|id| (id.clone(), Default::default()))
            .collect();

        // One pass over the owner's edges instead of one lookup per task
        let inner = self.lock().await;
        for dep in inner.owned_dependencies(user) {
            if let Some(entry) = result.get_mut(&dep.blocked_task_id) {
                entry.blocker_ids.push(dep.blocking_task_id.clone());
            }
            if let Some(entry) = result.get_mut(&dep.blocking_task_id) {
                entry.blocking_ids.push(dep.blocked_task_id.clone());
            }
        }

        Ok(result)
    }

    async fn get_available_blockers(&self, caller: &Caller, task: &TaskId) -> Result<Vec<Task>> {
        let Some(user) = caller.user_id() else {
            return Ok(Vec::new());
        };
        let inner = self.lock().await;

        let Some(target) = inner.owned_task(user, task).await? else {
            return Ok(Vec::new());
        };

        let candidates = inner
            .tasks
            .list_by_project(user, &target.project_id)
            .await?;

        let Some(graph) = inner.graph_for(user) else {
            // No edges yet: every other task in the project qualifies
            return Ok(candidates.into_iter().filter(|c| &c.id != task).collect());
        };

        let existing: HashSet<TaskId> = graph
            .blockers_of(task)
            .into_iter()
            .map(|(_, blocker)| blocker)
            .collect();

        Ok(candidates
            .into_iter()
            .filter(|candidate| {
                &candidate.id != task
                    && !existing.contains(&candidate.id)
                    && !would_create_cycle(graph, task, &candidate.id)
            })
            .collect())
    }

    async fn import_dependencies(&mut self, dependencies: Vec<Dependency>) -> Result<Vec<LoadWarning>> {
        let mut inner = self.lock().await;

        let mut warnings = Vec::new();
        for dependency in dependencies {
            if let Err(warning) = inner.insert_checked(dependency) {
                warn!(?warning, "Skipped dependency during import");
                warnings.push(warning);
            }
        }

        Ok(warnings)
    }

    async fn export_all(&self) -> Result<Vec<Dependency>> {
        let inner = self.lock().await;
        Ok(inner.dependencies.values().cloned().collect())
    }

    async fn save(&self) -> Result<()> {
        // Pure in-memory storage has nowhere to persist to
        Ok(())
    }

    async fn reload(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Turn `(edge id, task id)` pairs into [`LinkedTask`]s, oldest edge first.
///
/// Tasks that no longer exist, or that `user` does not own, are dropped.
async fn resolve_linked(
    inner: &super::inner::InMemoryStorageInner,
    user: &crate::domain::UserId,
    edges: Vec<(DependencyId, TaskId)>,
) -> Result<Vec<LinkedTask>> {
    let mut linked = Vec::with_capacity(edges.len());
    let mut created: HashMap<DependencyId, chrono::DateTime<Utc>> = HashMap::new();

    for (dependency_id, task_id) in edges {
        let Some(dependency) = inner.dependencies.get(&dependency_id) else {
            continue;
        };
        if &dependency.user_id != user {
            continue;
        }

        match inner.owned_task(user, &task_id).await? {
            Some(task) => {
                created.insert(dependency_id.clone(), dependency.created_at);
                linked.push(LinkedTask {
                    dependency_id,
                    task,
                });
            }
            None => debug!(%dependency_id, task = %task_id, "Skipping edge to missing task"),
        }
    }

    linked.sort_by(|a, b| {
        created[&a.dependency_id]
            .cmp(&created[&b.dependency_id])
            .then_with(|| a.dependency_id.cmp(&b.dependency_id))
    });
    Ok(linked)
}
