//! JSONL persistence for in-memory storage.
//!
//! Each line of the dependencies file is one serialized [`Dependency`].

use super::inner::InMemoryStorageInner;
use crate::domain::{Dependency, DependencyId, TaskId};
use crate::error::Result;
use crate::jsonl::{read_jsonl_resilient, write_jsonl_atomic};
use crate::storage::DependencyStorage;
use crate::tasks::TaskDirectory;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Warnings that can occur while loading dependencies.
///
/// These are non-fatal: the offending record is skipped and loading
/// continues. Every other record is still available afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// Malformed JSON line that couldn't be parsed
    MalformedJson {
        /// 1-based line number
        line_number: usize,
        /// Parser error
        error: String,
    },

    /// Record whose blocking and blocked task are the same
    SelfDependency {
        /// Offending edge
        id: DependencyId,
    },

    /// Record reusing an id that was already loaded
    DuplicateId {
        /// Offending edge
        id: DependencyId,
    },

    /// Second record for the same owner and ordered task pair
    DuplicateEdge {
        /// Offending edge
        id: DependencyId,
        /// Blocking side
        blocking: TaskId,
        /// Blocked side
        blocked: TaskId,
    },

    /// Record that would close a cycle with edges loaded before it
    CircularDependency {
        /// Offending edge
        id: DependencyId,
        /// Blocking side
        blocking: TaskId,
        /// Blocked side
        blocked: TaskId,
    },
}

/// Load storage from a JSONL file.
///
/// Records are re-validated against the graph invariants in file order.
/// The first record of a conflicting set wins; later ones are skipped with
/// a [`LoadWarning`]. Edges pointing at tasks that no longer exist are kept.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub async fn load_from_jsonl(
    path: &Path,
    tasks: Arc<dyn TaskDirectory>,
) -> Result<(Box<dyn DependencyStorage>, Vec<LoadWarning>)> {
    let (inner, warnings) = load_inner(path, tasks).await?;
    Ok((Box::new(Arc::new(Mutex::new(inner))), warnings))
}

pub(crate) async fn load_inner(
    path: &Path,
    tasks: Arc<dyn TaskDirectory>,
) -> Result<(InMemoryStorageInner, Vec<LoadWarning>)> {
    let (records, jsonl_warnings) = read_jsonl_resilient::<Dependency>(path).await?;

    let mut warnings: Vec<LoadWarning> = jsonl_warnings
        .into_iter()
        .map(|w| LoadWarning::MalformedJson {
            line_number: w.line_number,
            error: w.error,
        })
        .collect();

    let mut inner = InMemoryStorageInner::new(tasks);
    let total = records.len();
    for record in records {
        if let Err(warning) = inner.insert_checked(record) {
            warnings.push(warning);
        }
    }

    debug!(
        path = %path.display(),
        loaded = inner.dependencies.len(),
        total,
        warnings = warnings.len(),
        "Loaded dependencies"
    );

    Ok((inner, warnings))
}

/// Save storage to a JSONL file with atomic writes.
///
/// Records are sorted by owner, creation time and id so that repeated saves
/// of the same data produce identical files.
///
/// # Errors
///
/// Returns an error if serialization or any file operation fails. The
/// previous file content is preserved on failure.
pub async fn save_to_jsonl(storage: &dyn DependencyStorage, path: &Path) -> Result<()> {
    let mut dependencies = storage.export_all().await?;
    dependencies.sort_by(|a, b| {
        a.user_id
            .cmp(&b.user_id)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });

    write_jsonl_atomic(path, &dependencies).await?;

    debug!(path = %path.display(), count = dependencies.len(), "Saved dependencies");
    Ok(())
}
