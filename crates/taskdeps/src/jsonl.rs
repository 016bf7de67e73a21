//! JSON Lines helpers shared by the dependency and task files.
//!
//! Reading is resilient: a malformed line becomes a [`JsonlWarning`] and
//! loading continues. Writing is atomic: data goes to a `.tmp` sibling
//! which is then renamed over the target.
//!
//! Writers that share a file across processes serialize through a
//! [`FileLock`] on a `.lock` sibling.

use crate::error::{Result, StorageError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

/// A non-fatal problem met while reading a JSONL file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonlWarning {
    /// 1-based line number
    pub line_number: usize,

    /// Parser error description
    pub error: String,
}

/// Read every record of a JSONL file, skipping lines that fail to parse.
///
/// Blank lines are ignored silently.
///
/// # Errors
///
/// Returns an error only if the file cannot be opened or read.
pub async fn read_jsonl_resilient<T>(path: &Path) -> Result<(Vec<T>, Vec<JsonlWarning>)>
where
    T: DeserializeOwned,
{
    let file = File::open(path).await?;
    let mut lines = BufReader::new(file).lines();

    let mut records = Vec::new();
    let mut warnings = Vec::new();
    let mut line_number = 0;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<T>(trimmed) {
            Ok(record) => records.push(record),
            Err(e) => warnings.push(JsonlWarning {
                line_number,
                error: e.to_string(),
            }),
        }
    }

    Ok((records, warnings))
}

/// Atomically write `values` to `path`, one JSON document per line.
///
/// # Errors
///
/// Returns an error if serialization fails or the temp file cannot be
/// written or renamed. The original file is left untouched in that case.
pub async fn write_jsonl_atomic<'a, T, I>(path: &Path, values: I) -> Result<()>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let temp_path = path.with_extension("tmp");

    let file = File::create(&temp_path).await?;
    let mut writer = BufWriter::new(file);

    for value in values {
        let json = serde_json::to_string(value).map_err(StorageError::Serialization)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }

    writer.flush().await?;
    drop(writer);

    tokio::fs::rename(&temp_path, path).await?;

    Ok(())
}

/// Exclusive advisory lock on the `.lock` sibling of a data file.
///
/// Held from the moment a writer re-reads the file until its replacement
/// has been renamed into place. The OS drops the lock when the guard is
/// dropped or the process exits, so a crash never leaves it stale.
#[derive(Debug)]
pub struct FileLock {
    file: std::fs::File,
    path: PathBuf,
}

impl FileLock {
    /// Block until the lock for `data_path` is ours.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be opened or locked.
    pub async fn acquire(data_path: &Path) -> Result<Self> {
        let path = lock_path(data_path);
        let lock = tokio::task::spawn_blocking(move || -> std::io::Result<Self> {
            let file = std::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)?;
            file.lock()?;
            Ok(Self { file, path })
        })
        .await
        .map_err(std::io::Error::other)??;

        tracing::trace!(path = %lock.path.display(), "Acquired file lock");
        Ok(lock)
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to release file lock");
        }
    }
}

/// The lock file guarding `data_path`.
pub fn lock_path(data_path: &Path) -> PathBuf {
    data_path.with_extension("lock")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: u32,
        name: String,
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("rows.jsonl");

        let rows = vec![
            Row {
                id: 1,
                name: "one".to_string(),
            },
            Row {
                id: 2,
                name: "two".to_string(),
            },
        ];
        write_jsonl_atomic(&path, &rows).await.unwrap();

        let (read, warnings): (Vec<Row>, _) = read_jsonl_resilient(&path).await.unwrap();
        assert_eq!(read, rows);
        assert!(warnings.is_empty());
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_malformed_lines_become_warnings() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("rows.jsonl");
        std::fs::write(
            &path,
            "{\"id\":1,\"name\":\"ok\"}\n\n{not json}\n{\"id\":2}\n{\"id\":3,\"name\":\"ok\"}\n",
        )
        .unwrap();

        let (read, warnings): (Vec<Row>, _) = read_jsonl_resilient(&path).await.unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[1].id, 3);

        let lines: Vec<usize> = warnings.iter().map(|w| w.line_number).collect();
        assert_eq!(lines, vec![3, 4]);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let result: Result<(Vec<Row>, _)> =
            read_jsonl_resilient(&temp.path().join("absent.jsonl")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_file_lock_is_exclusive() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("rows.jsonl");

        let held = FileLock::acquire(&path).await.unwrap();
        assert_eq!(held.path(), lock_path(&path));

        // A second handle cannot take the lock while the first is alive
        let other = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(lock_path(&path))
            .unwrap();
        assert!(other.try_lock().is_err());

        drop(held);
        assert!(other.try_lock().is_ok());
        other.unlock().unwrap();

        // Re-acquiring after release does not block
        let again = FileLock::acquire(&path).await.unwrap();
        drop(again);
    }
}
