//! Persisted severity trend.
//!
//! Stored as a single JSON array of integers and rewritten in full on every
//! append.

use std::io::ErrorKind;
use std::path::PathBuf;

use tokio::fs;
use tracing::{debug, warn};

use super::atomic_write_file;
use super::error::{StorageError, StorageResult};

/// Append-only sequence of per-consultation symptom counts.
#[derive(Debug)]
pub struct TrendStore {
    path: PathBuf,
    values: Vec<u32>,
}

impl TrendStore {
    /// Load the trend. A missing, unreadable, or malformed file yields an
    /// empty trend.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path).await {
            Ok(contents) => match serde_json::from_str::<Vec<u32>>(&contents) {
                Ok(values) => values,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Malformed trend file, starting empty");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read trend file, starting empty");
                Vec::new()
            }
        };
        debug!(path = %path.display(), points = values.len(), "Loaded severity trend");
        Self { path, values }
    }

    pub fn values(&self) -> &[u32] {
        &self.values
    }

    /// Append one data point and rewrite the file.
    pub async fn append(&mut self, count: u32) -> StorageResult<()> {
        self.values.push(count);
        let data = serde_json::to_vec(&self.values)?;
        atomic_write_file(&self.path, &data).await
    }

    /// Forget every data point and delete the file.
    pub async fn clear(&mut self) -> StorageResult<()> {
        self.values.clear();
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::file_io(&self.path, e)),
        }
    }
}
