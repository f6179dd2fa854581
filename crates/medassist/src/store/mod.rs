//! File-based storage.
//!
//! - JSON for the severity trend
//! - `KEY=value` lines for saved credentials (see [`crate::credentials`])
//!
//! All writes use atomic operations (temp file + rename) to prevent corruption.

use std::path::Path;

use tokio::fs;
use tokio::io::AsyncWriteExt;

mod error;
mod trend;

pub use error::{StorageError, StorageResult};
pub use trend::TrendStore;

/// Write data to a temp file, fsync it, then atomically rename to the final path.
///
/// The temp file name is generated internally using a ULID to avoid collisions
/// from concurrent writers targeting the same final path.
pub(crate) async fn atomic_write_file(final_path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = final_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::file_io(parent, e))?;
    }

    let file_name = final_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file");
    let temp_path = final_path.with_file_name(format!("{}.{}.tmp", file_name, ulid::Ulid::new()));

    let mut file = fs::File::create(&temp_path)
        .await
        .map_err(|e| StorageError::file_io(&temp_path, e))?;
    file.write_all(data)
        .await
        .map_err(|e| StorageError::file_io(&temp_path, e))?;
    file.sync_all()
        .await
        .map_err(|e| StorageError::file_io(&temp_path, e))?;
    fs::rename(&temp_path, final_path)
        .await
        .map_err(|e| StorageError::file_io(final_path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn atomic_write_replaces_contents_and_leaves_no_temp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("data.json");

        atomic_write_file(&path, b"[1]").await.unwrap();
        atomic_write_file(&path, b"[1,2]").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[1,2]");
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
    }
}
