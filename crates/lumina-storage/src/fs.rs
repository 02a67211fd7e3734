//! Small async filesystem helpers shared by the API and the worker.

use std::io;
use std::path::Path;

use tokio::fs;

use crate::StorageResult;

/// True if the file exists and is reachable; probe errors count as absent.
pub async fn file_exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

/// Create the parent directory chain for `path` if it is missing.
pub async fn ensure_parent_dir(path: &Path) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

/// Remove a file, treating an already-missing file as success.
/// Returns whether a file was actually removed.
pub async fn remove_file_if_present(path: &Path) -> StorageResult<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}
