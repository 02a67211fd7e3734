//! Sandboxed filesystem layout for originals and derived media.
//!
//! Media rows carry a `relative_path` under the originals root; derivatives
//! live under a separate derived root at a path computed deterministically
//! from the source's logical path. Every path that touches the filesystem
//! goes through [`paths::resolve_absolute`], which rejects traversal.

pub mod fs;
pub mod paths;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Resolved path escapes root directory: {0}")]
    PathEscape(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;
