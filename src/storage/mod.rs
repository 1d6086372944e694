//! Proof-artifact storage.
//!
//! The attendance workflow only needs `store(bytes, namespace, filename) -> path`;
//! no batching or transactions across calls are assumed.

mod local;
#[cfg(test)]
pub mod memory;

pub use local::LocalDiskStore;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable, publicly servable storage addressed by `namespace/filename`.
///
/// Storing under an existing address replaces the previous content.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Write `bytes` and return the relative path later used to serve them.
    async fn store(
        &self,
        bytes: &[u8],
        namespace: &str,
        filename: &str,
    ) -> Result<String, StorageError>;
}

/// Joins and checks a relative storage address. Rejects empty, `.`, `..`
/// and backslash-carrying segments so nothing escapes the store root.
pub(crate) fn relative_path(namespace: &str, filename: &str) -> Result<String, StorageError> {
    if filename.contains('/') {
        return Err(StorageError::InvalidPath(filename.to_string()));
    }

    let path = format!("{}/{}", namespace.trim_end_matches('/'), filename);
    let ok = path
        .split('/')
        .all(|seg| !seg.is_empty() && seg != "." && seg != ".." && !seg.contains('\\'));

    if ok {
        Ok(path)
    } else {
        Err(StorageError::InvalidPath(path))
    }
}
