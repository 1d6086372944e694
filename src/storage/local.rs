use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::{FileStore, StorageError, relative_path};

/// Stores files below a root directory on the local disk (the "public" disk).
#[derive(Debug, Clone)]
pub struct LocalDiskStore {
    root: PathBuf,
}

impl LocalDiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl FileStore for LocalDiskStore {
    async fn store(
        &self,
        bytes: &[u8],
        namespace: &str,
        filename: &str,
    ) -> Result<String, StorageError> {
        let relative = relative_path(namespace, filename)?;
        let target = self.root.join(&relative);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;

        debug!(path = %relative, size = bytes.len(), "Stored file");
        Ok(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("hr-attendance-{}", uuid::Uuid::new_v4()))
    }

    #[actix_web::test]
    async fn writes_and_overwrites_under_root() {
        let root = scratch_dir();
        let store = LocalDiskStore::new(&root);

        let first = store.store(b"one", "proofs/1/2026-01-05", "selfie.png").await.unwrap();
        let second = store.store(b"two", "proofs/1/2026-01-05", "selfie.png").await.unwrap();

        assert_eq!(first, "proofs/1/2026-01-05/selfie.png");
        assert_eq!(first, second);
        let on_disk = tokio::fs::read(root.join(&first)).await.unwrap();
        assert_eq!(on_disk, b"two");

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[actix_web::test]
    async fn refuses_to_leave_root() {
        let store = LocalDiskStore::new(scratch_dir());
        let err = store.store(b"x", "../outside", "f.png").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));
    }
}
