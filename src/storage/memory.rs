use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{FileStore, StorageError, relative_path};

/// In-memory store for tests. Can be told to fail on one file name.
#[derive(Default)]
pub struct MemoryFileStore {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    writes: Mutex<usize>,
    fail_on: Option<String>,
}

impl MemoryFileStore {
    pub fn failing_on(filename: &str) -> Self {
        Self {
            fail_on: Some(filename.to_string()),
            ..Default::default()
        }
    }

    pub fn paths(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn store(
        &self,
        bytes: &[u8],
        namespace: &str,
        filename: &str,
    ) -> Result<String, StorageError> {
        if self.fail_on.as_deref() == Some(filename) {
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }

        let path = relative_path(namespace, filename)?;
        *self.writes.lock().unwrap() += 1;
        self.files.lock().unwrap().insert(path.clone(), bytes.to_vec());
        Ok(path)
    }
}
