//! The local note tree, as the coordinator sees it.
//!
//! The real implementation (vault on disk) lives in the host application;
//! the engine only needs enumeration, reads, and writes keyed by the same
//! relative paths used as object keys.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quill_store::{StoreError, StoreResult};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// One file in the local tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalEntry {
    /// Relative path, identical to the remote object key.
    pub path: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Read/write access to the local note tree.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Every file in the tree. Folders are implicit in the paths.
    async fn entries(&self) -> StoreResult<Vec<LocalEntry>>;

    /// Reads the file at `path`. `NotFound` if absent.
    async fn read(&self, path: &str) -> StoreResult<Vec<u8>>;

    /// Writes `data` to `path`, creating parents as needed.
    async fn write(&self, path: &str, data: Vec<u8>) -> StoreResult<()>;
}

#[derive(Clone)]
struct LocalFile {
    data: Vec<u8>,
    modified: DateTime<Utc>,
}

/// In-memory [`LocalStore`] for tests.
#[derive(Default)]
pub struct MemoryLocalStore {
    files: RwLock<BTreeMap<String, LocalFile>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a file with an explicit modification time, for diff tests.
    pub async fn seed(&self, path: &str, data: &[u8], modified: DateTime<Utc>) {
        self.files.write().await.insert(
            path.to_string(),
            LocalFile {
                data: data.to_vec(),
                modified,
            },
        );
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.files.read().await.contains_key(path)
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn entries(&self) -> StoreResult<Vec<LocalEntry>> {
        Ok(self
            .files
            .read()
            .await
            .iter()
            .map(|(path, file)| LocalEntry {
                path: path.clone(),
                size: file.data.len() as u64,
                modified: file.modified,
            })
            .collect())
    }

    async fn read(&self, path: &str) -> StoreResult<Vec<u8>> {
        self.files
            .read()
            .await
            .get(path)
            .map(|f| f.data.clone())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn write(&self, path: &str, data: Vec<u8>) -> StoreResult<()> {
        self.files.write().await.insert(
            path.to_string(),
            LocalFile {
                data,
                modified: Utc::now(),
            },
        );
        Ok(())
    }
}
