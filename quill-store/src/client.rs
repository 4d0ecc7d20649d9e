//! The object-store contract.

use crate::error::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for a stored object (HEAD result).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Object size in bytes.
    pub size: u64,
    /// Last modification time as reported by the store.
    pub last_modified: DateTime<Utc>,
}

/// Primitive key-addressed operations against the object store.
///
/// One instance is shared across all concurrent operations and must
/// tolerate concurrent use. Per-call timeouts are this layer's concern,
/// orthogonal to engine-level cancellation.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `data` under `key`, overwriting any existing object.
    async fn put(&self, key: &str, data: Vec<u8>) -> StoreResult<()>;

    /// Fetches the object at `key`. `NotFound` if absent.
    async fn get(&self, key: &str) -> StoreResult<Vec<u8>>;

    /// Deletes the object at `key`. Deleting an absent key succeeds,
    /// matching S3 semantics.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// True if an object exists at `key`.
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// All keys under `prefix`.
    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Immediate sub-prefixes under `prefix` (delimiter `/`).
    async fn list_common_prefixes(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Size and last-modified for the object at `key`. `NotFound` if absent.
    async fn head(&self, key: &str) -> StoreResult<ObjectMeta>;
}
