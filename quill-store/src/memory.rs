//! In-memory [`ObjectStore`] fake for tests.
//!
//! Behaves like a flat S3 bucket and supports fault injection: individual
//! keys can be made to fail with a connection error, and listing can be
//! failed wholesale to exercise prerequisite-listing error paths.

use crate::client::{ObjectMeta, ObjectStore};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Clone)]
struct StoredObject {
    data: Vec<u8>,
    last_modified: DateTime<Utc>,
}

/// In-memory object store with fault injection.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    failing_keys: RwLock<HashSet<String>>,
    fail_listing: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation on `key` fail with a connection error.
    pub async fn fail_key(&self, key: &str) {
        self.failing_keys.write().await.insert(key.to_string());
    }

    /// Makes `list`/`list_common_prefixes` fail with a connection error.
    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Clears all injected faults.
    pub async fn clear_failures(&self) {
        self.failing_keys.write().await.clear();
        self.fail_listing.store(false, Ordering::SeqCst);
    }

    /// Seeds an object with an explicit modification time, for diff tests.
    pub async fn seed(&self, key: &str, data: &[u8], last_modified: DateTime<Utc>) {
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                last_modified,
            },
        );
    }

    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    async fn check_key(&self, key: &str) -> StoreResult<()> {
        if self.failing_keys.read().await.contains(key) {
            return Err(StoreError::Connection(format!(
                "injected failure for {key}"
            )));
        }
        Ok(())
    }

    fn check_listing(&self) -> StoreResult<()> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("injected listing failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> StoreResult<()> {
        self.check_key(key).await?;
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.check_key(key).await?;
        self.objects
            .read()
            .await
            .get(key)
            .map(|obj| obj.data.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.check_key(key).await?;
        // Deleting an absent key succeeds, as on S3.
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.check_key(key).await?;
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.check_listing()?;
        Ok(self
            .objects
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn list_common_prefixes(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.check_listing()?;
        let objects = self.objects.read().await;
        let mut prefixes: Vec<String> = Vec::new();
        for key in objects.keys().filter(|k| k.starts_with(prefix)) {
            let rest = &key[prefix.len()..];
            if let Some(slash) = rest.find('/') {
                let common = format!("{prefix}{}", &rest[..=slash]);
                if prefixes.last() != Some(&common) {
                    prefixes.push(common);
                }
            }
        }
        prefixes.dedup();
        Ok(prefixes)
    }

    async fn head(&self, key: &str) -> StoreResult<ObjectMeta> {
        self.check_key(key).await?;
        self.objects
            .read()
            .await
            .get(key)
            .map(|obj| ObjectMeta {
                size: obj.data.len() as u64,
                last_modified: obj.last_modified,
            })
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}
