//! Storage repository — single, batch, and recursive folder operations.
//!
//! All network calls go through the injected [`ObjectStore`]; batch work
//! runs under a bounded concurrency window and aggregates per-item
//! outcomes into a [`BatchResult`]. A per-item failure never aborts its
//! siblings; the whole call only errors before any dispatch (invalid
//! input, offline store, failed prerequisite listing).

use crate::progress::{BatchFailure, BatchProgress, BatchResult, ProgressFn};
use futures::stream::{self, StreamExt};
use quill_store::{ObjectMeta, ObjectStore, S3Config, S3ObjectStore, StoreError, StoreResult};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default bound on in-flight network calls per batch.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Connectivity probe, consulted before dispatching a batch or starting a
/// sync pass. Never polled mid-batch.
pub trait NetworkInfo: Send + Sync {
    fn is_connected(&self) -> bool;
}

/// `NetworkInfo` for hosts without a connectivity probe.
pub struct AlwaysOnline;

impl NetworkInfo for AlwaysOnline {
    fn is_connected(&self) -> bool {
        true
    }
}

enum UnitOp {
    Put(Vec<u8>),
    Get,
    Delete,
}

enum UnitOutcome {
    Succeeded { key: String, data: Option<Vec<u8>> },
    Failed { key: String, error: StoreError },
    Cancelled { key: String },
}

/// Orchestrates transfer operations against one configured object store.
///
/// Collaborators are injected at construction; there is no global lookup.
/// One repository instance is shared across all concurrent callers.
pub struct StorageRepository {
    store: Arc<dyn ObjectStore>,
    network: Arc<dyn NetworkInfo>,
    concurrency: usize,
}

impl StorageRepository {
    pub fn new(store: Arc<dyn ObjectStore>, network: Arc<dyn NetworkInfo>) -> Self {
        Self {
            store,
            network,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Builds a repository over a production S3 store. Fails with
    /// `StoreError::Config` on an invalid config, before any network call.
    pub fn connect(config: &S3Config, network: Arc<dyn NetworkInfo>) -> StoreResult<Self> {
        let store = S3ObjectStore::connect(config)?;
        Ok(Self::new(Arc::new(store), network))
    }

    /// Overrides the in-flight bound (clamped to at least 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    fn validate_key(key: &str) -> StoreResult<()> {
        if key.trim().is_empty() {
            return Err(StoreError::Validation("empty key".into()));
        }
        Ok(())
    }

    fn check_online(&self) -> StoreResult<()> {
        if !self.network.is_connected() {
            return Err(StoreError::Connection("network is offline".into()));
        }
        Ok(())
    }

    // --- single-item operations -------------------------------------

    pub async fn upload_file(&self, key: &str, data: Vec<u8>) -> StoreResult<()> {
        Self::validate_key(key)?;
        self.store.put(key, data).await
    }

    pub async fn download_file(&self, key: &str) -> StoreResult<Vec<u8>> {
        Self::validate_key(key)?;
        self.store.get(key).await
    }

    pub async fn delete_file(&self, key: &str) -> StoreResult<()> {
        Self::validate_key(key)?;
        self.store.delete(key).await
    }

    pub async fn file_exists(&self, key: &str) -> StoreResult<bool> {
        Self::validate_key(key)?;
        self.store.exists(key).await
    }

    pub async fn list_files(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.store.list(prefix).await
    }

    pub async fn list_folders(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.store.list_common_prefixes(prefix).await
    }

    /// Creates a zero-byte folder marker. Idempotent: an existing marker
    /// is left untouched.
    pub async fn create_folder(&self, folder: &str) -> StoreResult<()> {
        Self::validate_key(folder)?;
        let marker = folder_marker(folder);
        if self.store.exists(&marker).await? {
            return Ok(());
        }
        self.store.put(&marker, Vec::new()).await
    }

    /// Deletes just the folder marker. For the contents, use
    /// [`delete_folder_recursive`](Self::delete_folder_recursive).
    pub async fn delete_folder(&self, folder: &str) -> StoreResult<()> {
        Self::validate_key(folder)?;
        self.store.delete(&folder_marker(folder)).await
    }

    pub async fn file_metadata(&self, key: &str) -> StoreResult<ObjectMeta> {
        Self::validate_key(key)?;
        self.store.head(key).await
    }

    pub async fn file_size(&self, key: &str) -> StoreResult<u64> {
        Ok(self.file_metadata(key).await?.size)
    }

    pub async fn last_modified(&self, key: &str) -> StoreResult<chrono::DateTime<chrono::Utc>> {
        Ok(self.file_metadata(key).await?.last_modified)
    }

    /// Never errors: any failure reads as "not connected".
    pub async fn test_connection(&self) -> bool {
        if !self.network.is_connected() {
            return false;
        }
        self.store.list("").await.is_ok()
    }

    // --- batch operations -------------------------------------------

    /// Uploads every entry of `files` under the concurrency window.
    pub async fn upload_many(
        &self,
        files: BTreeMap<String, Vec<u8>>,
        progress: Option<&ProgressFn>,
        cancel: Option<&CancellationToken>,
    ) -> StoreResult<BatchResult> {
        for key in files.keys() {
            Self::validate_key(key)?;
        }
        self.check_online()?;

        let units = files
            .into_iter()
            .map(|(key, data)| (key, UnitOp::Put(data)))
            .collect();
        let (result, _) = self.run_batch(units, progress, cancel).await;
        Ok(result)
    }

    /// Downloads `keys`, returning the aggregated result alongside the
    /// fetched contents for the succeeded keys.
    pub async fn download_many(
        &self,
        keys: &[String],
        progress: Option<&ProgressFn>,
        cancel: Option<&CancellationToken>,
    ) -> StoreResult<(BatchResult, HashMap<String, Vec<u8>>)> {
        for key in keys {
            Self::validate_key(key)?;
        }
        self.check_online()?;

        let units = keys.iter().map(|k| (k.clone(), UnitOp::Get)).collect();
        Ok(self.run_batch(units, progress, cancel).await)
    }

    /// Deletes `keys`. Deleting an absent key counts as success.
    pub async fn delete_many(
        &self,
        keys: &[String],
        progress: Option<&ProgressFn>,
        cancel: Option<&CancellationToken>,
    ) -> StoreResult<BatchResult> {
        for key in keys {
            Self::validate_key(key)?;
        }
        self.check_online()?;

        let units = keys.iter().map(|k| (k.clone(), UnitOp::Delete)).collect();
        let (result, _) = self.run_batch(units, progress, cancel).await;
        Ok(result)
    }

    // --- recursive folder operations --------------------------------

    /// Ensures the folder marker exists, then batch-uploads `files`.
    ///
    /// If cancelled mid-tree the marker is not rolled back; the next
    /// attempt finds it and skips the create. Accepted weak consistency.
    /// A token already cancelled at entry skips the marker create too:
    /// nothing is dispatched and every file resolves as cancelled.
    pub async fn upload_folder(
        &self,
        folder: &str,
        files: BTreeMap<String, Vec<u8>>,
        progress: Option<&ProgressFn>,
        cancel: Option<&CancellationToken>,
    ) -> StoreResult<BatchResult> {
        Self::validate_key(folder)?;
        self.check_online()?;
        if !cancel.is_some_and(|t| t.is_cancelled()) {
            self.create_folder(folder).await?;
        }
        self.upload_many(files, progress, cancel).await
    }

    /// Lists everything under `folder` and batch-downloads it. A listing
    /// failure aborts the whole call with zero download attempts. Folder
    /// markers are listed but not downloaded.
    pub async fn download_folder(
        &self,
        folder: &str,
        progress: Option<&ProgressFn>,
        cancel: Option<&CancellationToken>,
    ) -> StoreResult<(BatchResult, HashMap<String, Vec<u8>>)> {
        Self::validate_key(folder)?;
        self.check_online()?;

        let keys: Vec<String> = self
            .store
            .list(&folder_marker(folder))
            .await?
            .into_iter()
            .filter(|k| !k.ends_with('/'))
            .collect();

        debug!("downloading folder {folder}: {} files", keys.len());
        Ok(self
            .run_batch(
                keys.into_iter().map(|k| (k, UnitOp::Get)).collect(),
                progress,
                cancel,
            )
            .await)
    }

    /// Lists everything under `folder` (markers included) and
    /// batch-deletes it. An empty prefix is a trivial success.
    pub async fn delete_folder_recursive(
        &self,
        folder: &str,
        progress: Option<&ProgressFn>,
        cancel: Option<&CancellationToken>,
    ) -> StoreResult<BatchResult> {
        Self::validate_key(folder)?;
        self.check_online()?;

        let keys = self.store.list(&folder_marker(folder)).await?;
        if keys.is_empty() {
            debug!("delete of empty folder {folder}: nothing to do");
            return Ok(BatchResult::default());
        }

        let units = keys.into_iter().map(|k| (k, UnitOp::Delete)).collect();
        let (result, _) = self.run_batch(units, progress, cancel).await;
        Ok(result)
    }

    // --- dispatch ----------------------------------------------------

    /// Runs `units` under the concurrency window, polling the token
    /// before each unit's network call. Outcomes are folded in one
    /// consumer loop, so progress counters are monotonic even though
    /// resolution order across workers is unspecified.
    async fn run_batch(
        &self,
        units: Vec<(String, UnitOp)>,
        progress: Option<&ProgressFn>,
        cancel: Option<&CancellationToken>,
    ) -> (BatchResult, HashMap<String, Vec<u8>>) {
        let total = units.len();
        let mut result = BatchResult::default();
        let mut contents: HashMap<String, Vec<u8>> = HashMap::new();

        let futs: Vec<_> = units
            .into_iter()
            .map(|(key, op)| {
                let store = Arc::clone(&self.store);
                let cancel = cancel.cloned();
                async move {
                    if cancel.is_some_and(|t| t.is_cancelled()) {
                        return UnitOutcome::Cancelled { key };
                    }
                    let outcome = match op {
                        UnitOp::Put(data) => store.put(&key, data).await.map(|_| None),
                        UnitOp::Get => store.get(&key).await.map(Some),
                        UnitOp::Delete => store.delete(&key).await.map(|_| None),
                    };
                    match outcome {
                        Ok(data) => UnitOutcome::Succeeded { key, data },
                        Err(error) => UnitOutcome::Failed { key, error },
                    }
                }
            })
            .collect();

        let mut outcomes = stream::iter(futs).buffer_unordered(self.concurrency);

        let mut completed = 0usize;
        let mut failed = 0usize;
        while let Some(outcome) = outcomes.next().await {
            let current_key = match outcome {
                UnitOutcome::Succeeded { key, data } => {
                    completed += 1;
                    if let Some(data) = data {
                        contents.insert(key.clone(), data);
                    }
                    result.succeeded.push(key.clone());
                    key
                }
                UnitOutcome::Failed { key, error } => {
                    completed += 1;
                    failed += 1;
                    warn!("batch unit failed for {key}: {error}");
                    result.failed.push(BatchFailure {
                        key: key.clone(),
                        error,
                    });
                    key
                }
                UnitOutcome::Cancelled { key } => {
                    result.cancelled.push(key.clone());
                    key
                }
            };

            if let Some(report) = progress {
                report(BatchProgress {
                    total,
                    completed,
                    failed,
                    current_key,
                });
            }
        }

        debug!(
            "batch resolved: {} ok, {} failed, {} cancelled of {total}",
            result.succeeded.len(),
            result.failed.len(),
            result.cancelled.len()
        );
        (result, contents)
    }
}

/// Normalizes a folder path to its marker key (trailing slash).
fn folder_marker(folder: &str) -> String {
    if folder.ends_with('/') {
        folder.to_string()
    } else {
        format!("{folder}/")
    }
}
