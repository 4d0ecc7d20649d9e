//! Sync coordinator — reconciles the local tree with the remote store.
//!
//! Drives full-tree diffs in both directions, owns the retry queue, and
//! redrives transiently-failed transfers. Remote-only files are never
//! deleted by a sync pass; deletion happens only through an explicit
//! queue entry ([`SyncCoordinator::request_delete`]).
//!
//! Conflict rule: newer modification time wins. On an exact-timestamp tie
//! with equal sizes the key counts as in sync; on a tie with differing
//! sizes the remote copy wins, and the tie is recorded in the pass
//! summary as a [`StoreError::Conflict`].

use crate::local::LocalStore;
use crate::queue::{QueueOperation, RetryDisposition, SyncQueue, SyncQueueItem};
use crate::repository::{NetworkInfo, StorageRepository};
use quill_store::{StoreError, StoreResult};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Timings for the periodic loop.
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// Interval between full-tree sync passes.
    pub sync_interval: Duration,
    /// Interval between retry-queue drains.
    pub drain_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(300),
            drain_interval: Duration::from_secs(60),
        }
    }
}

/// Summary of one sync pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Keys transferred this pass.
    pub transferred: Vec<String>,
    /// Keys already in sync.
    pub skipped: usize,
    /// Keys whose transient failure went on the retry queue.
    pub enqueued: usize,
    /// Keys that failed permanently this pass.
    pub failed: Vec<String>,
    /// Timestamp conflicts observed this pass, one
    /// [`StoreError::Conflict`] per key. The pass still resolves each
    /// one (remote wins); these entries let the caller surface them.
    pub conflicts: Vec<StoreError>,
}

/// Summary of one retry-queue drain.
#[derive(Debug, Default)]
pub struct DrainReport {
    /// Paths retried successfully (and removed from the queue).
    pub succeeded: Vec<String>,
    /// Items put back for another pass.
    pub requeued: usize,
    /// Items dropped after exhausting retries, reported here exactly once.
    pub permanent_failures: Vec<SyncQueueItem>,
}

/// Reconciles local and remote trees and drains the retry queue.
pub struct SyncCoordinator {
    repo: Arc<StorageRepository>,
    local: Arc<dyn LocalStore>,
    network: Arc<dyn NetworkInfo>,
    queue: Arc<Mutex<SyncQueue>>,
    config: CoordinatorConfig,
}

impl SyncCoordinator {
    pub fn new(
        repo: Arc<StorageRepository>,
        local: Arc<dyn LocalStore>,
        network: Arc<dyn NetworkInfo>,
    ) -> Self {
        Self {
            repo,
            local,
            network,
            queue: Arc::new(Mutex::new(SyncQueue::default())),
            config: CoordinatorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_queue(mut self, queue: SyncQueue) -> Self {
        self.queue = Arc::new(Mutex::new(queue));
        self
    }

    /// Shared handle to the retry queue, e.g. for host persistence.
    pub fn queue(&self) -> Arc<Mutex<SyncQueue>> {
        Arc::clone(&self.queue)
    }

    /// Queues an explicit remote deletion, applied on the next drain.
    pub async fn request_delete(&self, path: impl Into<String>) {
        self.queue
            .lock()
            .await
            .enqueue(path, QueueOperation::Delete);
    }

    fn check_online(&self) -> StoreResult<()> {
        if !self.network.is_connected() {
            return Err(StoreError::Connection("network is offline".into()));
        }
        Ok(())
    }

    /// Pushes local-only and locally-newer files to the remote store.
    /// Remote-only files are left alone.
    pub async fn sync_to_remote(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> StoreResult<SyncReport> {
        self.check_online()?;
        if cancel.is_some_and(|t| t.is_cancelled()) {
            return Err(StoreError::Cancelled);
        }

        let local_entries = self.local.entries().await?;
        let remote_keys: HashMap<String, ()> = self
            .repo
            .list_files("")
            .await?
            .into_iter()
            .map(|k| (k, ()))
            .collect();

        let mut report = SyncReport::default();
        let mut to_upload: BTreeMap<String, Vec<u8>> = BTreeMap::new();

        for entry in local_entries {
            let wanted = if !remote_keys.contains_key(&entry.path) {
                true
            } else {
                match self.repo.file_metadata(&entry.path).await {
                    Ok(meta) => {
                        if entry.modified > meta.last_modified {
                            true
                        } else if entry.modified == meta.last_modified
                            && entry.size != meta.size
                        {
                            // Tie with divergent content: remote wins.
                            debug!("timestamp conflict for {}, keeping remote", entry.path);
                            report.conflicts.push(StoreError::Conflict {
                                key: entry.path.clone(),
                                reason: "modified on both sides at the same instant; remote kept"
                                    .into(),
                            });
                            false
                        } else {
                            false
                        }
                    }
                    Err(e) if e.is_not_found() => true,
                    Err(e) => {
                        self.note_failure(&entry.path, QueueOperation::Upload, &e, &mut report)
                            .await;
                        continue;
                    }
                }
            };

            if !wanted {
                report.skipped += 1;
                continue;
            }

            match self.local.read(&entry.path).await {
                Ok(data) => {
                    to_upload.insert(entry.path, data);
                }
                Err(e) => {
                    warn!("cannot read local file {}: {e}", entry.path);
                    report.failed.push(entry.path);
                }
            }
        }

        if !to_upload.is_empty() {
            let batch = self.repo.upload_many(to_upload, None, cancel).await?;
            report.transferred.extend(batch.succeeded);
            for failure in batch.failed {
                self.note_failure(&failure.key, QueueOperation::Upload, &failure.error, &mut report)
                    .await;
            }
        }

        info!(
            "sync to remote: {} uploaded, {} skipped, {} queued for retry",
            report.transferred.len(),
            report.skipped,
            report.enqueued
        );
        Ok(report)
    }

    /// Pulls remote-only and remote-newer files into the local tree.
    pub async fn sync_from_remote(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> StoreResult<SyncReport> {
        self.check_online()?;
        if cancel.is_some_and(|t| t.is_cancelled()) {
            return Err(StoreError::Cancelled);
        }

        let local_entries: HashMap<String, _> = self
            .local
            .entries()
            .await?
            .into_iter()
            .map(|e| (e.path.clone(), e))
            .collect();
        let remote_keys: Vec<String> = self
            .repo
            .list_files("")
            .await?
            .into_iter()
            .filter(|k| !k.ends_with('/'))
            .collect();

        let mut report = SyncReport::default();
        let mut to_download: Vec<String> = Vec::new();

        for key in remote_keys {
            let wanted = match local_entries.get(&key) {
                None => true,
                Some(entry) => match self.repo.file_metadata(&key).await {
                    Ok(meta) => {
                        if meta.last_modified > entry.modified {
                            true
                        } else if meta.last_modified == entry.modified
                            && meta.size != entry.size
                        {
                            // Exact tie with divergent content: remote wins.
                            debug!("timestamp conflict for {key}, pulling remote");
                            report.conflicts.push(StoreError::Conflict {
                                key: key.clone(),
                                reason: "modified on both sides at the same instant; remote pulled"
                                    .into(),
                            });
                            true
                        } else {
                            false
                        }
                    }
                    Err(e) => {
                        self.note_failure(&key, QueueOperation::Download, &e, &mut report)
                            .await;
                        continue;
                    }
                },
            };

            if wanted {
                to_download.push(key);
            } else {
                report.skipped += 1;
            }
        }

        if !to_download.is_empty() {
            let (batch, contents) = self.repo.download_many(&to_download, None, cancel).await?;
            for key in batch.succeeded {
                match contents.get(&key) {
                    Some(data) => match self.local.write(&key, data.clone()).await {
                        Ok(()) => report.transferred.push(key),
                        Err(e) => {
                            warn!("cannot write local file {key}: {e}");
                            report.failed.push(key);
                        }
                    },
                    None => report.failed.push(key),
                }
            }
            for failure in batch.failed {
                self.note_failure(
                    &failure.key,
                    QueueOperation::Download,
                    &failure.error,
                    &mut report,
                )
                .await;
            }
        }

        info!(
            "sync from remote: {} downloaded, {} skipped, {} queued for retry",
            report.transferred.len(),
            report.skipped,
            report.enqueued
        );
        Ok(report)
    }

    /// One redrive pass over the retry queue, oldest items first.
    pub async fn drain_queue(&self) -> StoreResult<DrainReport> {
        self.check_online()?;

        let items = self.queue.lock().await.drain();
        let mut report = DrainReport::default();

        for item in items {
            let attempt = self.attempt_item(&item).await;
            match attempt {
                Ok(()) => report.succeeded.push(item.path),
                Err(e) if e.is_transient() => {
                    let disposition = self.queue.lock().await.record_failed_attempt(item);
                    match disposition {
                        RetryDisposition::Requeued => report.requeued += 1,
                        RetryDisposition::PermanentlyFailed(item) => {
                            error!(
                                "giving up on {} ({:?}) after {} retries",
                                item.path, item.operation, item.retry_count
                            );
                            report.permanent_failures.push(item);
                        }
                    }
                }
                Err(e) => {
                    error!("dropping {} ({:?}): {e}", item.path, item.operation);
                    report.permanent_failures.push(item);
                }
            }
        }

        debug!(
            "queue drain: {} ok, {} requeued, {} permanent",
            report.succeeded.len(),
            report.requeued,
            report.permanent_failures.len()
        );
        Ok(report)
    }

    async fn attempt_item(&self, item: &SyncQueueItem) -> StoreResult<()> {
        match item.operation {
            QueueOperation::Upload => {
                let data = self.local.read(&item.path).await?;
                self.repo.upload_file(&item.path, data).await
            }
            QueueOperation::Download => {
                let data = self.repo.download_file(&item.path).await?;
                self.local.write(&item.path, data).await
            }
            QueueOperation::Delete => self.repo.delete_file(&item.path).await,
        }
    }

    async fn note_failure(
        &self,
        key: &str,
        operation: QueueOperation,
        error: &StoreError,
        report: &mut SyncReport,
    ) {
        if error.is_transient() {
            self.queue.lock().await.enqueue(key, operation);
            report.enqueued += 1;
        } else {
            report.failed.push(key.to_string());
        }
    }

    /// Periodic loop: full-tree passes and queue drains until the token
    /// cancels. Whole-pass failures are logged and retried next tick.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut sync_tick = tokio::time::interval(self.config.sync_interval);
        let mut drain_tick = tokio::time::interval(self.config.drain_interval);

        // Skip first immediate tick
        sync_tick.tick().await;
        drain_tick.tick().await;

        info!("sync coordinator started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("sync coordinator stopping");
                    break;
                }
                _ = sync_tick.tick() => {
                    if let Err(e) = self.sync_to_remote(Some(&cancel)).await {
                        warn!("sync to remote failed: {e}");
                    }
                    if let Err(e) = self.sync_from_remote(Some(&cancel)).await {
                        warn!("sync from remote failed: {e}");
                    }
                }
                _ = drain_tick.tick() => {
                    if self.queue.lock().await.is_empty() {
                        continue;
                    }
                    if let Err(e) = self.drain_queue().await {
                        warn!("queue drain failed: {e}");
                    }
                }
            }
        }
    }
}
