//! Retry queue for transiently-failed transfers.
//!
//! Items land here when an otherwise-successful batch attempt fails with
//! a connection-class error. A redrive pass dequeues FIFO by `created_at`;
//! each attempt increments `retry_count`, and items that exceed the
//! configured maximum are dropped and surfaced exactly once as permanent
//! failures.
//!
//! The queue itself holds no lock; the coordinator shares it behind a
//! `tokio::sync::Mutex`. It serializes with serde so the host can persist
//! it across restarts (the durability mechanism is the host's concern).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default maximum redrive attempts per item.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// What to do for a queued path. Closed on purpose: an invalid operation
/// kind is unrepresentable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueOperation {
    Upload,
    Download,
    Delete,
}

/// One pending retry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncQueueItem {
    pub id: Uuid,
    pub path: String,
    pub operation: QueueOperation,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
}

/// Disposition after a failed redrive attempt.
#[derive(Debug)]
pub enum RetryDisposition {
    /// The item went back on the queue for another pass.
    Requeued,
    /// The item exceeded the retry maximum and was dropped. Report it
    /// once as a permanent failure.
    PermanentlyFailed(SyncQueueItem),
}

/// FIFO retry queue with bounded redrive attempts.
#[derive(Debug, Serialize, Deserialize)]
pub struct SyncQueue {
    items: Vec<SyncQueueItem>,
    max_retries: u32,
}

impl SyncQueue {
    pub fn new(max_retries: u32) -> Self {
        Self {
            items: Vec::new(),
            max_retries,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Enqueues a freshly-failed path with zero retries so far.
    pub fn enqueue(&mut self, path: impl Into<String>, operation: QueueOperation) -> Uuid {
        let item = SyncQueueItem {
            id: Uuid::new_v4(),
            path: path.into(),
            operation,
            created_at: Utc::now(),
            retry_count: 0,
        };
        let id = item.id;
        self.items.push(item);
        id
    }

    /// Takes every queued item, oldest first, leaving the queue empty.
    /// The redrive pass re-enqueues what still fails transiently.
    pub fn drain(&mut self) -> Vec<SyncQueueItem> {
        let mut items = std::mem::take(&mut self.items);
        items.sort_by_key(|item| item.created_at);
        items
    }

    /// Records one failed redrive attempt for `item`: increments its
    /// retry count and either requeues it or, once the maximum is
    /// reached, drops it permanently.
    pub fn record_failed_attempt(&mut self, mut item: SyncQueueItem) -> RetryDisposition {
        item.retry_count += 1;
        if item.retry_count >= self.max_retries {
            RetryDisposition::PermanentlyFailed(item)
        } else {
            self.items.push(item);
            RetryDisposition::Requeued
        }
    }
}

impl Default for SyncQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}
