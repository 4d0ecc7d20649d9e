//! Sync engine for Quill.
//!
//! Mirrors a local note/folder tree against an S3-compatible object store:
//! - Batch upload/download/delete with bounded concurrency and progress
//! - Recursive folder operations over a flat key space
//! - Cooperative cancellation shared across nested operations
//! - A retry queue for transiently-failed transfers
//! - Full-tree reconciliation (`sync_to_remote` / `sync_from_remote`)

pub mod coordinator;
pub mod local;
pub mod progress;
pub mod queue;
pub mod repository;

pub use coordinator::{CoordinatorConfig, DrainReport, SyncCoordinator, SyncReport};
pub use local::{LocalEntry, LocalStore, MemoryLocalStore};
pub use progress::{BatchFailure, BatchProgress, BatchResult, ProgressFn};
pub use queue::{QueueOperation, RetryDisposition, SyncQueue, SyncQueueItem};
pub use repository::{AlwaysOnline, NetworkInfo, StorageRepository, DEFAULT_CONCURRENCY};

/// Cooperative stop signal, shared by cloning into every nested
/// sub-operation of a recursive call. Polled before each unit of batch
/// work; in-flight network calls always run to completion.
pub use tokio_util::sync::CancellationToken;
