//! Progress snapshots and aggregated batch outcomes.

use quill_store::StoreError;

/// Snapshot emitted after every resolved unit of batch work.
///
/// `completed` counts units that ran to resolution (succeeded or failed)
/// and is non-decreasing within one batch call. Cancelled units emit a
/// callback too, carrying the cancelled key, without advancing `completed`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchProgress {
    /// Total units in this batch.
    pub total: usize,
    /// Units resolved so far (succeeded + failed).
    pub completed: usize,
    /// Units failed so far.
    pub failed: usize,
    /// The key that just resolved.
    pub current_key: String,
}

/// Progress callback. Invoked exactly once per unit, from a single
/// consumer loop, so observers see monotonic counters.
pub type ProgressFn = dyn Fn(BatchProgress) + Send + Sync;

/// A per-item failure inside a batch.
#[derive(Debug)]
pub struct BatchFailure {
    pub key: String,
    pub error: StoreError,
}

/// Aggregated outcome of one batch call.
///
/// The three sets partition the input exactly: every input key lands in
/// precisely one of `succeeded`, `failed`, or `cancelled`.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub succeeded: Vec<String>,
    pub failed: Vec<BatchFailure>,
    pub cancelled: Vec<String>,
}

impl BatchResult {
    /// Total number of keys accounted for.
    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.cancelled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when every key succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.cancelled.is_empty()
    }

    /// Failures eligible for the retry queue (connection-class only).
    pub fn transient_failures(&self) -> impl Iterator<Item = &BatchFailure> {
        self.failed.iter().filter(|f| f.error.is_transient())
    }
}
