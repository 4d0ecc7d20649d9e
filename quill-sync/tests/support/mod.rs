//! Shared helpers for the engine tests: fakes wired together the way the
//! host application wires the real adapters.
#![allow(dead_code)]

use quill_store::MemoryObjectStore;
use quill_sync::{
    BatchProgress, MemoryLocalStore, NetworkInfo, StorageRepository, SyncCoordinator,
};
use std::sync::{Arc, Mutex};

/// Opt-in log output for debugging test runs (`RUST_LOG=debug`).
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// `NetworkInfo` that always reports connected.
pub struct Online;

impl NetworkInfo for Online {
    fn is_connected(&self) -> bool {
        true
    }
}

/// `NetworkInfo` that always reports disconnected.
pub struct Offline;

impl NetworkInfo for Offline {
    fn is_connected(&self) -> bool {
        false
    }
}

/// Repository over a fresh in-memory store, returning both.
pub fn memory_repo() -> (Arc<MemoryObjectStore>, StorageRepository) {
    let store = Arc::new(MemoryObjectStore::new());
    let repo = StorageRepository::new(store.clone(), Arc::new(Online));
    (store, repo)
}

/// Coordinator over fresh in-memory stores, returning all three.
pub fn memory_coordinator() -> (Arc<MemoryObjectStore>, Arc<MemoryLocalStore>, SyncCoordinator) {
    let store = Arc::new(MemoryObjectStore::new());
    let local = Arc::new(MemoryLocalStore::new());
    let repo = Arc::new(StorageRepository::new(store.clone(), Arc::new(Online)));
    let coordinator = SyncCoordinator::new(repo, local.clone(), Arc::new(Online));
    (store, local, coordinator)
}

/// Captures every progress callback for later assertions.
pub fn progress_recorder() -> (
    Arc<Mutex<Vec<BatchProgress>>>,
    impl Fn(BatchProgress) + Send + Sync,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |p: BatchProgress| sink.lock().unwrap().push(p))
}
