//! Batch transfer semantics: outcome partitioning, failure isolation,
//! cancellation, and progress reporting.

mod support;

use pretty_assertions::assert_eq;
use quill_store::{ObjectStore, StoreError};
use quill_sync::{CancellationToken, StorageRepository};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use support::{memory_repo, progress_recorder, Offline};

fn files(names: &[&str]) -> BTreeMap<String, Vec<u8>> {
    names
        .iter()
        .map(|n| (n.to_string(), format!("content of {n}").into_bytes()))
        .collect()
}

#[tokio::test]
async fn upload_many_happy_path_then_download() {
    let (_, repo) = memory_repo();

    let result = repo
        .upload_many(files(&["a.md"]), None, None)
        .await
        .unwrap();

    assert_eq!(result.succeeded, vec!["a.md".to_string()]);
    assert!(result.failed.is_empty());
    assert!(result.cancelled.is_empty());

    let data = repo.download_file("a.md").await.unwrap();
    assert_eq!(data, b"content of a.md".to_vec());
}

#[tokio::test]
async fn outcome_sets_partition_the_input() {
    let (store, repo) = memory_repo();
    store.fail_key("c.md").await;
    store.fail_key("e.md").await;

    let input = ["a.md", "b.md", "c.md", "d.md", "e.md", "f.md"];
    let result = repo.upload_many(files(&input), None, None).await.unwrap();

    let mut seen: HashSet<String> = HashSet::new();
    for key in result
        .succeeded
        .iter()
        .chain(result.failed.iter().map(|f| &f.key))
        .chain(result.cancelled.iter())
    {
        assert!(seen.insert(key.clone()), "key {key} appears in two sets");
    }
    let expected: HashSet<String> = input.iter().map(|s| s.to_string()).collect();
    assert_eq!(seen, expected);
    assert_eq!(result.failed.len(), 2);
}

#[tokio::test]
async fn per_item_failure_does_not_abort_siblings() {
    let (store, repo) = memory_repo();
    store.fail_key("bad.md").await;

    let result = repo
        .upload_many(files(&["good1.md", "bad.md", "good2.md"]), None, None)
        .await
        .unwrap();

    assert_eq!(result.succeeded.len(), 2);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].key, "bad.md");
    assert!(store.exists("good1.md").await.unwrap());
    assert!(store.exists("good2.md").await.unwrap());
}

#[tokio::test]
async fn pre_cancelled_token_cancels_every_unit() {
    let (store, repo) = memory_repo();
    let token = CancellationToken::new();
    token.cancel();

    let result = repo
        .upload_many(files(&["a.md", "b.md", "c.md"]), None, Some(&token))
        .await
        .unwrap();

    assert!(result.succeeded.is_empty());
    assert!(result.failed.is_empty());
    assert_eq!(result.cancelled.len(), 3);
    assert_eq!(store.object_count().await, 0);
}

#[tokio::test]
async fn mid_batch_cancel_mixes_succeeded_and_cancelled() {
    let (store, repo) = memory_repo();
    // One slot, so units resolve strictly one at a time.
    let repo = repo.with_concurrency(1);

    let token = CancellationToken::new();
    let trigger = token.clone();
    let callback = move |p: quill_sync::BatchProgress| {
        if p.completed == 1 {
            trigger.cancel();
        }
    };

    let input = ["a.md", "b.md", "c.md", "d.md", "e.md"];
    let result = repo
        .upload_many(files(&input), Some(&callback), Some(&token))
        .await
        .unwrap();

    // In-flight units ran to completion, the rest were abandoned as
    // cancelled, never failed.
    assert!(result.failed.is_empty());
    assert!(!result.succeeded.is_empty());
    assert!(!result.cancelled.is_empty());
    assert_eq!(result.len(), input.len());

    // The store holds exactly the succeeded objects.
    assert_eq!(store.object_count().await, result.succeeded.len());
    for key in &result.succeeded {
        assert!(store.exists(key).await.unwrap());
    }
    for key in &result.cancelled {
        assert!(!store.exists(key).await.unwrap());
    }
}

#[tokio::test]
async fn pre_cancelled_delete_leaves_objects_in_place() {
    let (store, repo) = memory_repo();
    repo.upload_many(files(&["a.md", "b.md"]), None, None)
        .await
        .unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let keys = vec!["a.md".to_string(), "b.md".to_string()];
    let result = repo.delete_many(&keys, None, Some(&token)).await.unwrap();

    assert_eq!(result.cancelled.len(), 2);
    assert_eq!(store.object_count().await, 2);
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_total() {
    let (_, repo) = memory_repo();
    let (seen, callback) = progress_recorder();

    let input = ["a.md", "b.md", "c.md", "d.md", "e.md"];
    repo.upload_many(files(&input), Some(&callback), None)
        .await
        .unwrap();

    let snapshots = seen.lock().unwrap();
    assert_eq!(snapshots.len(), input.len());
    let mut last = 0;
    for snapshot in snapshots.iter() {
        assert_eq!(snapshot.total, input.len());
        assert!(snapshot.completed >= last, "completed went backwards");
        last = snapshot.completed;
    }
    assert_eq!(last, input.len());
}

#[tokio::test]
async fn progress_counts_failures_as_completed() {
    let (store, repo) = memory_repo();
    store.fail_key("bad.md").await;
    let (seen, callback) = progress_recorder();

    repo.upload_many(files(&["ok.md", "bad.md"]), Some(&callback), None)
        .await
        .unwrap();

    let snapshots = seen.lock().unwrap();
    assert_eq!(snapshots.len(), 2);
    let final_snapshot = snapshots.last().unwrap();
    assert_eq!(final_snapshot.completed, 2);
    assert_eq!(final_snapshot.failed, 1);
}

#[tokio::test]
async fn cancelled_units_emit_progress_without_advancing_completed() {
    let (_, repo) = memory_repo();
    let token = CancellationToken::new();
    token.cancel();
    let (seen, callback) = progress_recorder();

    repo.upload_many(files(&["a.md", "b.md"]), Some(&callback), Some(&token))
        .await
        .unwrap();

    let snapshots = seen.lock().unwrap();
    assert_eq!(snapshots.len(), 2);
    assert!(snapshots.iter().all(|s| s.completed == 0));
}

#[tokio::test]
async fn empty_key_aborts_before_any_dispatch() {
    let (store, repo) = memory_repo();
    let mut input = files(&["fine.md"]);
    input.insert("  ".to_string(), b"oops".to_vec());

    let err = repo.upload_many(input, None, None).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert_eq!(store.object_count().await, 0);
}

#[tokio::test]
async fn offline_network_aborts_before_any_dispatch() {
    let store = Arc::new(quill_store::MemoryObjectStore::new());
    let repo = StorageRepository::new(store.clone(), Arc::new(Offline));

    let err = repo
        .upload_many(files(&["a.md"]), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Connection(_)));
    assert_eq!(store.object_count().await, 0);
    assert!(!repo.test_connection().await);
}

#[tokio::test]
async fn delete_many_treats_missing_keys_as_success() {
    let (_, repo) = memory_repo();
    let keys = vec!["ghost1.md".to_string(), "ghost2.md".to_string()];
    let result = repo.delete_many(&keys, None, None).await.unwrap();
    assert_eq!(result.succeeded.len(), 2);
    assert!(result.failed.is_empty());
}

#[tokio::test]
async fn download_many_reports_missing_keys_as_failed() {
    let (_, repo) = memory_repo();
    repo.upload_file("real.md", b"here".to_vec()).await.unwrap();

    let keys = vec!["real.md".to_string(), "ghost.md".to_string()];
    let (result, contents) = repo.download_many(&keys, None, None).await.unwrap();

    assert_eq!(result.succeeded, vec!["real.md".to_string()]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].key, "ghost.md");
    assert!(!result.failed[0].error.is_transient());
    assert_eq!(contents.get("real.md").unwrap(), &b"here".to_vec());
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
    let (_, repo) = memory_repo();
    let (seen, callback) = progress_recorder();

    let result = repo
        .upload_many(BTreeMap::new(), Some(&callback), None)
        .await
        .unwrap();

    assert!(result.is_empty());
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn concurrency_window_handles_more_items_than_slots() {
    let (store, repo) = memory_repo();
    let repo = repo.with_concurrency(2);

    let names: Vec<String> = (0..20).map(|i| format!("note-{i:02}.md")).collect();
    let name_refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
    let result = repo.upload_many(files(&name_refs), None, None).await.unwrap();

    assert_eq!(result.succeeded.len(), 20);
    assert_eq!(store.object_count().await, 20);
}
