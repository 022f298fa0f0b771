//! Replay of recorded change feeds with filesystem checkpoints.

use checkpoint::{CheckpointTracker, FilesystemStore};
use relay_core::{DocId, Sequence};
use relay_sync::config::{ConfigOverrides, RelayConfig};
use relay_sync::replay::replay;
use relay_sync::testing::ScriptedStore;
use relay_sync::PipelineError;
use relay_target::MemoryStore;
use serde_json::{json, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn change(seq: u64, doc: Value) -> Value {
    let id = doc["_id"].clone();
    json!({"seq": seq, "id": id, "changes": [{"rev": format!("{seq}-src")}], "doc": doc})
}

fn write_feed(dir: &Path, lines: &[Value]) -> PathBuf {
    let path = dir.join("changes.jsonl");
    let mut file = std::fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    path
}

fn config(limit: usize) -> RelayConfig {
    RelayConfig::default().apply(ConfigOverrides {
        limit: Some(limit),
        feed: Some("orders".to_string()),
        ..Default::default()
    })
}

fn tracker(dir: &TempDir) -> CheckpointTracker<FilesystemStore> {
    CheckpointTracker::new(FilesystemStore::new(dir.path().join("checkpoints")), "orders").unwrap()
}

#[tokio::test]
async fn test_replay_writes_documents_and_checkpoints() {
    let dir = TempDir::new().unwrap();
    let feed = write_feed(
        dir.path(),
        &[
            change(1, json!({"_id": "a", "v": 1})),
            change(2, json!({"_id": "b", "v": 1})),
            change(3, json!({"_id": "a", "v": 2})),
            json!({"last_seq": 3, "pending": 0}),
        ],
    );
    let store = MemoryStore::new();

    let report = replay(&store, tracker(&dir), &feed, &config(2)).await.unwrap();

    assert_eq!(report.lines_seen, 4);
    assert_eq!(report.lines_skipped, 1);
    assert_eq!(report.batches_flushed, 2);
    assert_eq!(report.checkpoint, Some(Sequence::from(3)));
    assert_eq!(store.live_count(), 2);

    let a = store.get(&DocId::from("a")).unwrap();
    assert_eq!(a["v"], json!(2));
    assert_eq!(a["_seq"], json!(3));
    assert!(a["_rev"].as_str().unwrap().starts_with("2-"));

    assert!(dir.path().join("checkpoints/checkpoint_orders.json").exists());
    assert_eq!(
        tracker(&dir).get_seq().await.unwrap(),
        Some(Sequence::from(3))
    );
}

#[tokio::test]
async fn test_replay_resumes_after_checkpoint() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let first = [
        change(1, json!({"_id": "a"})),
        change(2, json!({"_id": "b"})),
    ];
    let feed = write_feed(dir.path(), &first);
    replay(&store, tracker(&dir), &feed, &config(10)).await.unwrap();
    assert_eq!(store.write_calls(), 1);

    let mut extended = first.to_vec();
    extended.push(change(3, json!({"_id": "c"})));
    let feed = write_feed(dir.path(), &extended);
    let report = replay(&store, tracker(&dir), &feed, &config(10)).await.unwrap();

    assert_eq!(report.lines_seen, 1);
    assert_eq!(report.documents_accepted, 1);
    assert_eq!(store.write_calls(), 2);
    assert!(store.revision(&DocId::from("a")).unwrap().as_str().starts_with("1-"));
    assert_eq!(store.live_count(), 3);
}

#[tokio::test]
async fn test_replay_with_unknown_checkpoint_fails() {
    let dir = TempDir::new().unwrap();
    tracker(&dir).put_seq(&Sequence::from(42)).await.unwrap();
    let feed = write_feed(dir.path(), &[change(1, json!({"_id": "a"}))]);
    let store = MemoryStore::new();

    let err = replay(&store, tracker(&dir), &feed, &config(10))
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("not found"));
    assert_eq!(store.write_calls(), 0);
}

#[tokio::test]
async fn test_replay_applies_deletions() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let feed = write_feed(
        dir.path(),
        &[
            change(1, json!({"_id": "a"})),
            change(2, json!({"_id": "b"})),
            json!({"seq": 3, "id": "a", "changes": [{"rev": "2-src"}], "deleted": true}),
        ],
    );

    let report = replay(&store, tracker(&dir), &feed, &config(2)).await.unwrap();

    assert_eq!(report.documents_accepted, 3);
    assert_eq!(store.live_count(), 1);
    assert!(store.revision(&DocId::from("a")).unwrap().as_str().starts_with("2-"));
}

#[tokio::test]
async fn test_failed_batch_leaves_checkpoint_in_place() {
    let dir = TempDir::new().unwrap();
    let store = ScriptedStore::new();
    let feed = write_feed(
        dir.path(),
        &[
            change(1, json!({"_id": "a"})),
            change(2, json!({"_id": "b"})),
            change(3, json!({"_id": "c"})),
            change(4, json!({"_id": "d"})),
        ],
    );

    store.reject("d", "forbidden");
    let err = replay(&store, tracker(&dir), &feed, &config(2))
        .await
        .unwrap_err();
    assert!(err
        .downcast_ref::<PipelineError>()
        .is_some_and(PipelineError::is_processing_failure));
    assert_eq!(
        tracker(&dir).get_seq().await.unwrap(),
        Some(Sequence::from(2))
    );

    store.clear_rejections();
    let report = replay(&store, tracker(&dir), &feed, &config(2)).await.unwrap();
    assert_eq!(report.documents_accepted, 2);
    assert_eq!(report.checkpoint, Some(Sequence::from(4)));
    assert_eq!(store.live_count(), 4);
}

#[tokio::test]
async fn test_sequence_injection_can_be_disabled() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let feed = write_feed(dir.path(), &[change(1, json!({"_id": "a"}))]);
    let config = config(10).apply(ConfigOverrides {
        no_seq_property: true,
        ..Default::default()
    });

    replay(&store, tracker(&dir), &feed, &config).await.unwrap();

    assert!(store.get(&DocId::from("a")).unwrap().get("_seq").is_none());
}

#[tokio::test]
async fn test_dry_run_keeps_checkpoints_in_memory() {
    let dir = TempDir::new().unwrap();
    let checkpoints = dir.path().join("checkpoints");
    let feed = write_feed(
        dir.path(),
        &[
            change(1, json!({"_id": "a"})),
            change(2, json!({"_id": "b"})),
        ],
    );
    let config = config(10).apply(ConfigOverrides {
        checkpoint_dir: Some(checkpoints.display().to_string()),
        ..Default::default()
    });

    let report = relay_sync::replay::run_replay(&config, &feed, true)
        .await
        .unwrap();

    assert_eq!(report.documents_accepted, 2);
    assert_eq!(report.checkpoint, Some(Sequence::from(2)));
    assert!(!checkpoints.exists());
}

#[tokio::test]
async fn test_reserved_sequence_property_fails_before_writing() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let feed = write_feed(dir.path(), &[change(1, json!({"_id": "a"}))]);
    let config = config(10).apply(ConfigOverrides {
        seq_property: Some("_id".to_string()),
        ..Default::default()
    });

    let err = replay(&store, tracker(&dir), &feed, &config)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("reserved"));
    assert_eq!(store.lookup_calls(), 0);
    assert_eq!(store.write_calls(), 0);
    assert_eq!(tracker(&dir).get_seq().await.unwrap(), None);
}
