use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use stride::model::{Tracker, TrackerDraft};
use stride::remote::{MemoryTable, SaveFailure};
use stride::session::{Session, SessionSignal};
use stride::store::kv::{KeyValueStore, MemoryStore};
use stride::store::local::TRACKERS_KEY;
use stride::sync::coordinator::{CoordinatorOptions, SyncState, TrackerCoordinator};
use stride::sync::reconcile::Resolution;

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 8, 0, 0).unwrap()
}

fn tracker(id: &str, title: &str, created: DateTime<Utc>) -> Tracker {
    let mut t = TrackerDraft::new(title, 20).into_tracker(created).unwrap();
    t.id = id.to_string();
    t
}

fn seeded_store(records: &[Tracker]) -> Arc<MemoryStore> {
    let kv = Arc::new(MemoryStore::new());
    kv.set(TRACKERS_KEY, &serde_json::to_string(records).unwrap())
        .unwrap();
    kv
}

fn stored(kv: &MemoryStore) -> Vec<Tracker> {
    kv.get(TRACKERS_KEY)
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap())
        .unwrap_or_default()
}

fn coordinator(kv: Arc<MemoryStore>, table: &Arc<MemoryTable>) -> TrackerCoordinator {
    TrackerCoordinator::new(kv, Some(table.clone()), CoordinatorOptions::default())
}

fn ids(trackers: &[Tracker]) -> Vec<&str> {
    trackers.iter().map(|t| t.id.as_str()).collect()
}

fn alice() -> Session {
    Session::new("alice", "token-a")
}

#[tokio::test]
async fn empty_cloud_is_seeded_from_local() {
    let kv = seeded_store(&[tracker("r1", "one", at(1)), tracker("r2", "two", at(2))]);
    let table = Arc::new(MemoryTable::new());
    let mut coord = coordinator(kv, &table);

    coord.apply_session(Some(alice())).await;

    assert_eq!(coord.state(), SyncState::Synced);
    assert!(coord.synced_at().is_some());
    assert_eq!(ids(coord.trackers()), vec!["r1", "r2"]);
    assert_eq!(ids(&table.records("alice")), vec!["r1", "r2"]);
    assert_eq!(table.upsert_calls(), 1);
}

#[tokio::test]
async fn non_empty_cloud_replaces_local() {
    let kv = seeded_store(&[tracker("r1", "one", at(1)), tracker("r2", "two", at(2))]);
    let table = Arc::new(MemoryTable::new());
    table.seed("alice", vec![tracker("r3", "three", at(3))]);
    let mut coord = coordinator(kv.clone(), &table);

    coord.apply_session(Some(alice())).await;
    coord.shutdown().await;

    assert_eq!(coord.state(), SyncState::Synced);
    assert_eq!(ids(coord.trackers()), vec!["r3"]);
    assert_eq!(ids(&stored(&kv)), vec!["r3"]);
    assert_eq!(table.upsert_calls(), 0);
}

#[tokio::test]
async fn adopted_cloud_rows_have_progress_rederived() {
    let mut odd = tracker("r9", "foreign", at(4));
    odd.progress = 150;
    odd.celebrated = true;
    let table = Arc::new(MemoryTable::new());
    table.seed("alice", vec![odd]);
    let mut coord = coordinator(Arc::new(MemoryStore::new()), &table);

    coord.apply_session(Some(alice())).await;

    let adopted = coord.get("r9").unwrap();
    assert_eq!(adopted.progress, 0);
    assert!(!adopted.celebrated);
}

#[tokio::test]
async fn fetch_failure_falls_back_to_local_and_is_not_retried() {
    let kv = seeded_store(&[tracker("r1", "one", at(1))]);
    let table = Arc::new(MemoryTable::new());
    table.set_fail_fetch(true);
    let mut coord = coordinator(kv, &table);

    coord.apply_session(Some(alice())).await;

    assert_eq!(coord.state(), SyncState::LocalOnly);
    assert_eq!(ids(coord.trackers()), vec!["r1"]);
    assert_eq!(coord.last_error().map(|e| e.code()), Some("fetch_failed"));
    assert!(coord.status().error.is_some());

    table.set_fail_fetch(false);
    coord.reconcile().await;
    assert_eq!(table.fetch_calls(), 1);
    assert_eq!(coord.state(), SyncState::LocalOnly);

    coord.add(TrackerDraft::new("still local", 5)).unwrap();
    coord.shutdown().await;
    assert_eq!(table.upsert_calls(), 0);

    coord.dismiss_error();
    assert!(coord.last_error().is_none());
}

#[tokio::test]
async fn failed_startup_can_be_recovered_by_explicit_resolution() {
    let kv = seeded_store(&[tracker("b", "only local", at(1))]);
    let table = Arc::new(MemoryTable::new());
    table.seed("alice", vec![tracker("c", "only cloud", at(2))]);
    table.set_fail_fetch(true);
    let mut coord = coordinator(kv, &table);
    coord.apply_session(Some(alice())).await;
    assert_eq!(coord.state(), SyncState::LocalOnly);

    table.set_fail_fetch(false);
    let conflict = coord.detect_conflict().await.unwrap().unwrap();
    assert_eq!((conflict.local_only, conflict.cloud_only), (1, 1));

    coord.resolve_conflict(Resolution::Merge).await.unwrap();
    assert_eq!(coord.state(), SyncState::Synced);
    assert!(coord.last_error().is_none());
    assert_eq!(ids(coord.trackers()), vec!["b", "c"]);
    assert_eq!(ids(&table.records("alice")), vec!["c", "b"]);
}

#[tokio::test]
async fn merge_takes_newer_cloud_copy_and_keeps_local_only_records() {
    let kv = seeded_store(&[tracker("a", "local a", at(1)), tracker("b", "local b", at(1))]);
    let table = Arc::new(MemoryTable::new());
    let mut coord = coordinator(kv, &table);
    coord.apply_session(Some(alice())).await;
    assert_eq!(coord.state(), SyncState::Synced);

    // another device rewrote the cloud copy of "a" and dropped "b"
    table.seed("alice", vec![tracker("a", "cloud a", at(5))]);

    coord.resolve_conflict(Resolution::Merge).await.unwrap();
    let titles: Vec<_> = coord.trackers().iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["cloud a", "local b"]);
    assert_eq!(table.records("alice").len(), 2);
}

#[tokio::test]
async fn cloud_resolution_does_not_push_and_local_resolution_does() {
    let kv = seeded_store(&[tracker("a", "a", at(1))]);
    let table = Arc::new(MemoryTable::new());
    let mut coord = coordinator(kv, &table);
    coord.apply_session(Some(alice())).await;
    let pushes = table.upsert_calls();

    table.seed("alice", vec![tracker("z", "z", at(2))]);
    coord.resolve_conflict(Resolution::Cloud).await.unwrap();
    assert_eq!(ids(coord.trackers()), vec!["z"]);
    assert_eq!(table.upsert_calls(), pushes);

    coord.add(TrackerDraft::new("new", 5)).unwrap();
    coord.resolve_conflict(Resolution::Local).await.unwrap();
    assert_eq!(table.upsert_calls(), pushes + 1);
    assert_eq!(table.records("alice").len(), 2);
}

#[tokio::test]
async fn failed_resolution_push_is_retained_but_resolution_stands() {
    let kv = seeded_store(&[tracker("a", "a", at(1))]);
    let table = Arc::new(MemoryTable::new());
    let mut coord = coordinator(kv, &table);
    coord.apply_session(Some(alice())).await;

    table.seed("alice", vec![tracker("c", "c", at(2))]);
    table.set_save_failure(Some(SaveFailure::DuplicateKey("trackers_pkey".into())));
    coord.resolve_conflict(Resolution::Merge).await.unwrap();

    assert_eq!(ids(coord.trackers()), vec!["a", "c"]);
    assert_eq!(coord.state(), SyncState::Synced);
    assert_eq!(
        coord.last_error().map(|e| e.code()),
        Some("save_duplicate_key")
    );
}

#[tokio::test]
async fn resolution_needs_a_session() {
    let table = Arc::new(MemoryTable::new());
    let mut coord = coordinator(Arc::new(MemoryStore::new()), &table);
    let err = coord.resolve_conflict(Resolution::Local).await.unwrap_err();
    assert_eq!(err.code(), "not_signed_in");
}

#[tokio::test(start_paused = true)]
async fn mutations_are_mirrored_once_after_the_delay() {
    let table = Arc::new(MemoryTable::new());
    let mut coord = coordinator(Arc::new(MemoryStore::new()), &table);
    coord.apply_session(Some(alice())).await;
    assert_eq!(coord.state(), SyncState::Synced);

    for title in ["one", "two", "three"] {
        coord.add(TrackerDraft::new(title, 5)).unwrap();
    }
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(table.upsert_calls(), 0);

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(table.upsert_calls(), 1);
    assert_eq!(table.records("alice").len(), 3);
}

#[tokio::test(start_paused = true)]
async fn background_mirror_failure_is_swallowed() {
    let table = Arc::new(MemoryTable::new());
    let mut coord = coordinator(Arc::new(MemoryStore::new()), &table);
    coord.apply_session(Some(alice())).await;
    table.set_save_failure(Some(SaveFailure::PermissionDenied("row level security".into())));

    let added = coord.add(TrackerDraft::new("kept", 5)).unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(table.upsert_calls(), 1);
    assert!(table.records("alice").is_empty());
    assert_eq!(coord.get(&added.id).unwrap().title, "kept");
    assert!(coord.last_error().is_none());
}

#[tokio::test]
async fn delete_removes_remote_row_and_survives_remote_failure() {
    let kv = seeded_store(&[tracker("r1", "one", at(1)), tracker("r2", "two", at(2))]);
    let table = Arc::new(MemoryTable::new());
    let mut coord = coordinator(kv, &table);
    coord.apply_session(Some(alice())).await;

    coord.delete("r1").await.unwrap();
    assert_eq!(ids(&table.records("alice")), vec!["r2"]);

    table.set_fail_delete(true);
    let removed = coord.delete("r2").await.unwrap();
    assert_eq!(removed.id, "r2");
    assert!(coord.trackers().is_empty());
    assert_eq!(ids(&table.records("alice")), vec!["r2"]);
}

#[tokio::test(start_paused = true)]
async fn following_sessions_reconciles_then_clears_on_sign_out() {
    let kv = seeded_store(&[tracker("r1", "one", at(1))]);
    let table = Arc::new(MemoryTable::new());
    table.seed("alice", vec![tracker("r3", "three", at(3))]);
    let mut coord = coordinator(kv.clone(), &table);

    let signal = SessionSignal::new(Some(alice()));
    let sessions = signal.subscribe();
    let driver = async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        // token refresh for the same owner: no second reconciliation
        signal.set(Some(Session::new("alice", "token-b")));
        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.set(None);
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    tokio::join!(coord.follow_sessions(sessions), driver);

    assert_eq!(table.fetch_calls(), 1);
    assert!(coord.trackers().is_empty());
    assert!(coord.session().is_none());
    assert_eq!(coord.state(), SyncState::LocalOnly);

    coord.shutdown().await;
    assert!(stored(&kv).is_empty());
    assert_eq!(table.records("alice").len(), 1);
}

#[tokio::test]
async fn switching_owner_starts_from_a_clean_slate() {
    let table = Arc::new(MemoryTable::new());
    table.seed("alice", vec![tracker("a1", "alice's", at(1))]);
    table.seed("bob", vec![tracker("b1", "bob's", at(2))]);
    let mut coord = coordinator(Arc::new(MemoryStore::new()), &table);

    coord.apply_session(Some(alice())).await;
    assert_eq!(ids(coord.trackers()), vec!["a1"]);

    coord.apply_session(Some(Session::new("bob", "token-b"))).await;
    assert_eq!(ids(coord.trackers()), vec!["b1"]);
    assert_eq!(coord.status().owner_id.as_deref(), Some("bob"));
    assert_eq!(ids(&table.records("alice")), vec!["a1"]);
}
