use serde_json::json;
use std::collections::BTreeSet;
use std::fs;
use std::thread;
use tabvault::error::TabvaultError;
use tabvault::model::{RecordId, Row, Upload};
use tabvault::store::primary::embedded::RedbIndex;
use tabvault::store::primary::memory::MemoryIndex;
use tabvault::store::primary::{Disconnected, PrimaryIndex};
use tabvault::store::{MetadataStore, StoreSettings};
use tempfile::TempDir;

fn rows(count: usize) -> Vec<Row> {
    (0..count)
        .map(|i| {
            let mut row = Row::new();
            row.insert("month".to_string(), json!(format!("m{}", i)));
            row.insert("revenue".to_string(), json!(i * 10));
            row
        })
        .collect()
}

fn upload(name: &str, row_count: usize) -> Upload {
    Upload::new(
        name,
        b"month,revenue\n".to_vec(),
        rows(row_count),
        vec!["month".to_string(), "revenue".to_string()],
    )
}

fn open<P: PrimaryIndex>(dir: &TempDir, primary: P) -> MetadataStore<P> {
    MetadataStore::open(dir.path(), primary, StoreSettings::default()).unwrap()
}

fn live_ids<P: PrimaryIndex>(store: &MetadataStore<P>) -> Vec<RecordId> {
    store.backup().list().unwrap().iter().map(|e| e.id).collect()
}

#[test]
fn twelve_ingests_keep_the_newest_ten() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir, MemoryIndex::new());

    let ids: Vec<RecordId> = (0..12)
        .map(|i| store.ingest(upload(&format!("{}.csv", i), 5)).unwrap().id())
        .collect();

    assert_eq!(live_ids(&store), ids[2..].to_vec());
    assert_eq!(store.primary().len(), 10);
    assert_eq!(store.payloads().snapshot_ids().unwrap().len(), 10);
    assert_eq!(store.payloads().blob_ids().unwrap().len(), 10);
    for evicted in &ids[..2] {
        assert!(store.fetch_by_id(*evicted).unwrap_err().is_not_found());
    }
}

#[test]
fn unavailable_primary_still_serves_everything() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir, MemoryIndex::unavailable());

    let ids: Vec<RecordId> = (0..3)
        .map(|i| store.ingest(upload(&format!("{}.csv", i), 2)).unwrap().id())
        .collect();

    let recent: Vec<RecordId> = store.list_recent(5).unwrap().iter().map(|e| e.id).collect();
    assert_eq!(recent, ids.iter().rev().copied().collect::<Vec<_>>());

    let fetched = store.fetch_by_id(ids[1]).unwrap();
    assert_eq!(fetched.summary.original_name, "1.csv");
    assert_eq!(fetched.rows.len(), 2);

    store.delete_by_id(ids[0]).unwrap();
    assert_eq!(live_ids(&store), ids[1..].to_vec());
}

#[test]
fn no_primary_configured_behaves_like_an_outage() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir, Disconnected);

    let created = store.ingest(upload("only.csv", 1)).unwrap();
    assert_eq!(store.fetch_by_id(created.id()).unwrap(), created);
    assert_eq!(store.list_recent(5).unwrap().len(), 1);

    let report = store.doctor().unwrap();
    assert!(!report.primary_reachable);
    assert!(report.is_clean());
}

#[test]
fn recent_is_newest_first_from_either_index() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir, MemoryIndex::new());
    for i in 0..4 {
        store.ingest(upload(&format!("{}.csv", i), 1)).unwrap();
    }

    let from_primary = store.list_recent(3).unwrap();
    store.primary().set_available(false);
    let from_backup = store.list_recent(3).unwrap();

    let names: Vec<&str> = from_primary
        .iter()
        .map(|e| e.original_name.as_str())
        .collect();
    assert_eq!(names, vec!["3.csv", "2.csv", "1.csv"]);
    assert_eq!(from_primary, from_backup);
}

#[test]
fn deleting_twice_is_not_found_the_second_time() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir, MemoryIndex::new());
    let created = store.ingest(upload("a.csv", 1)).unwrap();

    store.delete_by_id(created.id()).unwrap();
    assert!(matches!(
        store.delete_by_id(created.id()),
        Err(TabvaultError::NotFound(id)) if id == created.id()
    ));
    assert!(!created.summary.payload_path.exists());
    assert!(!created.snapshot_path.exists());
}

#[test]
fn deletes_during_an_outage_stay_deleted() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir, MemoryIndex::new());
    let ids: Vec<RecordId> = (0..6)
        .map(|i| store.ingest(upload(&format!("{}.csv", i), 1)).unwrap().id())
        .collect();

    store.primary().set_available(false);
    for id in &ids[3..] {
        store.delete_by_id(*id).unwrap();
    }
    store.primary().set_available(true);

    let recent: Vec<RecordId> = store.list_recent(5).unwrap().iter().map(|e| e.id).collect();
    let mut expected = live_ids(&store);
    expected.reverse();
    assert_eq!(recent, expected);
    assert_eq!(recent.len(), 3);

    for id in &ids[3..] {
        assert!(matches!(
            store.delete_by_id(*id),
            Err(TabvaultError::NotFound(missing)) if missing == *id
        ));
    }
    assert_eq!(store.primary().len(), 3);
}

#[test]
fn row_limit_is_inclusive() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir, MemoryIndex::new());

    let err = store.ingest(upload("big.csv", 1001)).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Dataset too large. Maximum 1000 rows allowed. Your dataset has 1001 rows."
    );
    assert!(live_ids(&store).is_empty());

    assert_eq!(store.ingest(upload("ok.csv", 999)).unwrap().summary.row_count, 999);
    assert_eq!(store.ingest(upload("edge.csv", 1000)).unwrap().summary.row_count, 1000);
}

#[test]
fn oversized_and_wide_uploads_are_rejected() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir, MemoryIndex::new());

    let big = Upload::new("big.csv", vec![b'x'; 1024 * 1024 + 1], rows(1), vec![]);
    assert!(matches!(
        store.ingest(big),
        Err(TabvaultError::Validation(_))
    ));

    let headers: Vec<String> = (0..11).map(|i| format!("c{}", i)).collect();
    let wide = Upload::new("wide.csv", vec![1], rows(1), headers);
    assert!(matches!(
        store.ingest(wide),
        Err(TabvaultError::Validation(_))
    ));

    assert!(store.payloads().snapshot_ids().unwrap().is_empty());
}

#[test]
fn concurrent_ingests_respect_retention() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir, MemoryIndex::new());

    let created: Vec<RecordId> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = &store;
                s.spawn(move || {
                    (0..3)
                        .map(|i| {
                            store
                                .ingest(upload(&format!("t{}-{}.csv", t, i), 1))
                                .unwrap()
                                .id()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    let unique: BTreeSet<RecordId> = created.iter().copied().collect();
    assert_eq!(unique.len(), 24);

    let live: BTreeSet<RecordId> = live_ids(&store).into_iter().collect();
    assert_eq!(live.len(), 10);
    assert_eq!(store.primary().len(), 10);
    assert_eq!(store.payloads().snapshot_ids().unwrap(), live);
    assert_eq!(store.payloads().blob_ids().unwrap(), live);
}

#[test]
fn backup_failure_rolls_back_payload_and_primary() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir, MemoryIndex::new());
    let kept = store.ingest(upload("kept.csv", 1)).unwrap();

    // Swap the index file for a directory so the next append cannot read it.
    let index = store.backup().path().to_path_buf();
    let saved = fs::read(&index).unwrap();
    fs::remove_file(&index).unwrap();
    fs::create_dir(&index).unwrap();

    let err = store.ingest(upload("lost.csv", 1)).unwrap_err();
    assert!(matches!(err, TabvaultError::Io { .. }));
    assert_eq!(store.primary().len(), 1);
    assert_eq!(
        store.payloads().snapshot_ids().unwrap(),
        BTreeSet::from([kept.id()])
    );

    fs::remove_dir(&index).unwrap();
    fs::write(&index, saved).unwrap();
    assert_eq!(live_ids(&store), vec![kept.id()]);
}

#[test]
fn redb_primary_survives_reopen_and_catches_up() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("primary.redb");

    let first = {
        let store = open(&dir, RedbIndex::open(&db));
        store.ingest(upload("a.csv", 2)).unwrap()
    };

    // Written while the primary was not configured.
    let second = {
        let store = open(&dir, Disconnected);
        store.ingest(upload("b.csv", 2)).unwrap()
    };
    assert!(second.id() > first.id());

    let store = open(&dir, RedbIndex::open(&db));
    assert_eq!(store.primary().find_by_id(first.id()).unwrap(), Some(first));
    assert_eq!(store.primary().find_by_id(second.id()).unwrap(), None);

    let report = store.doctor().unwrap();
    assert_eq!(report.backfilled_primary, 1);
    assert_eq!(
        store.primary().find_by_id(second.id()).unwrap(),
        Some(second)
    );
}
