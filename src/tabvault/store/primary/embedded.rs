//! Primary index backed by an embedded redb database.
//!
//! The database handle is opened lazily and kept behind a mutex. If opening
//! fails (file locked by another process, missing mount, bad permissions) the
//! call reports `Unavailable` and the next call tries again.

use super::{PrimaryError, PrimaryIndex, PrimaryResult};
use crate::model::{Record, RecordId, RecordSummary};
use redb::{Database, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, warn};

// Key: record id, Value: JSON-encoded Record (rows included)
const RECORDS: TableDefinition<u64, &[u8]> = TableDefinition::new("records");
// Key: (upload time in ns since epoch, record id). Reverse iteration = newest first.
const BY_UPLOAD: TableDefinition<(i64, u64), ()> = TableDefinition::new("records_by_upload");

pub struct RedbIndex {
    path: PathBuf,
    db: Mutex<Option<Database>>,
}

impl RedbIndex {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let index = Self {
            path: path.into(),
            db: Mutex::new(None),
        };
        if let Err(e) = index.with_db(|_| Ok(())) {
            warn!(path = %index.path.display(), error = %e, "primary store not reachable, will retry on use");
        }
        index
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> PrimaryResult<T>) -> PrimaryResult<T> {
        let mut slot = self.db.lock().unwrap_or_else(PoisonError::into_inner);
        let db = match slot.take() {
            Some(db) => db,
            None => {
                let db = open_database(&self.path)?;
                debug!(path = %self.path.display(), "opened primary store");
                db
            }
        };
        f(slot.insert(db))
    }
}

fn open_database(path: &Path) -> PrimaryResult<Database> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(PrimaryError::unavailable)?;
    }
    let db = Database::create(path).map_err(PrimaryError::unavailable)?;

    // Create tables eagerly so later read txns don't fail
    let write_txn = db.begin_write().map_err(PrimaryError::unavailable)?;
    {
        let _t = write_txn
            .open_table(RECORDS)
            .map_err(PrimaryError::unavailable)?;
        let _t = write_txn
            .open_table(BY_UPLOAD)
            .map_err(PrimaryError::unavailable)?;
    }
    write_txn.commit().map_err(PrimaryError::unavailable)?;
    Ok(db)
}

fn upload_key(summary: &RecordSummary) -> (i64, u64) {
    let nanos = summary
        .upload_timestamp
        .timestamp_nanos_opt()
        .unwrap_or(i64::MAX);
    (nanos, summary.id.as_u64())
}

fn decode(id: RecordId, bytes: &[u8]) -> Option<Record> {
    match serde_json::from_slice(bytes) {
        Ok(record) => Some(record),
        Err(e) => {
            error!(%id, error = %e, "failed to decode primary record");
            None
        }
    }
}

impl PrimaryIndex for RedbIndex {
    fn find_by_id(&self, id: RecordId) -> PrimaryResult<Option<Record>> {
        self.with_db(|db| {
            let read_txn = db.begin_read().map_err(PrimaryError::unavailable)?;
            let records = read_txn
                .open_table(RECORDS)
                .map_err(PrimaryError::unavailable)?;
            let found = records
                .get(id.as_u64())
                .map_err(PrimaryError::unavailable)?;
            Ok(found.and_then(|guard| decode(id, guard.value())))
        })
    }

    fn insert(&self, record: &Record) -> PrimaryResult<()> {
        let bytes = serde_json::to_vec(record).map_err(PrimaryError::unavailable)?;
        self.with_db(|db| {
            let write_txn = db.begin_write().map_err(PrimaryError::unavailable)?;
            {
                let mut records = write_txn
                    .open_table(RECORDS)
                    .map_err(PrimaryError::unavailable)?;
                let mut by_upload = write_txn
                    .open_table(BY_UPLOAD)
                    .map_err(PrimaryError::unavailable)?;

                let previous = records
                    .insert(record.id().as_u64(), bytes.as_slice())
                    .map_err(PrimaryError::unavailable)?
                    .map(|old| old.value().to_vec());
                if let Some(old) = previous.and_then(|b| decode(record.id(), &b)) {
                    by_upload
                        .remove(upload_key(&old.summary))
                        .map_err(PrimaryError::unavailable)?;
                }
                by_upload
                    .insert(upload_key(&record.summary), ())
                    .map_err(PrimaryError::unavailable)?;
            }
            write_txn.commit().map_err(PrimaryError::unavailable)?;
            Ok(())
        })
    }

    fn delete_by_id(&self, id: RecordId) -> PrimaryResult<bool> {
        self.remove_many(&[id]).map(|removed| removed > 0)
    }

    fn list_recent_first(&self, limit: usize) -> PrimaryResult<Vec<RecordSummary>> {
        self.with_db(|db| {
            let read_txn = db.begin_read().map_err(PrimaryError::unavailable)?;
            let records = read_txn
                .open_table(RECORDS)
                .map_err(PrimaryError::unavailable)?;
            let by_upload = read_txn
                .open_table(BY_UPLOAD)
                .map_err(PrimaryError::unavailable)?;

            let mut result = Vec::new();
            for entry in by_upload.iter().map_err(PrimaryError::unavailable)?.rev() {
                if result.len() >= limit {
                    break;
                }
                let (key, _) = entry.map_err(PrimaryError::unavailable)?;
                let (_, raw_id) = key.value();
                let id = RecordId::new(raw_id);
                let found = records.get(raw_id).map_err(PrimaryError::unavailable)?;
                if let Some(record) = found.and_then(|guard| decode(id, guard.value())) {
                    result.push(record.summary);
                }
            }
            Ok(result)
        })
    }

    fn list(&self) -> PrimaryResult<Vec<RecordSummary>> {
        self.with_db(|db| {
            let read_txn = db.begin_read().map_err(PrimaryError::unavailable)?;
            let records = read_txn
                .open_table(RECORDS)
                .map_err(PrimaryError::unavailable)?;

            let mut result = Vec::new();
            for entry in records.iter().map_err(PrimaryError::unavailable)? {
                let (key, value) = entry.map_err(PrimaryError::unavailable)?;
                if let Some(record) = decode(RecordId::new(key.value()), value.value()) {
                    result.push(record.summary);
                }
            }
            Ok(result)
        })
    }

    fn remove_many(&self, ids: &[RecordId]) -> PrimaryResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.with_db(|db| {
            let write_txn = db.begin_write().map_err(PrimaryError::unavailable)?;
            let mut removed_count = 0;
            {
                let mut records = write_txn
                    .open_table(RECORDS)
                    .map_err(PrimaryError::unavailable)?;
                let mut by_upload = write_txn
                    .open_table(BY_UPLOAD)
                    .map_err(PrimaryError::unavailable)?;

                for id in ids {
                    let removed = records
                        .remove(id.as_u64())
                        .map_err(PrimaryError::unavailable)?
                        .map(|old| old.value().to_vec());
                    let Some(bytes) = removed else {
                        continue;
                    };
                    removed_count += 1;
                    if let Some(old) = decode(*id, &bytes) {
                        by_upload
                            .remove(upload_key(&old.summary))
                            .map_err(PrimaryError::unavailable)?;
                    }
                }
            }
            write_txn.commit().map_err(PrimaryError::unavailable)?;
            Ok(removed_count)
        })
    }

    fn describe(&self) -> String {
        format!("redb://{}", self.path.display())
    }
}
