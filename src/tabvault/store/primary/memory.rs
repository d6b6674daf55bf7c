use super::{PrimaryError, PrimaryIndex, PrimaryResult};
use crate::model::{sort_recent_first, Record, RecordId, RecordSummary};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// In-memory primary index.
///
/// Availability can be switched off at runtime, which makes every call fail
/// with `Unavailable` until it is switched back on. The stored records are
/// kept while "down", like a remote database that is merely unreachable.
pub struct MemoryIndex {
    records: Mutex<BTreeMap<RecordId, Record>>,
    available: AtomicBool,
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// A primary that is down from the start.
    pub fn unavailable() -> Self {
        let index = Self::default();
        index.set_available(false);
        index
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Number of stored records, regardless of availability.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` is stored, regardless of availability.
    pub fn contains(&self, id: RecordId) -> bool {
        self.records().contains_key(&id)
    }

    fn records(&self) -> MutexGuard<'_, BTreeMap<RecordId, Record>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> PrimaryResult<MutexGuard<'_, BTreeMap<RecordId, Record>>> {
        if !self.is_available() {
            return Err(PrimaryError::Unavailable(
                "simulated connection failure".to_string(),
            ));
        }
        Ok(self.records())
    }
}

impl PrimaryIndex for MemoryIndex {
    fn find_by_id(&self, id: RecordId) -> PrimaryResult<Option<Record>> {
        Ok(self.check()?.get(&id).cloned())
    }

    fn insert(&self, record: &Record) -> PrimaryResult<()> {
        self.check()?.insert(record.id(), record.clone());
        Ok(())
    }

    fn delete_by_id(&self, id: RecordId) -> PrimaryResult<bool> {
        Ok(self.check()?.remove(&id).is_some())
    }

    fn list_recent_first(&self, limit: usize) -> PrimaryResult<Vec<RecordSummary>> {
        let mut entries: Vec<RecordSummary> = self
            .check()?
            .values()
            .map(|r| r.summary.clone())
            .collect();
        sort_recent_first(&mut entries);
        entries.truncate(limit);
        Ok(entries)
    }

    fn list(&self) -> PrimaryResult<Vec<RecordSummary>> {
        Ok(self
            .check()?
            .values()
            .map(|r| r.summary.clone())
            .collect())
    }

    fn remove_many(&self, ids: &[RecordId]) -> PrimaryResult<usize> {
        let mut records = self.check()?;
        Ok(ids.iter().filter(|id| records.remove(*id).is_some()).count())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
