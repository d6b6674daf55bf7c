use crate::model::RecordId;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out strictly increasing, timestamp-derived ids.
///
/// Each id is the current wall-clock time in milliseconds, bumped to
/// `last + 1` when the clock has not advanced (or has gone backwards).
/// Seed it with the largest id already on disk so a restart never reuses one.
#[derive(Debug)]
pub struct IdGenerator {
    last: AtomicU64,
}

impl IdGenerator {
    pub fn seeded(highest_existing: Option<RecordId>) -> Self {
        Self {
            last: AtomicU64::new(highest_existing.map(|id| id.as_u64()).unwrap_or(0)),
        }
    }

    pub fn next_id(&self) -> RecordId {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        RecordId::new(now.max(previous + 1))
    }

    /// The highest id handed out or observed so far.
    pub fn last_issued(&self) -> RecordId {
        RecordId::new(self.last.load(Ordering::SeqCst))
    }

    /// Raise the floor if an id above it shows up (e.g. adopted during doctor).
    pub fn observe(&self, id: RecordId) {
        self.last.fetch_max(id.as_u64(), Ordering::SeqCst);
    }
}
