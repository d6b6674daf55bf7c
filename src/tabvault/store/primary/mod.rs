//! # Primary Index
//!
//! The preferred, query-capable metadata store. It may live elsewhere (a
//! database behind a connection string) and may go away at any moment, so
//! every call can fail with [`PrimaryError`]. The orchestrator treats that as
//! routine: it logs and falls back to the backup index.
//!
//! `Ok(None)` / `Ok(false)` mean "genuinely absent" and are *not* failures.
//!
//! ## Implementations
//!
//! - [`embedded::RedbIndex`]: embedded redb database, opened lazily from a
//!   `redb://<path>` connection string and re-opened after a failed attempt.
//! - [`memory::MemoryIndex`]: in-process map with an availability switch,
//!   used to exercise fallback paths.
//! - [`Disconnected`]: no primary configured; every call reports `NotConfigured`.

use crate::model::{Record, RecordId, RecordSummary};
use std::path::PathBuf;
use thiserror::Error;

pub mod embedded;
pub mod memory;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrimaryError {
    #[error("primary store unavailable: {0}")]
    Unavailable(String),

    #[error("no primary store configured")]
    NotConfigured,
}

impl PrimaryError {
    pub fn unavailable(cause: impl std::fmt::Display) -> Self {
        Self::Unavailable(cause.to_string())
    }
}

pub type PrimaryResult<T> = std::result::Result<T, PrimaryError>;

/// Contract shared by every primary backend.
///
/// Writes must be serialized by the implementation; callers may invoke any
/// method from several threads at once.
pub trait PrimaryIndex: Send + Sync {
    fn find_by_id(&self, id: RecordId) -> PrimaryResult<Option<Record>>;

    fn insert(&self, record: &Record) -> PrimaryResult<()>;

    /// Returns whether the record was present.
    fn delete_by_id(&self, id: RecordId) -> PrimaryResult<bool>;

    /// Newest first by upload time, ties by descending id.
    fn list_recent_first(&self, limit: usize) -> PrimaryResult<Vec<RecordSummary>>;

    /// All entries, ascending by id.
    fn list(&self) -> PrimaryResult<Vec<RecordSummary>>;

    /// Returns how many of `ids` were present.
    fn remove_many(&self, ids: &[RecordId]) -> PrimaryResult<usize>;

    /// Short label for logs and reports.
    fn describe(&self) -> String;
}

impl<P: PrimaryIndex + ?Sized> PrimaryIndex for Box<P> {
    fn find_by_id(&self, id: RecordId) -> PrimaryResult<Option<Record>> {
        (**self).find_by_id(id)
    }

    fn insert(&self, record: &Record) -> PrimaryResult<()> {
        (**self).insert(record)
    }

    fn delete_by_id(&self, id: RecordId) -> PrimaryResult<bool> {
        (**self).delete_by_id(id)
    }

    fn list_recent_first(&self, limit: usize) -> PrimaryResult<Vec<RecordSummary>> {
        (**self).list_recent_first(limit)
    }

    fn list(&self) -> PrimaryResult<Vec<RecordSummary>> {
        (**self).list()
    }

    fn remove_many(&self, ids: &[RecordId]) -> PrimaryResult<usize> {
        (**self).remove_many(ids)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Stand-in when no primary is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct Disconnected;

impl PrimaryIndex for Disconnected {
    fn find_by_id(&self, _id: RecordId) -> PrimaryResult<Option<Record>> {
        Err(PrimaryError::NotConfigured)
    }

    fn insert(&self, _record: &Record) -> PrimaryResult<()> {
        Err(PrimaryError::NotConfigured)
    }

    fn delete_by_id(&self, _id: RecordId) -> PrimaryResult<bool> {
        Err(PrimaryError::NotConfigured)
    }

    fn list_recent_first(&self, _limit: usize) -> PrimaryResult<Vec<RecordSummary>> {
        Err(PrimaryError::NotConfigured)
    }

    fn list(&self) -> PrimaryResult<Vec<RecordSummary>> {
        Err(PrimaryError::NotConfigured)
    }

    fn remove_many(&self, _ids: &[RecordId]) -> PrimaryResult<usize> {
        Err(PrimaryError::NotConfigured)
    }

    fn describe(&self) -> String {
        "none".to_string()
    }
}

/// Where a connection string points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryTarget {
    None,
    Redb(PathBuf),
}

impl PrimaryTarget {
    /// Accepts `redb://<path>`, a bare filesystem path, or nothing.
    pub fn parse(url: Option<&str>) -> Self {
        match url.map(str::trim) {
            None | Some("") => PrimaryTarget::None,
            Some(url) => {
                let path = url.strip_prefix("redb://").unwrap_or(url);
                PrimaryTarget::Redb(PathBuf::from(path))
            }
        }
    }
}

/// Build the primary backend for a connection string. Never fails: an
/// unreachable primary is reported per call, not at startup.
pub fn connect(url: Option<&str>) -> Box<dyn PrimaryIndex> {
    match PrimaryTarget::parse(url) {
        PrimaryTarget::None => Box::new(Disconnected),
        PrimaryTarget::Redb(path) => Box::new(embedded::RedbIndex::open(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_targets() {
        assert_eq!(PrimaryTarget::parse(None), PrimaryTarget::None);
        assert_eq!(PrimaryTarget::parse(Some("  ")), PrimaryTarget::None);
        assert_eq!(
            PrimaryTarget::parse(Some("redb:///var/lib/tabvault/primary.redb")),
            PrimaryTarget::Redb(PathBuf::from("/var/lib/tabvault/primary.redb"))
        );
        assert_eq!(
            PrimaryTarget::parse(Some("primary.redb")),
            PrimaryTarget::Redb(PathBuf::from("primary.redb"))
        );
    }

    #[test]
    fn test_disconnected_reports_not_configured() {
        let primary = connect(None);
        assert_eq!(primary.describe(), "none");
        assert_eq!(primary.list(), Err(PrimaryError::NotConfigured));
        assert_eq!(
            primary.delete_by_id(RecordId::new(1)),
            Err(PrimaryError::NotConfigured)
        );
    }
}
