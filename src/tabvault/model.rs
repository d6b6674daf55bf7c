use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// One row of tabular data, keyed by column header.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Identifier assigned at ingest time.
///
/// Ids are strictly increasing in creation order (see [`crate::store::ids`]),
/// which makes them usable as the tie-break for recency ordering and eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(RecordId)
    }
}

/// Metadata for one stored upload, as kept in both indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSummary {
    pub id: RecordId,
    pub original_name: String,
    pub stored_name: String,
    pub upload_timestamp: DateTime<Utc>,
    pub size_bytes: u64,
    pub row_count: usize,
    pub headers: Vec<String>,
    pub payload_path: PathBuf,
}

impl RecordSummary {
    /// Sort key for "oldest first": upload time, then id.
    pub fn recency_key(&self) -> (DateTime<Utc>, RecordId) {
        (self.upload_timestamp, self.id)
    }
}

/// A fully materialized record: metadata plus the structured rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(flatten)]
    pub summary: RecordSummary,
    pub snapshot_path: PathBuf,
    pub rows: Vec<Row>,
}

impl Record {
    pub fn id(&self) -> RecordId {
        self.summary.id
    }
}

/// The per-record JSON document written next to the uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub rows: Vec<Row>,
    pub headers: Vec<String>,
    pub metadata: RecordSummary,
}

/// Caller input for an ingest: the raw upload plus its already-extracted rows.
#[derive(Debug, Clone)]
pub struct Upload {
    pub original_name: String,
    pub bytes: Vec<u8>,
    pub rows: Vec<Row>,
    pub headers: Vec<String>,
}

impl Upload {
    pub fn new(
        original_name: impl Into<String>,
        bytes: Vec<u8>,
        rows: Vec<Row>,
        headers: Vec<String>,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            bytes,
            rows,
            headers,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Orders summaries newest first; equal timestamps fall back to the higher id.
pub fn sort_recent_first(entries: &mut [RecordSummary]) {
    entries.sort_by(|a, b| b.recency_key().cmp(&a.recency_key()));
}
