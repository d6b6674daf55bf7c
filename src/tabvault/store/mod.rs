//! # Storage Layer
//!
//! Records live in three places, each with a single job:
//!
//! - [`payload::PayloadStore`]: the uploaded bytes and a JSON snapshot of the
//!   parsed rows, one pair of files per record.
//! - [`backup::BackupIndex`]: a JSON array of every live record's metadata.
//!   Always written, always local, always readable.
//! - [`primary::PrimaryIndex`]: the preferred index. It may be remote, slow or
//!   gone; every call is allowed to fail.
//!
//! [`metadata::MetadataStore`] ties them together. It is the only type the
//! rest of the crate uses.
//!
//! ## Storage Format
//!
//! ```text
//! <data dir>/
//! ├── config.json              # Configuration
//! ├── file-metadata.json       # Backup index (JSON array)
//! ├── primary.redb             # Default embedded primary, when configured
//! └── uploads/
//!     ├── files/{id}-{name}    # Uploaded files
//!     └── snapshots/{id}-data.json
//! ```
//!
//! ## Write Ordering
//!
//! Payload, then primary (best-effort), then backup (mandatory), then
//! eviction. A record is visible once the backup entry lands; before that a
//! failed ingest leaves nothing behind.
//!
//! ## Consistency
//!
//! The two indexes can drift while the primary is down. Reads tolerate that
//! by checking the payload area; `doctor` repairs it.

use crate::model::RecordId;

pub mod backup;
pub mod ids;
pub mod metadata;
pub mod payload;
pub mod primary;

pub use metadata::{MetadataStore, StoreSettings};

/// Report from the `doctor` operation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DoctorReport {
    pub primary_reachable: bool,
    /// Backup entries whose snapshot is missing. Reported, left in place.
    pub corrupt: Vec<RecordId>,
    pub adopted_from_primary: usize,
    pub recovered_snapshots: usize,
    pub backfilled_primary: usize,
    pub pruned_primary: usize,
    pub removed_stray_payloads: usize,
    pub evicted: Vec<RecordId>,
}

impl DoctorReport {
    /// Nothing was wrong and nothing was changed.
    pub fn is_clean(&self) -> bool {
        self.corrupt.is_empty()
            && self.adopted_from_primary == 0
            && self.recovered_snapshots == 0
            && self.backfilled_primary == 0
            && self.pruned_primary == 0
            && self.removed_stray_payloads == 0
            && self.evicted.is_empty()
    }
}
