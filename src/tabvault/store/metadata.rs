use super::backup::{BackupIndex, BACKUP_FILENAME};
use super::ids::IdGenerator;
use super::payload::PayloadStore;
use super::primary::{PrimaryError, PrimaryIndex};
use super::DoctorReport;
use crate::config::TabvaultConfig;
use crate::error::{Result, TabvaultError};
use crate::model::{sort_recent_first, Record, RecordId, RecordSummary, Snapshot, Upload};
use crate::validation::Limits;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

const UPLOADS_DIR: &str = "uploads";

/// Tunables the orchestrator needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub limits: Limits,
    pub retention_count: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            retention_count: crate::config::DEFAULT_RETENTION_COUNT,
        }
    }
}

impl From<&TabvaultConfig> for StoreSettings {
    fn from(config: &TabvaultConfig) -> Self {
        Self {
            limits: config.limits(),
            retention_count: config.retention_count.max(1),
        }
    }
}

/// The one place callers talk to.
///
/// Writes go to the payload area and the backup index unconditionally, and to
/// the primary index best-effort. Reads prefer the primary and fall back to
/// the backup. The retention cap is enforced after every ingest.
///
/// All methods take `&self`; share the store across threads with an `Arc`.
pub struct MetadataStore<P: PrimaryIndex> {
    primary: P,
    backup: BackupIndex,
    payloads: PayloadStore,
    ids: IdGenerator,
    settings: StoreSettings,
    /// Ids between "payload written" and "backup entry written".
    in_flight: Mutex<BTreeSet<RecordId>>,
}

/// Marks an ingest as in flight until dropped.
struct InFlight<'a> {
    set: &'a Mutex<BTreeSet<RecordId>>,
    id: RecordId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

impl<P: PrimaryIndex> MetadataStore<P> {
    /// Opens a store rooted at `data_dir`:
    ///
    /// ```text
    /// <data_dir>/
    /// ├── file-metadata.json   # BackupIndex
    /// └── uploads/             # PayloadStore
    /// ```
    pub fn open(data_dir: &Path, primary: P, settings: StoreSettings) -> Result<Self> {
        let backup = BackupIndex::new(data_dir.join(BACKUP_FILENAME));
        let payloads = PayloadStore::new(data_dir.join(UPLOADS_DIR));
        Self::with_parts(primary, backup, payloads, settings)
    }

    pub fn with_parts(
        primary: P,
        backup: BackupIndex,
        payloads: PayloadStore,
        settings: StoreSettings,
    ) -> Result<Self> {
        let mut highest = backup.list()?.iter().map(|e| e.id).max();
        match primary.list() {
            Ok(entries) => highest = highest.max(entries.iter().map(|e| e.id).max()),
            Err(e) => log_primary_failure("seed ids", &e),
        }

        Ok(Self {
            primary,
            backup,
            payloads,
            ids: IdGenerator::seeded(highest),
            settings,
            in_flight: Mutex::new(BTreeSet::new()),
        })
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn backup(&self) -> &BackupIndex {
        &self.backup
    }

    pub fn payloads(&self) -> &PayloadStore {
        &self.payloads
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Validates, persists and indexes an upload, then enforces retention.
    pub fn ingest(&self, upload: Upload) -> Result<Record> {
        // 1. Validate before touching anything
        self.settings.limits.check(
            &upload.original_name,
            upload.size_bytes(),
            upload.rows.len(),
            upload.headers.len(),
        )?;

        // 2. Identity
        let id = self.ids.next_id();
        let in_flight = self.begin_ingest(id);
        let stored_name = PayloadStore::stored_name(id, &upload.original_name);
        let summary = RecordSummary {
            id,
            original_name: upload.original_name,
            payload_path: self.payloads.blob_path(&stored_name),
            stored_name,
            upload_timestamp: Utc::now(),
            size_bytes: upload.bytes.len() as u64,
            row_count: upload.rows.len(),
            headers: upload.headers,
        };

        // 3. Payload first: an index entry must never point at nothing
        let snapshot = Snapshot {
            rows: upload.rows,
            headers: summary.headers.clone(),
            metadata: summary,
        };
        let (_, snapshot_path) = self.payloads.put(
            id,
            &snapshot.metadata.stored_name,
            &upload.bytes,
            &snapshot,
        )?;
        let Snapshot { rows, metadata, .. } = snapshot;
        let record = Record {
            summary: metadata,
            snapshot_path,
            rows,
        };

        // 4. Primary, best-effort
        let in_primary = match self.primary.insert(&record) {
            Ok(()) => true,
            Err(e) => {
                log_primary_failure("insert", &e);
                false
            }
        };

        // 5. Backup, mandatory
        if let Err(e) = self.backup.append(record.summary.clone()) {
            warn!(%id, error = %e, "backup index write failed, rolling back ingest");
            if in_primary {
                if let Err(pe) = self.primary.delete_by_id(id) {
                    log_primary_failure("roll back insert", &pe);
                }
            }
            self.discard_payload(id);
            return Err(e);
        }
        drop(in_flight);

        info!(
            %id,
            name = %record.summary.original_name,
            rows = record.summary.row_count,
            bytes = record.summary.size_bytes,
            "ingested record"
        );

        // 6. Retention
        self.evict()?;

        Ok(record)
    }

    /// Looks a record up in the primary, then the backup.
    pub fn fetch_by_id(&self, id: RecordId) -> Result<Record> {
        match self.primary.find_by_id(id) {
            Ok(Some(record)) => {
                if self.payloads.exists(id) {
                    return Ok(record);
                }
                self.report_missing_snapshot(id);
                return Err(TabvaultError::NotFound(id));
            }
            Ok(None) => debug!(%id, "not in primary, consulting backup"),
            Err(e) => log_primary_failure("find", &e),
        }

        let entry = self
            .backup
            .list()?
            .into_iter()
            .find(|e| e.id == id)
            .ok_or(TabvaultError::NotFound(id))?;

        match self.payloads.load_snapshot(id)? {
            Some(snapshot) => Ok(Record {
                summary: entry,
                snapshot_path: self.payloads.snapshot_path(id),
                rows: snapshot.rows,
            }),
            None => {
                self.report_missing_snapshot(id);
                Err(TabvaultError::NotFound(id))
            }
        }
    }

    /// Newest first, at most `limit` entries.
    ///
    /// The primary answers when it returns a full page of records that still
    /// exist. A short page, or one holding deletes the primary missed, is
    /// answered from the backup index instead.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<RecordSummary>> {
        match self.primary.list_recent_first(limit) {
            Ok(entries) => {
                let listed = entries.len();
                let present: Vec<RecordSummary> = entries
                    .into_iter()
                    .filter(|e| {
                        let present = self.payloads.exists(e.id);
                        if !present {
                            self.report_missing_snapshot(e.id);
                        }
                        present
                    })
                    .collect();
                if present.len() == listed && listed == limit {
                    return Ok(present);
                }
                debug!(
                    listed,
                    kept = present.len(),
                    limit,
                    "primary page incomplete, using backup index"
                );
            }
            Err(e) => log_primary_failure("list recent", &e),
        }

        let mut entries = self.backup.list()?;
        sort_recent_first(&mut entries);
        entries.truncate(limit);
        Ok(entries)
    }

    /// Removes a record from both indexes and the payload area.
    pub fn delete_by_id(&self, id: RecordId) -> Result<()> {
        match self.primary.delete_by_id(id) {
            Ok(true) => {
                if self.remove_live(id)? {
                    info!(%id, "deleted record");
                    return Ok(());
                }
                if self.payloads.exists(id) {
                    // Primary-only, but its files are there: still a record.
                    self.discard_payload(id);
                    info!(%id, "deleted record");
                    return Ok(());
                }
                debug!(%id, "primary entry outlived an earlier delete, pruned");
                return Err(TabvaultError::NotFound(id));
            }
            Ok(false) => debug!(%id, "not in primary, consulting backup"),
            Err(e) => log_primary_failure("delete", &e),
        }

        if !self.remove_live(id)? {
            return Err(TabvaultError::NotFound(id));
        }
        info!(%id, "deleted record");
        Ok(())
    }

    /// Drops the oldest records until at most `retention_count` remain.
    ///
    /// Counts the union of the backup index, read under its lock, and the
    /// primary-only entries that still have a snapshot. Ingests in flight are
    /// left out of the count. Primary-only entries without a snapshot are
    /// deletes the primary missed; they are pruned, not counted. Victims leave
    /// the backup and the payload area under the lock, so a concurrent
    /// eviction never counts them again. Returns the evicted ids, oldest first.
    pub fn evict(&self) -> Result<Vec<RecordId>> {
        let primary_entries = match self.primary.list() {
            Ok(entries) => entries,
            Err(e) => {
                log_primary_failure("list for eviction", &e);
                Vec::new()
            }
        };
        let retention = self.settings.retention_count;

        let (victims, stale) = self.backup.update(|entries| {
            let live: BTreeSet<RecordId> = entries.iter().map(|e| e.id).collect();
            let in_flight = self.in_flight_ids();

            let mut by_age: Vec<(DateTime<Utc>, RecordId)> =
                entries.iter().map(|e| e.recency_key()).collect();
            let mut stale = Vec::new();
            for entry in &primary_entries {
                if live.contains(&entry.id) || in_flight.contains(&entry.id) {
                    continue;
                }
                if self.payloads.exists(entry.id) {
                    by_age.push(entry.recency_key());
                } else {
                    stale.push(entry.id);
                }
            }

            if by_age.len() <= retention {
                return (Vec::new(), stale);
            }
            by_age.sort();
            let excess = by_age.len() - retention;
            let victims: Vec<RecordId> =
                by_age.into_iter().take(excess).map(|(_, id)| id).collect();

            entries.retain(|e| !victims.contains(&e.id));
            for id in &victims {
                self.discard_payload(*id);
            }
            (victims, stale)
        })?;

        let doomed: Vec<RecordId> = victims.iter().chain(&stale).copied().collect();
        if !doomed.is_empty() {
            if let Err(e) = self.primary.remove_many(&doomed) {
                log_primary_failure("evict", &e);
            }
        }
        if !stale.is_empty() {
            debug!(pruned = ?stale, "pruned primary entries already deleted");
        }
        if !victims.is_empty() {
            info!(evicted = ?victims, retention, "evicted records over retention cap");
        }
        Ok(victims)
    }

    /// Compares both indexes with the payload area and repairs what can be
    /// repaired without guessing:
    ///
    /// 1. **Adoption**: entries only the primary knows, whose snapshot exists,
    ///    are added to the backup. Snapshots no index knows are adopted from
    ///    the metadata they embed.
    /// 2. **Backfill**: entries only the backup knows are written to the
    ///    primary (catching up after an outage).
    /// 3. **Pruning**: primary-only entries with no snapshot are deletes the
    ///    primary missed; they are removed from the primary.
    /// 4. **Strays**: uploaded files with no snapshot and no index entry are removed.
    /// 5. **Corruption**: backup entries with no snapshot are reported, never healed.
    ///
    /// The backup index is then replaced by the reconciled list and retention
    /// is applied again.
    ///
    /// Ingests running alongside are left alone: anything in flight, or newer
    /// than the last id issued when the check started, is skipped.
    pub fn doctor(&self) -> Result<DoctorReport> {
        let mut report = DoctorReport::default();
        // Ids issued while the check runs are above `floor`.
        let started = (Utc::now().timestamp_millis().max(0) as u64).saturating_sub(1);
        let floor = self.ids.last_issued().max(RecordId::new(started));

        let primary_entries = match self.primary.list() {
            Ok(entries) => {
                report.primary_reachable = true;
                Some(entries)
            }
            Err(e) => {
                log_primary_failure("list for doctor", &e);
                None
            }
        };
        let primary_ids: BTreeSet<RecordId> = primary_entries
            .iter()
            .flatten()
            .map(|e| e.id)
            .collect();

        // Orphan snapshots are read outside the lock; membership is re-checked inside.
        let snapshot_ids = self.payloads.snapshot_ids()?;
        // Snapshots written after the scan above still count.
        let has_snapshot =
            |id: RecordId| snapshot_ids.contains(&id) || self.payloads.exists(id);
        let pre_backup: BTreeSet<RecordId> = self.backup.list()?.iter().map(|e| e.id).collect();
        let mut orphans = Vec::new();
        for id in &snapshot_ids {
            if pre_backup.contains(id) || primary_ids.contains(id) || self.is_recent(*id, floor)
            {
                continue;
            }
            if let Some(snapshot) = self.payloads.load_snapshot(*id)? {
                if snapshot.metadata.id == *id {
                    orphans.push(snapshot.metadata);
                } else {
                    warn!(%id, embedded = %snapshot.metadata.id, "snapshot metadata names a different id, skipping");
                }
            }
        }

        let (backfill, stale_primary) = self.backup.update(|entries| {
            let in_backup: BTreeSet<RecordId> = entries.iter().map(|e| e.id).collect();
            let in_flight = self.in_flight_ids();

            for entry in entries.iter() {
                if !has_snapshot(entry.id) {
                    warn!(id = %entry.id, "backup entry has no snapshot on disk");
                    report.corrupt.push(entry.id);
                }
            }

            let mut stale = Vec::new();
            for entry in primary_entries.iter().flatten() {
                if in_backup.contains(&entry.id) || in_flight.contains(&entry.id) {
                    continue;
                }
                if has_snapshot(entry.id) {
                    entries.push(entry.clone());
                    report.adopted_from_primary += 1;
                } else {
                    stale.push(entry.id);
                }
            }

            for orphan in &orphans {
                if !in_backup.contains(&orphan.id) && !in_flight.contains(&orphan.id) {
                    entries.push(orphan.clone());
                    report.recovered_snapshots += 1;
                }
            }

            entries.sort_by_key(|e| e.recency_key());

            let backfill: Vec<RecordSummary> = if primary_entries.is_some() {
                entries
                    .iter()
                    .filter(|e| !primary_ids.contains(&e.id) && has_snapshot(e.id))
                    .cloned()
                    .collect()
            } else {
                Vec::new()
            };
            (backfill, stale)
        })?;

        for orphan in &orphans {
            self.ids.observe(orphan.id);
        }

        for entry in backfill {
            let id = entry.id;
            let Some(snapshot) = self.payloads.load_snapshot(id)? else {
                continue;
            };
            let record = Record {
                summary: entry,
                snapshot_path: self.payloads.snapshot_path(id),
                rows: snapshot.rows,
            };
            match self.primary.insert(&record) {
                Ok(()) => report.backfilled_primary += 1,
                Err(e) => {
                    log_primary_failure("backfill", &e);
                    break;
                }
            }
        }

        if !stale_primary.is_empty() {
            match self.primary.remove_many(&stale_primary) {
                Ok(n) => report.pruned_primary = n,
                Err(e) => log_primary_failure("prune", &e),
            }
        }

        let indexed: BTreeSet<RecordId> = self.backup.list()?.iter().map(|e| e.id).collect();
        for id in self.payloads.blob_ids()? {
            if indexed.contains(&id) || self.is_recent(id, floor) || has_snapshot(id) {
                continue;
            }
            self.discard_payload(id);
            report.removed_stray_payloads += 1;
        }

        report.evicted = self.evict()?;

        info!(
            corrupt = report.corrupt.len(),
            adopted = report.adopted_from_primary,
            recovered = report.recovered_snapshots,
            backfilled = report.backfilled_primary,
            pruned = report.pruned_primary,
            strays = report.removed_stray_payloads,
            "doctor finished"
        );
        Ok(report)
    }

    fn begin_ingest(&self, id: RecordId) -> InFlight<'_> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        InFlight {
            set: &self.in_flight,
            id,
        }
    }

    fn in_flight_ids(&self) -> BTreeSet<RecordId> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Issued after `floor` was taken, or still being ingested.
    fn is_recent(&self, id: RecordId, floor: RecordId) -> bool {
        id > floor || self.in_flight_ids().contains(&id)
    }

    /// Drops `id` from the backup index and, under the same lock, its files.
    /// Returns whether the backup listed it.
    fn remove_live(&self, id: RecordId) -> Result<bool> {
        self.backup.update(|entries| {
            let before = entries.len();
            entries.retain(|e| e.id != id);
            let removed = entries.len() < before;
            if removed {
                self.discard_payload(id);
            }
            removed
        })
    }

    fn discard_payload(&self, id: RecordId) {
        if let Err(e) = self.payloads.remove(id) {
            warn!(%id, error = %e, "could not remove payload files");
        }
    }

    /// An index pointed at a snapshot that is not there. If the backup still
    /// lists the id this is corruption; otherwise a concurrent delete or
    /// eviction won the race and there is nothing to report.
    fn report_missing_snapshot(&self, id: RecordId) {
        let still_indexed = self
            .backup
            .list()
            .map(|entries| entries.iter().any(|e| e.id == id))
            .unwrap_or(true);
        if still_indexed {
            warn!(%id, "index entry has no snapshot on disk, treating as not found");
        } else {
            debug!(%id, "snapshot already removed by a concurrent delete");
        }
    }
}

fn log_primary_failure(op: &str, error: &PrimaryError) {
    match error {
        PrimaryError::NotConfigured => debug!(op, "no primary store, using backup index"),
        PrimaryError::Unavailable(_) => {
            warn!(op, error = %error, "primary store unavailable, using backup index")
        }
    }
}
