use super::payload::write_atomic;
use crate::error::{IoContext, Result};
use crate::model::{RecordId, RecordSummary};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const BACKUP_FILENAME: &str = "file-metadata.json";

/// The local, always-written index: one JSON array of [`RecordSummary`] in
/// insertion order.
///
/// Every call reads the file fresh, so two processes (or a restart) never see
/// a diverging in-memory copy. Mutations hold the lock for the whole
/// read-modify-write and persist through a temp file + rename.
#[derive(Debug)]
pub struct BackupIndex {
    path: PathBuf,
    lock: Mutex<()>,
}

impl BackupIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn list(&self) -> Result<Vec<RecordSummary>> {
        let _guard = self.guard();
        self.load()
    }

    /// Adds `entry` at the end. An entry with the same id is replaced in place,
    /// so an id is never listed twice.
    pub fn append(&self, entry: RecordSummary) -> Result<()> {
        self.update(|entries| match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        })
    }

    /// Removes every entry whose id is in `ids`; returns the removed entries.
    pub fn remove_many(&self, ids: &[RecordId]) -> Result<Vec<RecordSummary>> {
        self.update(|entries| {
            let (removed, kept): (Vec<_>, Vec<_>) = entries
                .drain(..)
                .partition(|entry| ids.contains(&entry.id));
            *entries = kept;
            removed
        })
    }

    #[cfg(test)]
    pub(crate) fn replace_all(&self, entries: Vec<RecordSummary>) -> Result<()> {
        self.update(move |current| *current = entries)
    }

    /// Runs `f` against the current list under the lock and persists the
    /// result if it changed. The list `f` sees is a consistent snapshot.
    pub fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<RecordSummary>) -> T,
    {
        let _guard = self.guard();
        let mut entries = self.load()?;
        let before = entries.clone();
        let out = f(&mut entries);
        if entries != before {
            self.save(&entries)?;
        }
        Ok(out)
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The list lives on disk, so a panic elsewhere can't leave it half-mutated.
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self) -> Result<Vec<RecordSummary>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).io_context(|| format!("reading {}", self.path.display())),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, entries: &[RecordSummary]) -> Result<()> {
        let content = serde_json::to_vec_pretty(entries)?;
        write_atomic(&self.path, &content)
            .io_context(|| format!("writing {}", self.path.display()))
    }
}
