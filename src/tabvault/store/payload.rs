use crate::error::{IoContext, Result};
use crate::model::{RecordId, Snapshot};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const FILES_DIR: &str = "files";
const SNAPSHOTS_DIR: &str = "snapshots";
const SNAPSHOT_SUFFIX: &str = "-data.json";

/// Owns the on-disk blobs for each record: the uploaded file and its JSON
/// snapshot. No caching, every call touches the filesystem.
///
/// ```text
/// uploads/
/// ├── files/{id}-{originalName}     # Uploaded bytes, verbatim
/// └── snapshots/{id}-data.json      # { rows, headers, metadata }
/// ```
#[derive(Debug, Clone)]
pub struct PayloadStore {
    root: PathBuf,
}

impl PayloadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// On-disk name for an upload. Prefixed by id so names never collide.
    pub fn stored_name(id: RecordId, original_name: &str) -> String {
        let safe: String = original_name
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '\0' => '_',
                c => c,
            })
            .collect();
        let safe = safe.trim_start_matches('.');
        let safe = if safe.is_empty() { "upload" } else { safe };
        format!("{}-{}", id, safe)
    }

    pub fn blob_path(&self, stored_name: &str) -> PathBuf {
        self.root.join(FILES_DIR).join(stored_name)
    }

    pub fn snapshot_path(&self, id: RecordId) -> PathBuf {
        self.root
            .join(SNAPSHOTS_DIR)
            .join(format!("{}{}", id, SNAPSHOT_SUFFIX))
    }

    /// Writes the uploaded bytes and the snapshot. Either both land or
    /// neither does: a failed snapshot write removes the blob again.
    pub fn put(
        &self,
        id: RecordId,
        stored_name: &str,
        bytes: &[u8],
        snapshot: &Snapshot,
    ) -> Result<(PathBuf, PathBuf)> {
        let blob_path = self.blob_path(stored_name);
        let snapshot_path = self.snapshot_path(id);
        let encoded = serde_json::to_vec_pretty(snapshot)?;

        write_atomic(&blob_path, bytes)
            .io_context(|| format!("writing upload {}", blob_path.display()))?;

        if let Err(e) = write_atomic(&snapshot_path, &encoded) {
            let _ = remove_if_present(&blob_path);
            return Err(e).io_context(|| format!("writing snapshot {}", snapshot_path.display()));
        }

        Ok((blob_path, snapshot_path))
    }

    /// Reads the snapshot. `Ok(None)` when the file does not exist.
    pub fn load_snapshot(&self, id: RecordId) -> Result<Option<Snapshot>> {
        let path = self.snapshot_path(id);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).io_context(|| format!("reading {}", path.display())),
        };
        Ok(Some(serde_json::from_slice(&content)?))
    }

    pub fn exists(&self, id: RecordId) -> bool {
        self.snapshot_path(id).is_file()
    }

    /// Deletes both artifacts. Missing files are fine.
    pub fn remove(&self, id: RecordId) -> Result<()> {
        let snapshot_path = self.snapshot_path(id);
        remove_if_present(&snapshot_path)
            .io_context(|| format!("removing {}", snapshot_path.display()))?;

        for blob in self.blobs_for(id)? {
            remove_if_present(&blob).io_context(|| format!("removing {}", blob.display()))?;
        }
        Ok(())
    }

    /// Ids with a snapshot on disk.
    pub fn snapshot_ids(&self) -> Result<BTreeSet<RecordId>> {
        let dir = self.root.join(SNAPSHOTS_DIR);
        let mut ids = BTreeSet::new();
        for name in list_file_names(&dir)? {
            if let Some(id) = name
                .strip_suffix(SNAPSHOT_SUFFIX)
                .and_then(|stem| stem.parse().ok())
            {
                ids.insert(id);
            }
        }
        Ok(ids)
    }

    /// Ids with an uploaded blob on disk.
    pub fn blob_ids(&self) -> Result<BTreeSet<RecordId>> {
        let dir = self.root.join(FILES_DIR);
        let mut ids = BTreeSet::new();
        for name in list_file_names(&dir)? {
            if let Some(id) = name
                .split_once('-')
                .and_then(|(prefix, _)| prefix.parse().ok())
            {
                ids.insert(id);
            }
        }
        Ok(ids)
    }

    fn blobs_for(&self, id: RecordId) -> Result<Vec<PathBuf>> {
        let dir = self.root.join(FILES_DIR);
        let prefix = format!("{}-", id);
        Ok(list_file_names(&dir)?
            .into_iter()
            .filter(|name| name.starts_with(&prefix))
            .map(|name| dir.join(name))
            .collect())
    }
}

fn list_file_names(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).io_context(|| format!("listing {}", dir.display())),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.io_context(|| format!("listing {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
            if !name.starts_with('.') {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}

/// Write to a hidden temp file in the target directory, then rename over the target.
pub(crate) fn write_atomic(target: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = target
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    fs::create_dir_all(dir)?;

    let tmp = dir.join(format!(".{}.tmp", Uuid::new_v4()));
    if let Err(e) = fs::write(&tmp, bytes).and_then(|_| fs::rename(&tmp, target)) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordSummary;
    use chrono::Utc;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PayloadStore) {
        let dir = TempDir::new().unwrap();
        let store = PayloadStore::new(dir.path().join("uploads"));
        (dir, store)
    }

    fn snapshot(store: &PayloadStore, id: RecordId, name: &str) -> Snapshot {
        let stored_name = PayloadStore::stored_name(id, name);
        Snapshot {
            rows: vec![],
            headers: vec!["region".to_string()],
            metadata: RecordSummary {
                id,
                original_name: name.to_string(),
                payload_path: store.blob_path(&stored_name),
                stored_name,
                upload_timestamp: Utc::now(),
                size_bytes: 3,
                row_count: 0,
                headers: vec!["region".to_string()],
            },
        }
    }

    #[test]
    fn test_put_writes_both_artifacts() {
        let (_dir, store) = setup();
        let id = RecordId::new(42);
        let snap = snapshot(&store, id, "q1.csv");

        let (blob, snap_path) = store
            .put(id, &snap.metadata.stored_name, b"a,b", &snap)
            .unwrap();

        assert_eq!(fs::read(&blob).unwrap(), b"a,b");
        assert_eq!(snap_path, store.snapshot_path(id));
        assert!(store.exists(id));
        assert_eq!(store.load_snapshot(id).unwrap(), Some(snap));
    }

    #[test]
    fn test_put_leaves_no_tmp_files() {
        let (_dir, store) = setup();
        let id = RecordId::new(1);
        let snap = snapshot(&store, id, "q1.csv");
        store
            .put(id, &snap.metadata.stored_name, b"x", &snap)
            .unwrap();

        for sub in [FILES_DIR, SNAPSHOTS_DIR] {
            for entry in fs::read_dir(store.root().join(sub)).unwrap() {
                let name = entry.unwrap().file_name().into_string().unwrap();
                assert!(!name.ends_with(".tmp"), "leftover tmp file: {}", name);
            }
        }
    }

    #[test]
    fn test_put_fails_when_root_is_a_file() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("uploads");
        fs::write(&root, "not a directory").unwrap();
        let store = PayloadStore::new(&root);
        let id = RecordId::new(5);
        let snap = snapshot(&store, id, "q1.csv");

        let result = store.put(id, &snap.metadata.stored_name, b"x", &snap);
        assert!(matches!(result, Err(crate::error::TabvaultError::Io { .. })));
        assert!(!store.exists(id));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (_dir, store) = setup();
        let id = RecordId::new(7);
        let snap = snapshot(&store, id, "q1.csv");
        let (blob, _) = store
            .put(id, &snap.metadata.stored_name, b"x", &snap)
            .unwrap();

        store.remove(id).unwrap();
        assert!(!store.exists(id));
        assert!(!blob.exists());

        store.remove(id).unwrap();
        store.remove(RecordId::new(999)).unwrap();
    }

    #[test]
    fn test_remove_only_touches_matching_id() {
        let (_dir, store) = setup();
        for raw in [12, 123] {
            let id = RecordId::new(raw);
            let snap = snapshot(&store, id, "q.csv");
            store
                .put(id, &snap.metadata.stored_name, b"x", &snap)
                .unwrap();
        }

        store.remove(RecordId::new(12)).unwrap();
        assert!(store.exists(RecordId::new(123)));
        assert_eq!(
            store.blob_ids().unwrap().into_iter().collect::<Vec<_>>(),
            vec![RecordId::new(123)]
        );
    }

    #[test]
    fn test_missing_snapshot_loads_as_none() {
        let (_dir, store) = setup();
        assert_eq!(store.load_snapshot(RecordId::new(3)).unwrap(), None);
        assert!(store.snapshot_ids().unwrap().is_empty());
    }

    #[test]
    fn test_stored_name_strips_path_separators() {
        let id = RecordId::new(10);
        assert_eq!(
            PayloadStore::stored_name(id, "../../etc/passwd.csv"),
            "10-_.._etc_passwd.csv"
        );
        assert_eq!(PayloadStore::stored_name(id, ""), "10-upload");
    }
}
