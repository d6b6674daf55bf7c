use crate::model::Row;
use crate::store::primary::memory::MemoryIndex;
use crate::store::{MetadataStore, StoreSettings};
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

pub struct TestEnv {
    pub dir: TempDir,
    pub store: MetadataStore<MemoryIndex>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::build(MemoryIndex::new(), StoreSettings::default())
    }

    pub fn with_primary(primary: MemoryIndex) -> Self {
        Self::build(primary, StoreSettings::default())
    }

    pub fn with_retention(retention_count: usize) -> Self {
        let settings = StoreSettings {
            retention_count,
            ..StoreSettings::default()
        };
        Self::build(MemoryIndex::new(), settings)
    }

    fn build(primary: MemoryIndex, settings: StoreSettings) -> Self {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::open(dir.path(), primary, settings).unwrap();
        Self { dir, store }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

/// `count` rows of a two-column sales table.
pub fn rows(count: usize) -> Vec<Row> {
    (0..count)
        .map(|i| {
            let mut row = Row::new();
            row.insert("region".to_string(), json!(format!("r{}", i)));
            row.insert("amount".to_string(), json!(i));
            row
        })
        .collect()
}
