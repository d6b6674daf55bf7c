//! # API Facade
//!
//! The single entry point for every tabvault operation, whichever client is
//! driving it (the bundled CLI, or an HTTP layer mapping routes 1:1 onto
//! these methods):
//!
//! | Operation | Method |
//! |-----------|--------|
//! | ingest | [`TabvaultApi::ingest`] / [`TabvaultApi::ingest_file`] |
//! | getRecent | [`TabvaultApi::recent`] |
//! | getById | [`TabvaultApi::get`] |
//! | deleteById | [`TabvaultApi::delete`] |
//!
//! The facade dispatches to `commands/*.rs`, normalizes inputs (string ids
//! to [`RecordId`], optional limits to configured defaults) and returns
//! `Result<CmdResult>`. No printing, no exit codes.
//!
//! ## Generic Over PrimaryIndex
//!
//! - Production: `TabvaultApi<Box<dyn PrimaryIndex>>` from [`primary::connect`]
//! - Testing: `TabvaultApi<MemoryIndex>`
//!
//! [`primary::connect`]: crate::store::primary::connect

use crate::commands;
use crate::config::TabvaultConfig;
use crate::error::{Result, TabvaultError};
use crate::model::{RecordId, Upload};
use crate::store::primary::PrimaryIndex;
use crate::store::{MetadataStore, StoreSettings};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct TabvaultApi<P: PrimaryIndex> {
    store: MetadataStore<P>,
    data_dir: PathBuf,
    config: TabvaultConfig,
}

impl<P: PrimaryIndex> TabvaultApi<P> {
    /// Loads `config.json` from `data_dir` and opens the store there.
    pub fn open(data_dir: impl Into<PathBuf>, primary: P) -> Result<Self> {
        let data_dir = data_dir.into();
        let config = TabvaultConfig::load(&data_dir)?;
        Self::with_config(data_dir, config, primary)
    }

    pub fn with_config(data_dir: PathBuf, config: TabvaultConfig, primary: P) -> Result<Self> {
        debug!(
            data_dir = %data_dir.display(),
            primary = %primary.describe(),
            "opening store"
        );
        let store = MetadataStore::open(&data_dir, primary, StoreSettings::from(&config))?;
        Ok(Self {
            store,
            data_dir,
            config,
        })
    }

    pub fn ingest(&self, upload: Upload) -> Result<commands::CmdResult> {
        commands::ingest::run(&self.store, upload)
    }

    /// Ingests `file`, with rows taken from the JSON document at `data`.
    pub fn ingest_file(&self, file: &Path, data: &Path) -> Result<commands::CmdResult> {
        let upload = commands::ingest::load_upload(file, data)?;
        commands::ingest::run(&self.store, upload)
    }

    /// Most recent records; `None` uses the configured `recent_limit`.
    pub fn recent(&self, limit: Option<usize>) -> Result<commands::CmdResult> {
        let limit = limit.unwrap_or(self.config.recent_limit);
        commands::recent::run(&self.store, limit)
    }

    pub fn get(&self, id: &str) -> Result<commands::CmdResult> {
        commands::get::run(&self.store, parse_id(id)?)
    }

    pub fn delete<I: AsRef<str>>(&self, ids: &[I]) -> Result<commands::CmdResult> {
        let ids = ids
            .iter()
            .map(|id| parse_id(id.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        commands::delete::run(&self.store, &ids)
    }

    pub fn doctor(&self) -> Result<commands::CmdResult> {
        commands::doctor::run(&self.store)
    }

    pub fn config(&self, action: ConfigAction) -> Result<commands::CmdResult> {
        commands::config::run(&self.data_dir, action)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn store(&self) -> &MetadataStore<P> {
        &self.store
    }
}

fn parse_id(input: &str) -> Result<RecordId> {
    input
        .parse()
        .map_err(|_| TabvaultError::Api(format!("Invalid record id: {}", input)))
}

pub use crate::commands::config::ConfigAction;
pub use commands::{CmdMessage, CmdResult, MessageLevel};
