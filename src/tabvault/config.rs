//! # Configuration
//!
//! Stored as `config.json` in the data directory. Every key is optional; a
//! missing file or a missing key falls back to the compiled default.
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `max_file_size_bytes` | `1048576` | Largest accepted upload |
//! | `max_rows` | `1000` | Largest accepted row count |
//! | `max_columns` | `10` | Largest accepted header count |
//! | `retention_count` | `10` | Live records kept before eviction |
//! | `recent_limit` | `5` | Default size of the recent listing |
//! | `allowed_extensions` | `[".xlsx", ".xls", ".csv"]` | Accepted upload extensions |
//! | `primary_url` | unset | Primary store connection string (`redb://<path>`) |

use crate::error::{IoContext, Result, TabvaultError};
use crate::validation::{self, Limits};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILENAME: &str = "config.json";
pub const DEFAULT_RETENTION_COUNT: usize = 10;
pub const DEFAULT_RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TabvaultConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,

    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    #[serde(default = "default_max_columns")]
    pub max_columns: usize,

    #[serde(default = "default_retention")]
    pub retention_count: usize,

    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,

    #[serde(default = "validation::default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_url: Option<String>,
}

fn default_max_file_size() -> u64 {
    validation::DEFAULT_MAX_FILE_SIZE_BYTES
}

fn default_max_rows() -> usize {
    validation::DEFAULT_MAX_ROWS
}

fn default_max_columns() -> usize {
    validation::DEFAULT_MAX_COLUMNS
}

fn default_retention() -> usize {
    DEFAULT_RETENTION_COUNT
}

fn default_recent_limit() -> usize {
    DEFAULT_RECENT_LIMIT
}

impl Default for TabvaultConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size(),
            max_rows: default_max_rows(),
            max_columns: default_max_columns(),
            retention_count: default_retention(),
            recent_limit: default_recent_limit(),
            allowed_extensions: validation::default_allowed_extensions(),
            primary_url: None,
        }
    }
}

impl TabvaultConfig {
    /// Load config from the given directory, or return defaults if not found
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILENAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .io_context(|| format!("reading {}", config_path.display()))?;
        let config: TabvaultConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the given directory
    pub fn save<P: AsRef<Path>>(&self, config_dir: P) -> Result<()> {
        let config_dir = config_dir.as_ref();
        fs::create_dir_all(config_dir)
            .io_context(|| format!("creating {}", config_dir.display()))?;

        let config_path = config_dir.join(CONFIG_FILENAME);
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, content)
            .io_context(|| format!("writing {}", config_path.display()))?;
        Ok(())
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_file_size_bytes: self.max_file_size_bytes,
            max_rows: self.max_rows,
            max_columns: self.max_columns,
            allowed_extensions: self
                .allowed_extensions
                .iter()
                .map(|ext| normalize_ext(ext))
                .collect(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.retention_count == 0 {
            return Err(TabvaultError::Config(
                "retention_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Read a single key as a display string.
    pub fn get(&self, key: &str) -> Result<String> {
        let value = match normalize_key(key).as_str() {
            "max_file_size_bytes" => self.max_file_size_bytes.to_string(),
            "max_rows" => self.max_rows.to_string(),
            "max_columns" => self.max_columns.to_string(),
            "retention_count" => self.retention_count.to_string(),
            "recent_limit" => self.recent_limit.to_string(),
            "allowed_extensions" => self.allowed_extensions.join(","),
            "primary_url" => self.primary_url.clone().unwrap_or_default(),
            _ => return Err(unknown_key(key)),
        };
        Ok(value)
    }

    /// Set a single key from its string form.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_key(key).as_str() {
            "max_file_size_bytes" => self.max_file_size_bytes = parse_number(key, value)?,
            "max_rows" => self.max_rows = parse_number(key, value)?,
            "max_columns" => self.max_columns = parse_number(key, value)?,
            "retention_count" => self.retention_count = parse_number(key, value)?,
            "recent_limit" => self.recent_limit = parse_number(key, value)?,
            "allowed_extensions" => {
                self.allowed_extensions = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(normalize_ext)
                    .collect()
            }
            "primary_url" => {
                self.primary_url = if value.trim().is_empty() {
                    None
                } else {
                    Some(value.trim().to_string())
                }
            }
            _ => return Err(unknown_key(key)),
        }
        self.validate()
    }

    pub fn keys() -> &'static [&'static str] {
        &[
            "max-file-size-bytes",
            "max-rows",
            "max-columns",
            "retention-count",
            "recent-limit",
            "allowed-extensions",
            "primary-url",
        ]
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().replace('-', "_").to_lowercase()
}

fn normalize_ext(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

fn unknown_key(key: &str) -> TabvaultError {
    TabvaultError::Config(format!("Unknown config key: {}", key))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| TabvaultError::Config(format!("Invalid value for {}: {}", key, value)))
}
