//! # Admission Limits
//!
//! Every upload is checked against [`Limits`] before anything touches disk.
//! A violation produces a [`ValidationError`] and no partial record.
//!
//! Checks run in a fixed order: file type, size, rows, columns. The first
//! violation wins, so a caller sees one actionable message at a time.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 1024 * 1024;
pub const DEFAULT_MAX_ROWS: usize = 1000;
pub const DEFAULT_MAX_COLUMNS: usize = 10;

pub fn default_allowed_extensions() -> Vec<String> {
    vec![".xlsx".to_string(), ".xls".to_string(), ".csv".to_string()]
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("File too large. Maximum file size is {}. Your file is {}.", human(.max), human(.size))]
    FileTooLarge { size: u64, max: u64 },

    #[error("Dataset too large. Maximum {max} rows allowed. Your dataset has {rows} rows.")]
    TooManyRows { rows: usize, max: usize },

    #[error("Too many columns. Maximum {max} columns allowed. Your dataset has {columns} columns.")]
    TooManyColumns { columns: usize, max: usize },

    #[error("Unsupported file type: {name}. Allowed extensions: {}", .allowed.join(", "))]
    UnsupportedFileType { name: String, allowed: Vec<String> },
}

fn human(bytes: &u64) -> String {
    format_file_size(*bytes)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub max_file_size_bytes: u64,
    pub max_rows: usize,
    pub max_columns: usize,
    /// Lowercase, dot-prefixed. Empty means any extension is accepted.
    pub allowed_extensions: Vec<String>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            max_rows: DEFAULT_MAX_ROWS,
            max_columns: DEFAULT_MAX_COLUMNS,
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

impl Limits {
    pub fn check(
        &self,
        original_name: &str,
        size_bytes: u64,
        rows: usize,
        columns: usize,
    ) -> Result<(), ValidationError> {
        if !self.extension_allowed(original_name) {
            return Err(ValidationError::UnsupportedFileType {
                name: original_name.to_string(),
                allowed: self.allowed_extensions.clone(),
            });
        }
        if size_bytes > self.max_file_size_bytes {
            return Err(ValidationError::FileTooLarge {
                size: size_bytes,
                max: self.max_file_size_bytes,
            });
        }
        if rows > self.max_rows {
            return Err(ValidationError::TooManyRows {
                rows,
                max: self.max_rows,
            });
        }
        if columns > self.max_columns {
            return Err(ValidationError::TooManyColumns {
                columns,
                max: self.max_columns,
            });
        }
        Ok(())
    }

    fn extension_allowed(&self, name: &str) -> bool {
        if self.allowed_extensions.is_empty() {
            return true;
        }
        let lower = name.to_lowercase();
        self.allowed_extensions
            .iter()
            .any(|ext| lower.ends_with(&ext.to_lowercase()))
    }
}

/// Human-readable byte count: `0 Bytes`, `512 Bytes`, `1.5 KB`, `1 MB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
