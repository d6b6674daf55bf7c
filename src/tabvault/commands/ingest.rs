use crate::commands::{CmdMessage, CmdResult};
use crate::error::{IoContext, Result, TabvaultError};
use crate::model::{Row, Upload};
use crate::store::primary::PrimaryIndex;
use crate::store::MetadataStore;
use crate::validation::format_file_size;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Extracted table handed over alongside the raw upload.
///
/// `headers` may be omitted, in which case the keys of the first row are used.
#[derive(Debug, Deserialize)]
struct TableData {
    #[serde(default)]
    headers: Option<Vec<String>>,
    rows: Vec<Row>,
}

pub fn run<P: PrimaryIndex>(store: &MetadataStore<P>, upload: Upload) -> Result<CmdResult> {
    let record = store.ingest(upload)?;

    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "Stored {} as {} ({} rows, {} columns, {})",
        record.summary.original_name,
        record.id(),
        record.summary.row_count,
        record.summary.headers.len(),
        format_file_size(record.summary.size_bytes)
    )));
    Ok(result.with_records(vec![record]))
}

/// Builds an [`Upload`] from the original file and the JSON rows extracted from it.
pub fn load_upload(file: &Path, data: &Path) -> Result<Upload> {
    let original_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| TabvaultError::Api(format!("Not a file: {}", file.display())))?;
    let bytes = fs::read(file).io_context(|| format!("reading {}", file.display()))?;
    let raw = fs::read(data).io_context(|| format!("reading {}", data.display()))?;
    let table: TableData = serde_json::from_slice(&raw)?;

    let headers = match table.headers {
        Some(headers) => headers,
        None => table
            .rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default(),
    };

    Ok(Upload::new(original_name, bytes, table.rows, headers))
}
