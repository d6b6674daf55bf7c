use chrono::{DateTime, Utc};
use colored::Colorize;
use tabvault::api::{CmdMessage, MessageLevel};
use tabvault::config::TabvaultConfig;
use tabvault::model::{Record, RecordSummary};
use tabvault::validation::format_file_size;
use timeago::Formatter;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const LINE_WIDTH: usize = 100;
const TIME_WIDTH: usize = 14;
const ID_WIDTH: usize = 15;
const SHAPE_WIDTH: usize = 16;
const SIZE_WIDTH: usize = 10;

pub(crate) fn print_messages(messages: &[CmdMessage]) {
    for message in messages {
        match message.level {
            MessageLevel::Info => println!("{}", message.content.dimmed()),
            MessageLevel::Success => println!("{}", message.content.green()),
            MessageLevel::Warning => println!("{}", message.content.yellow()),
            MessageLevel::Error => println!("{}", message.content.red()),
        }
    }
}

pub(crate) fn print_summaries(entries: &[RecordSummary]) {
    for entry in entries {
        let id = format!("{:<width$}", entry.id.to_string(), width = ID_WIDTH);
        let shape = format!(
            "{:>width$}",
            format!("{}r × {}c", entry.row_count, entry.headers.len()),
            width = SHAPE_WIDTH
        );
        let size = format!(
            "{:>width$}",
            format_file_size(entry.size_bytes),
            width = SIZE_WIDTH
        );

        let fixed_width = ID_WIDTH + 1 + SHAPE_WIDTH + SIZE_WIDTH + TIME_WIDTH;
        let available = LINE_WIDTH.saturating_sub(fixed_width);
        let name = truncate_to_width(&entry.original_name, available);
        let padding = available.saturating_sub(name.width());

        println!(
            "{} {}{}{}{}{}",
            id.yellow(),
            name,
            " ".repeat(padding),
            shape,
            size.dimmed(),
            format_time_ago(entry.upload_timestamp).dimmed()
        );
    }
}

pub(crate) fn print_record(record: &Record) {
    let summary = &record.summary;
    println!(
        "{} {}",
        summary.id.to_string().yellow(),
        summary.original_name.bold()
    );
    println!(
        "{}",
        format!(
            "{} rows, {} columns, {}, uploaded {}",
            summary.row_count,
            summary.headers.len(),
            format_file_size(summary.size_bytes),
            summary.upload_timestamp.to_rfc3339()
        )
        .dimmed()
    );
    println!("--------------------------------");
    println!("{}", summary.headers.join("\t").bold());
    for row in &record.rows {
        let cells: Vec<String> = summary
            .headers
            .iter()
            .map(|h| match row.get(h) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            })
            .collect();
        println!("{}", cells.join("\t"));
    }
}

pub(crate) fn print_config(config: &TabvaultConfig) {
    for key in TabvaultConfig::keys() {
        if let Ok(value) = config.get(key) {
            println!("{} = {}", key, value);
        }
    }
}

fn truncate_to_width(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }

    let mut result = String::new();
    let mut current_width = 0;

    for c in s.chars() {
        let char_width = c.width().unwrap_or(0);
        if current_width + char_width > max_width.saturating_sub(1) {
            result.push('…');
            return result;
        }
        result.push(c);
        current_width += char_width;
    }

    result
}

fn format_time_ago(timestamp: DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(timestamp);
    let time_str = Formatter::new().convert(duration.to_std().unwrap_or_default());
    format!("{:>width$}", time_str, width = TIME_WIDTH)
}
