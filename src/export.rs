//! Semicolon-delimited export of one day's records.
//!
//! Columns mirror the store's order: title;link;description;publish_date;
//! full_text. Fields containing the delimiter, quotes, or newlines are
//! quoted.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::storage::{NewsRecord, Store};

/// Date format accepted by `newswire export` and used in output filenames.
pub const EXPORT_DATE_FORMAT: &str = "%d-%m-%Y";

/// Writes all records published on `date` (UTC) to
/// `News_of_<DD-MM-YYYY>.csv` under `out_dir`. Returns the file path and
/// row count.
pub async fn export_for_date(
    store: &Store,
    date: NaiveDate,
    out_dir: &Path,
) -> Result<(PathBuf, usize)> {
    let records = store
        .records_for_date(date)
        .await
        .context("failed to load records for export")?;

    std::fs::create_dir_all(out_dir).with_context(|| {
        format!(
            "failed to create output directory '{}'",
            out_dir.display()
        )
    })?;
    let path = out_dir.join(format!("News_of_{}.csv", date.format(EXPORT_DATE_FORMAT)));

    let mut contents = String::new();
    for record in &records {
        contents.push_str(&row(record));
        contents.push('\n');
    }
    std::fs::write(&path, contents)
        .with_context(|| format!("failed to write '{}'", path.display()))?;

    tracing::info!(rows = records.len(), path = %path.display(), "export written");
    Ok((path, records.len()))
}

fn row(record: &NewsRecord) -> String {
    let published = chrono::DateTime::from_timestamp(record.publish_date, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| record.publish_date.to_string());
    [
        record.title.as_str(),
        record.link.as_str(),
        record.description.as_str(),
        published.as_str(),
        record.full_text.as_deref().unwrap_or(""),
    ]
    .iter()
    .map(|value| field(value))
    .collect::<Vec<_>>()
    .join(";")
}

fn field(value: &str) -> String {
    if value.contains(';') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
