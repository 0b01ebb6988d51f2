//! CSV export of the attendance ledger.

use crate::types::AttendanceRecord;
use chrono::NaiveDate;
use thiserror::Error;

pub const CSV_HEADER: [&str; 6] = ["Date", "Time", "Name", "Status", "Confidence", "Face ID"];

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush csv buffer: {0}")]
    Flush(String),
}

/// Render records (in the order given) as a comma-separated table.
///
/// The name column is always quoted and confidence is a percentage with one
/// decimal, e.g. `2024-01-01,09:00:00,"A B",checkin,92.0%,F1`.
pub fn to_csv(records: &[AttendanceRecord]) -> Result<String, ExportError> {
    // Quoting is done per column below; the writer must not add its own.
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for r in records {
        writer.write_record([
            r.date.to_string(),
            r.time.to_string(),
            quote(&r.person.full_name()),
            r.kind.to_string(),
            format_confidence(r.confidence),
            quote_if_needed(&r.face_id),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Flush(e.to_string()))?;
    String::from_utf8(bytes)
        .map_err(|e| ExportError::Flush(e.to_string()))
}

/// Download name for an export made on `date`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("attendance_records_{date}.csv")
}

/// Confidence in [0, 1] as a one-decimal percentage.
pub fn format_confidence(confidence: f64) -> String {
    format!("{:.1}%", confidence * 100.0)
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn quote_if_needed(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        quote(field)
    } else {
        field.to_string()
    }
}
