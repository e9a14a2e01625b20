/// Utility functions for formatting readings
use time::macros::format_description;
use time::OffsetDateTime;

use crate::models::LogEntry;

/// Format a timestamp for tables and CSV export
///
/// Converts an OffsetDateTime to YYYY-MM-DD HH:MM:SS format.
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    dt.format(&format).unwrap_or_else(|_| dt.to_string())
}

/// One-line human readable summary of a processed reading
pub fn describe_entry(entry: &LogEntry) -> String {
    let confidence = entry
        .classification
        .confidence
        .map(|c| format!(" ({:.0}%)", c * 100.0))
        .unwrap_or_default();

    format!(
        "{} temp={:.2}°C hum={:.2}% -> {}{}",
        format_datetime(&entry.reading.timestamp),
        entry.reading.temperature,
        entry.reading.humidity,
        entry.classification.label.as_str(),
        confidence
    )
}
