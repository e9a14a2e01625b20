/// Tabular export of the event log
use log::info;
use std::fmt::Write as _;
use std::path::Path;

use crate::models::LogEntry;
use crate::utils::format_datetime;

pub const CSV_HEADER: &str = "timestamp,temperature,humidity,label,confidence";

/// Render entries as CSV, oldest first
///
/// The confidence column is left empty when the classifier gave none.
pub fn to_csv(entries: &[LogEntry]) -> String {
    let mut out = String::with_capacity(64 * (entries.len() + 1));
    out.push_str(CSV_HEADER);
    out.push('\n');

    for entry in entries {
        let confidence = entry
            .classification
            .confidence
            .map(|c| format!("{:.4}", c))
            .unwrap_or_default();

        // Writing into a String cannot fail
        let _ = writeln!(
            out,
            "{},{},{},{},{}",
            format_datetime(&entry.reading.timestamp),
            entry.reading.temperature,
            entry.reading.humidity,
            entry.classification.label.as_str(),
            confidence
        );
    }

    out
}

/// Write entries as CSV to `path`
pub fn write_csv(path: &Path, entries: &[LogEntry]) -> std::io::Result<()> {
    std::fs::write(path, to_csv(entries))?;
    info!("Exported {} entries to {}", entries.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classification, Label, SensorReading};
    use time::macros::datetime;

    fn entries() -> Vec<LogEntry> {
        vec![
            LogEntry {
                reading: SensorReading {
                    timestamp: datetime!(2024-06-01 12:00:00 UTC),
                    temperature: 35.0,
                    humidity: 40.5,
                },
                classification: Classification {
                    label: Label::Hot,
                    confidence: Some(0.95),
                },
            },
            LogEntry {
                reading: SensorReading {
                    timestamp: datetime!(2024-06-01 12:00:01 UTC),
                    temperature: 22.25,
                    humidity: 60.0,
                },
                classification: Classification {
                    label: Label::Normal,
                    confidence: None,
                },
            },
        ]
    }

    #[test]
    fn renders_header_and_rows() {
        let csv = to_csv(&entries());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "timestamp,temperature,humidity,label,confidence",
                "2024-06-01 12:00:00,35,40.5,Hot,0.9500",
                "2024-06-01 12:00:01,22.25,60,Normal,",
            ]
        );
    }

    #[test]
    fn empty_log_is_header_only() {
        assert_eq!(to_csv(&[]), format!("{}\n", CSV_HEADER));
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        write_csv(&path, &entries()).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 3);
    }
}
