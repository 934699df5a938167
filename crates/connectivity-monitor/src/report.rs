//! `--dump` and `--stats` rendering.
//!
//! Reports go to any `io::Write` so the binary prints to stdout and tests
//! capture into a buffer.

use common::{Error, Result};
use connectivity::codec;
use connectivity::{AppendLog, PeriodLength, PeriodStats, Record, StatsReport};
use serde::Serialize;
use std::io::Write;
use tracing::warn;

const INDENT: &str = "  ";
const NO_SAMPLES: &str = "No samples";
const PERCENTAGE_WIDTH: usize = 10;

/// Replay the log for reporting.
///
/// An unreadable file is reported as empty. A malformed interior line still
/// fails under the strict policy.
pub async fn load_records(log: &AppendLog) -> Result<Vec<Record>> {
    match log.replay_all().await {
        Ok(records) => Ok(records),
        Err(Error::Io(e)) => {
            warn!(path = %log.path().display(), error = %e, "Failed to read log, reporting it as empty");
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

#[derive(Serialize)]
struct RecordView {
    timestamp: String,
    status_code: Option<u16>,
    elapsed_us: Option<u64>,
}

impl RecordView {
    fn new(record: &Record) -> Result<Self> {
        Ok(Self {
            timestamp: codec::format_timestamp(record.timestamp())?,
            status_code: record.status_code(),
            elapsed_us: record.elapsed().map(|e| e.as_micros() as u64),
        })
    }
}

/// Print one line per record, in file order.
pub fn write_dump<W: Write>(out: &mut W, records: &[Record]) -> Result<()> {
    for record in records {
        writeln!(out, "{}", codec::encode(record)?)?;
    }
    Ok(())
}

/// Print one JSON object per record, in file order.
pub fn write_dump_json<W: Write>(out: &mut W, records: &[Record]) -> Result<()> {
    for record in records {
        writeln!(out, "{}", serde_json::to_string(&RecordView::new(record)?)?)?;
    }
    Ok(())
}

/// Render a ratio as a right-aligned percentage with five decimals.
pub fn format_percentage(ratio: f64) -> String {
    format!("{:>width$}", format!("{:.5}%", ratio * 100.0), width = PERCENTAGE_WIDTH)
}

fn format_ratio(ratio: Option<f64>) -> String {
    match ratio {
        Some(ratio) => format_percentage(ratio),
        None => NO_SAMPLES.to_string(),
    }
}

fn write_period<W: Write>(out: &mut W, period: &PeriodStats) -> std::io::Result<()> {
    writeln!(out, "{}", period.name)?;
    if !period.has_samples() {
        return writeln!(out, "{}{}", INDENT, NO_SAMPLES);
    }
    if let PeriodLength::Bounded(_) = period.length {
        writeln!(out, "{}Coverage: {}", INDENT, format_ratio(period.coverage))?;
    }
    writeln!(out, "{}Uptime:   {}", INDENT, format_ratio(period.uptime))
}

/// Print the human-readable statistics report.
pub fn write_stats<W: Write>(out: &mut W, report: &StatsReport) -> Result<()> {
    writeln!(out, "Record count: {}", report.record_count)?;
    for period in &report.periods {
        write_period(out, period)?;
    }
    Ok(())
}

/// Print the statistics report as pretty JSON.
pub fn write_stats_json<W: Write>(out: &mut W, report: &StatsReport) -> Result<()> {
    writeln!(out, "{}", report.to_json()?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectivity::{Period, compute_stats};
    use std::time::Duration;

    fn render(report: &StatsReport) -> String {
        let mut out = Vec::new();
        write_stats(&mut out, report).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(1.0), "100.00000%");
        assert_eq!(format_percentage(1.0 / 3.0), " 33.33333%");
        assert_eq!(format_percentage(0.0), "  0.00000%");
        // Wider values are not truncated.
        assert_eq!(format_percentage(12.5), "1250.00000%");
    }

    #[test]
    fn test_stats_text_layout() {
        let records = vec![
            Record::with_response(0, 200, Some(Duration::from_micros(1000))),
            Record::new(30),
            Record::with_response(60, 500, Some(Duration::from_micros(2000))),
        ];
        let periods = [Period::bounded("Window", 90), Period::unbounded("All time")];
        let report = compute_stats(&records, &periods, 90, Duration::from_secs(30));

        assert_eq!(
            render(&report),
            "Record count: 3\n\
             Window\n  Coverage: 100.00000%\n  Uptime:    33.33333%\n\
             All time\n  Uptime:    33.33333%\n"
        );
    }

    #[test]
    fn test_stats_without_samples() {
        let periods = [Period::bounded("Last hour", 3600)];
        let report = compute_stats(&[], &periods, 1_000_000, Duration::from_secs(30));

        assert_eq!(render(&report), "Record count: 0\nLast hour\n  No samples\n");
    }

    #[test]
    fn test_coverage_without_expected_samples() {
        // A window shorter than the cadence expects no samples.
        let periods = [Period::bounded("Short", 10)];
        let report = compute_stats(&[Record::with_response(95, 200, None)], &periods, 100, Duration::from_secs(30));

        let text = render(&report);
        assert!(text.contains("  Coverage: No samples\n"), "{}", text);
        assert!(text.contains("  Uptime:   100.00000%\n"), "{}", text);
    }

    #[test]
    fn test_dump_json_lines() {
        let records = vec![
            Record::with_response(0, 204, Some(Duration::from_micros(15))),
            Record::new(60),
        ];
        let mut out = Vec::new();
        write_dump_json(&mut out, &records).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["timestamp"], "1970-01-01T00:00:00Z");
        assert_eq!(first["status_code"], 204);
        assert_eq!(first["elapsed_us"], 15);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert!(second["status_code"].is_null());
    }

    #[tokio::test]
    async fn test_unreadable_log_reports_empty() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be read as a file.
        let log = AppendLog::new(dir.path());
        assert!(load_records(&log).await.unwrap().is_empty());
    }
}
