//! Windowed coverage and uptime statistics.
//!
//! Aggregation is a pure function of the records, the periods, "now" and the
//! cadence. Records are filtered by timestamp value, never by position, so
//! the log does not need to be ordered.

use crate::types::{Period, PeriodLength, Record, UnixTime};
use common::Result;
use serde::Serialize;
use std::time::Duration;

/// Statistics for one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodStats {
    pub name: &'static str,
    pub length: PeriodLength,
    /// Records with a timestamp inside the window
    pub sample_count: u64,
    /// Records inside the window with a success status
    pub successes: u64,
    /// Samples the cadence would produce over the window; `None` when unbounded
    pub expected_samples: Option<u64>,
    /// `sample_count / expected_samples`; `None` when there is nothing to report
    pub coverage: Option<f64>,
    /// `successes / sample_count`; `None` when there are no samples
    pub uptime: Option<f64>,
}

impl PeriodStats {
    pub fn has_samples(&self) -> bool {
        self.sample_count > 0
    }
}

/// Statistics for every configured period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub now: UnixTime,
    pub record_count: u64,
    pub periods: Vec<PeriodStats>,
}

impl StatsReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn expected_samples(seconds: u64, cadence: Duration) -> u64 {
    let cadence_ns = cadence.as_nanos();
    if cadence_ns == 0 {
        return 0;
    }
    let samples = u128::from(seconds) * 1_000_000_000 / cadence_ns;
    u64::try_from(samples).unwrap_or(u64::MAX)
}

fn ratio(numerator: u64, denominator: u64) -> Option<f64> {
    if numerator == 0 || denominator == 0 {
        return None;
    }
    Some(numerator as f64 / denominator as f64)
}

fn period_stats(records: &[Record], period: &Period, now: UnixTime, cadence: Duration) -> PeriodStats {
    let window_start = match period.length {
        PeriodLength::Bounded(seconds) => now.saturating_sub(i64::try_from(seconds).unwrap_or(i64::MAX)),
        PeriodLength::Unbounded => UnixTime::MIN,
    };

    let (sample_count, successes) = records
        .iter()
        .filter(|record| record.timestamp() >= window_start)
        .fold((0u64, 0u64), |(samples, successes), record| {
            (samples + 1, successes + u64::from(record.is_success()))
        });

    let expected = match period.length {
        PeriodLength::Bounded(seconds) => Some(expected_samples(seconds, cadence)),
        PeriodLength::Unbounded => None,
    };

    PeriodStats {
        name: period.name,
        length: period.length,
        sample_count,
        successes,
        expected_samples: expected,
        coverage: expected.and_then(|expected| ratio(sample_count, expected)),
        uptime: if sample_count == 0 {
            None
        } else {
            Some(successes as f64 / sample_count as f64)
        },
    }
}

/// Compute coverage and uptime for each period.
pub fn compute_stats(records: &[Record], periods: &[Period], now: UnixTime, cadence: Duration) -> StatsReport {
    StatsReport {
        now,
        record_count: records.len() as u64,
        periods: periods
            .iter()
            .map(|period| period_stats(records, period, now, cadence))
            .collect(),
    }
}
