//! Probe record and reporting period types.

use serde::Serialize;
use std::time::Duration;

/// Seconds since the Unix epoch (UTC).
pub type UnixTime = i64;

/// Lowest status code counted as a success (informational).
pub const FIRST_SUCCESS_CODE: u16 = 100;

/// Highest status code counted as a success (redirection).
pub const LAST_SUCCESS_CODE: u16 = 399;

/// Default nominal spacing between probe launches.
pub const DEFAULT_CADENCE: Duration = Duration::from_secs(30);

/// Default per-probe timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

const HOUR_SECONDS: u64 = 60 * 60;
const DAY_SECONDS: u64 = 24 * HOUR_SECONDS;

/// One probe observation.
///
/// The latency is only ever present together with a status code, so the
/// fields are private and the constructors enforce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Record {
    timestamp: UnixTime,
    status_code: Option<u16>,
    elapsed: Option<Duration>,
}

impl Record {
    /// Create a record for a probe that got no response at all.
    pub fn new(timestamp: UnixTime) -> Self {
        Self {
            timestamp,
            status_code: None,
            elapsed: None,
        }
    }

    /// Create a record for a probe that obtained a status code.
    ///
    /// The latency is truncated to whole microseconds, the resolution of the
    /// log format.
    pub fn with_response(timestamp: UnixTime, status_code: u16, elapsed: Option<Duration>) -> Self {
        Self {
            timestamp,
            status_code: Some(status_code),
            elapsed: elapsed.map(|d| Duration::from_micros(d.as_micros() as u64)),
        }
    }

    pub fn timestamp(&self) -> UnixTime {
        self.timestamp
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Round-trip latency.
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    /// Whether the response fell into the informational/success/redirect range.
    pub fn is_success(&self) -> bool {
        self.status_code
            .is_some_and(|code| (FIRST_SUCCESS_CODE..=LAST_SUCCESS_CODE).contains(&code))
    }
}

/// Length of a reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodLength {
    /// Rolling window of the given number of seconds ending at "now"
    Bounded(u64),
    /// Every record ever written
    Unbounded,
}

/// A named rolling statistics window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Period {
    pub name: &'static str,
    pub length: PeriodLength,
}

impl Period {
    pub const fn bounded(name: &'static str, seconds: u64) -> Self {
        Self {
            name,
            length: PeriodLength::Bounded(seconds),
        }
    }

    pub const fn unbounded(name: &'static str) -> Self {
        Self {
            name,
            length: PeriodLength::Unbounded,
        }
    }
}

/// The fixed set of windows reported by `--stats`.
pub const PERIODS: [Period; 6] = [
    Period::bounded("Last hour", HOUR_SECONDS),
    Period::bounded("Last 4 hours", 4 * HOUR_SECONDS),
    Period::bounded("Last day", DAY_SECONDS),
    Period::bounded("Last week", 7 * DAY_SECONDS),
    Period::bounded("Last 30 days", 30 * DAY_SECONDS),
    Period::unbounded("All time"),
];
