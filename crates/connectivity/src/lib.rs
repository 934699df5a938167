//! Connectivity probing and availability statistics.
//!
//! This crate holds the moving parts of the connectivity monitor:
//! - a record codec for the line-oriented probe log
//! - a probe executor issuing one HTTP GET per probe
//! - an append-only log with crash-tolerant replay
//! - a drift-corrected scheduler launching probes at a fixed cadence
//! - a window aggregator computing coverage and uptime per period
//!
//! # Example
//!
//! ```no_run
//! use connectivity::{AppendLog, PERIODS, compute_stats};
//! use std::time::Duration;
//!
//! # async fn example() -> common::Result<()> {
//! let log = AppendLog::new("probe.log");
//! let records = log.replay_all().await?;
//! let now = chrono::Utc::now().timestamp();
//! let report = compute_stats(&records, &PERIODS, now, Duration::from_secs(30));
//!
//! for period in &report.periods {
//!     println!("{}: {:?}", period.name, period.uptime);
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod executor;
pub mod log;
pub mod scheduler;
pub mod stats;
pub mod types;

pub use executor::{ProbeExecutor, ReqwestTransport, Transport, TransportError};
pub use log::{AppendLog, MalformedLinePolicy};
pub use scheduler::{Clock, Launch, Launcher, RunSummary, Scheduler, SchedulerConfig, SchedulerState, SystemClock};
pub use stats::{PeriodStats, StatsReport, compute_stats};
pub use types::{PERIODS, Period, PeriodLength, Record, UnixTime};
