//! Connectivity monitor command line tool.
//!
//! Probes one HTTP endpoint at a fixed cadence, appends every outcome to a
//! line-oriented log, and reports coverage and uptime over that log.
//!
//! # Components
//!
//! - **Monitor**: runs the drift-corrected probe loop and writes records
//! - **Report**: renders `--dump` and `--stats` output
//! - **Control**: stops monitoring on `stop` from stdin or Ctrl-C
//! - **Metrics**: optional Prometheus endpoint for the probe loop

pub mod cli;
pub mod config;
pub mod control;
pub mod http_server;
pub mod metrics;
pub mod monitor;
pub mod report;

pub use cli::{Action, Args};
pub use config::{Config, ConfigError};
pub use http_server::MetricsServer;
pub use metrics::MetricsRegistry;
pub use monitor::{ProbeLauncher, run_monitor};
