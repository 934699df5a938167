//! Command line arguments.

use clap::{ArgGroup, Parser};
use std::path::PathBuf;

/// Probe an HTTP endpoint at a fixed cadence and report availability.
#[derive(Debug, Parser)]
#[command(name = "connectivity-monitor", version)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args(["dump", "stats", "monitor"]),
))]
pub struct Args {
    /// Probe log file.
    pub logfile: PathBuf,

    /// Print every record in the log.
    #[arg(long)]
    pub dump: bool,

    /// Print coverage and uptime for each reporting period.
    #[arg(long)]
    pub stats: bool,

    /// Probe URL until "stop" is entered, appending to the log.
    #[arg(long, value_name = "URL")]
    pub monitor: Option<String>,

    /// Configuration file (YAML).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print --dump and --stats output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// What to do with the log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Dump,
    Stats,
    Monitor(String),
}

impl Args {
    pub fn action(&self) -> Action {
        match &self.monitor {
            Some(url) => Action::Monitor(url.clone()),
            None if self.dump => Action::Dump,
            None => Action::Stats,
        }
    }
}
