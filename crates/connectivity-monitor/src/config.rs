//! Configuration loading and validation for the connectivity monitor

use connectivity::{MalformedLinePolicy, SchedulerConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub probe: ProbeSettings,

    #[serde(default)]
    pub scheduler: SchedulerSettings,

    #[serde(default)]
    pub log: LogSettings,

    #[serde(default)]
    pub metrics: MetricsSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        self.probe.validate()?;
        self.scheduler.validate()?;
        self.metrics.validate()?;
        Ok(())
    }
}

/// Probe settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ProbeSettings {
    /// Nominal spacing between probe launches
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_cadence")]
    pub cadence: Duration,

    /// Per-probe request timeout
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_timeout")]
    pub timeout: Duration,

    #[validate(length(min = 1))]
    pub user_agent: String,
}

/// Scheduler loop tuning
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Remaining time below which the loop busy-waits
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_precision")]
    pub precision: Duration,

    /// Longest single sleep, which bounds how long a stop request waits
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_max_sleep")]
    pub max_sleep: Duration,

    /// Cap on concurrently running probes (unbounded when unset)
    #[validate(range(min = 1, max = 10000))]
    pub max_in_flight: Option<usize>,
}

/// Probe log settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Skip malformed interior lines instead of failing the read
    pub skip_malformed: bool,
}

/// Prometheus endpoint settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MetricsSettings {
    /// Address for the `/metrics` endpoint while monitoring; disabled when unset
    #[validate(custom = "validate_listen_addr")]
    pub listen_addr: Option<String>,
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
}

// Default implementations

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            cadence: connectivity::types::DEFAULT_CADENCE,
            timeout: connectivity::types::DEFAULT_TIMEOUT,
            user_agent: format!("connectivity-monitor/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            precision: connectivity::scheduler::DEFAULT_PRECISION,
            max_sleep: connectivity::scheduler::DEFAULT_MAX_SLEEP,
            max_in_flight: None,
        }
    }
}

// Custom validators

fn validate_cadence(cadence: &Duration) -> Result<(), ValidationError> {
    if cadence.subsec_nanos() != 0 {
        return Err(ValidationError::new("cadence_not_whole_seconds"));
    }
    let secs = cadence.as_secs();
    if secs < 1 || secs > 86_400 {
        return Err(ValidationError::new("cadence_out_of_range"));
    }
    Ok(())
}

fn validate_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    if timeout.is_zero() || *timeout > Duration::from_secs(600) {
        return Err(ValidationError::new("timeout_out_of_range"));
    }
    Ok(())
}

fn validate_precision(precision: &Duration) -> Result<(), ValidationError> {
    if *precision > Duration::from_secs(1) {
        return Err(ValidationError::new("precision_out_of_range"));
    }
    Ok(())
}

fn validate_max_sleep(max_sleep: &Duration) -> Result<(), ValidationError> {
    let millis = max_sleep.as_millis();
    if millis < 1 || millis > 1_000 {
        return Err(ValidationError::new("max_sleep_out_of_range"));
    }
    Ok(())
}

fn validate_listen_addr(addr: &str) -> Result<(), ValidationError> {
    addr.parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("listen_addr_invalid"))
}

// Configuration loading implementation

impl Config {
    /// Load configuration from an explicit file, or from the default search paths
    ///
    /// Runs before logging is initialized, so it does not log.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match Self::resolve_path(explicit) {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// The file `load` reads: `explicit` if given, else the first existing default path
    pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_config_file(),
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/connectivity-monitor/config.yaml")];

        if let Some(home_path) = Self::home_config_path() {
            paths.push(home_path);
        }

        paths.push(PathBuf::from("./connectivity-monitor.yaml"));

        paths.into_iter().find(|p: &PathBuf| p.exists() && p.is_file())
    }

    /// Get home directory config path
    fn home_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/connectivity-monitor/config.yaml"))
    }

    /// Convert to the scheduler's timing configuration
    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            cadence: self.probe.cadence,
            precision: self.scheduler.precision,
            max_sleep: self.scheduler.max_sleep,
            max_in_flight: self.scheduler.max_in_flight,
        }
    }

    /// Replay policy for interior malformed log lines
    pub fn malformed_line_policy(&self) -> MalformedLinePolicy {
        if self.log.skip_malformed {
            MalformedLinePolicy::Skip
        } else {
            MalformedLinePolicy::Strict
        }
    }
}
