//! Probe execution: one HTTP GET against the target, turned into a record.

use crate::types::Record;
use async_trait::async_trait;
use chrono::Utc;
use common::{Error, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error as ThisError;
use tokio::time::timeout;
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

/// Failure reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum TransportError {
    /// The request went out but did not complete. A status code is present
    /// when the response head arrived before the failure.
    #[error("request failed: {message}")]
    Failed {
        status: Option<u16>,
        message: String,
    },

    /// The transport gave up after its own timeout.
    #[error("request timed out")]
    TimedOut,

    /// The request could not be built (bad URL, unsupported scheme).
    #[error("invalid request: {0}")]
    Usage(String),
}

impl TransportError {
    /// Status code carried by the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Failed { status, .. } => *status,
            TransportError::TimedOut | TransportError::Usage(_) => None,
        }
    }
}

/// Performs one GET request and reports the response status.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue the request, giving up after `timeout`.
    async fn perform(&self, url: &str, timeout: Duration) -> std::result::Result<u16, TransportError>;
}

/// Transport backed by a shared `reqwest` client.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport sending the given user agent.
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_builder() {
        TransportError::Usage(error.to_string())
    } else if error.is_timeout() {
        TransportError::TimedOut
    } else {
        TransportError::Failed {
            status: error.status().map(|s| s.as_u16()),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn perform(&self, url: &str, timeout: Duration) -> std::result::Result<u16, TransportError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;
        let status = response.status().as_u16();

        // Download the body so the measured latency covers the whole exchange.
        match response.bytes().await {
            Ok(_) => Ok(status),
            Err(e) => Err(TransportError::Failed {
                status: Some(status),
                message: e.to_string(),
            }),
        }
    }
}

/// Runs single probes against a target and produces records.
///
/// The executor never persists anything; callers append the record.
#[derive(Clone)]
pub struct ProbeExecutor {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl ProbeExecutor {
    /// Create an executor. The timeout must be strictly positive.
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Result<Self> {
        if timeout.is_zero() {
            return Err(Error::config("probe timeout must be strictly positive"));
        }

        Ok(Self { transport, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe `url` once. Never fails: every outcome becomes a record.
    pub async fn probe(&self, url: &str) -> Record {
        let timestamp = Utc::now().timestamp();
        let start = Instant::now();

        let outcome = timeout(self.timeout, self.transport.perform(url, self.timeout)).await;
        let elapsed = start.elapsed();

        match outcome {
            Ok(Ok(code)) => {
                debug!(url, status = code, elapsed_us = elapsed.as_micros() as u64, "Probe completed");
                Record::with_response(timestamp, code, Some(elapsed))
            }
            Ok(Err(TransportError::Usage(message))) => {
                warn!(url, error = %message, "Probe request could not be issued");
                Record::new(timestamp)
            }
            Ok(Err(e)) => match e.status() {
                Some(code) => {
                    warn!(url, status = code, error = %e, "Probe failed after response");
                    Record::with_response(timestamp, code, Some(elapsed))
                }
                None => {
                    warn!(url, error = %e, "Probe failed");
                    Record::new(timestamp)
                }
            },
            Err(_) => {
                warn!(url, timeout_ms = self.timeout.as_millis() as u64, "Probe timed out");
                Record::new(timestamp)
            }
        }
    }
}
