//! Prometheus metrics for the probe loop.

use connectivity::Record;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::time::Duration;

/// Labels for probe result metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    /// Outcome (success, failure, no_response)
    pub outcome: String,
}

/// Classify a record for the outcome label.
pub fn outcome(record: &Record) -> &'static str {
    match record.status_code() {
        Some(_) if record.is_success() => "success",
        Some(_) => "failure",
        None => "no_response",
    }
}

/// Metrics registry with all probe loop metrics
pub struct MetricsRegistry {
    /// Prometheus registry
    pub registry: Registry,

    /// Probes launched by the scheduler
    probes_launched_total: Counter,
    /// Launches skipped because the in-flight cap was reached
    probes_skipped_total: Counter,
    /// Probe results by outcome
    probe_results_total: Family<OutcomeLabels, Counter>,
    /// Probes currently running
    probes_in_flight: Gauge,
    /// Wall time of completed probes
    probe_duration_seconds: Histogram,
    /// Delay between the nominal and actual launch instant
    launch_lateness_seconds: Histogram,
    /// Records that could not be appended to the log
    log_append_errors_total: Counter,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    /// Create a new metrics registry
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let probes_launched_total = Counter::default();
        registry.register(
            "connectivity_probes_launched",
            "Total probes launched",
            probes_launched_total.clone(),
        );

        let probes_skipped_total = Counter::default();
        registry.register(
            "connectivity_probes_skipped",
            "Launches skipped because too many probes were in flight",
            probes_skipped_total.clone(),
        );

        let probe_results_total = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "connectivity_probe_results",
            "Completed probes by outcome",
            probe_results_total.clone(),
        );

        let probes_in_flight = Gauge::default();
        registry.register(
            "connectivity_probes_in_flight",
            "Probes currently running",
            probes_in_flight.clone(),
        );

        // Exponential buckets from 1ms to ~16s
        let probe_duration_seconds = Histogram::new(exponential_buckets(0.001, 2.0, 15));
        registry.register(
            "connectivity_probe_duration_seconds",
            "Probe wall time in seconds",
            probe_duration_seconds.clone(),
        );

        // Exponential buckets from 100us to ~200ms
        let launch_lateness_seconds = Histogram::new(exponential_buckets(0.0001, 2.0, 12));
        registry.register(
            "connectivity_launch_lateness_seconds",
            "Delay between nominal and actual probe launch in seconds",
            launch_lateness_seconds.clone(),
        );

        let log_append_errors_total = Counter::default();
        registry.register(
            "connectivity_log_append_errors",
            "Records that could not be appended to the log",
            log_append_errors_total.clone(),
        );

        Self {
            registry,
            probes_launched_total,
            probes_skipped_total,
            probe_results_total,
            probes_in_flight,
            probe_duration_seconds,
            launch_lateness_seconds,
            log_append_errors_total,
        }
    }

    /// Record a probe launch
    pub fn record_launch(&self, lateness: Duration) {
        self.probes_launched_total.inc();
        self.probes_in_flight.inc();
        self.launch_lateness_seconds.observe(lateness.as_secs_f64());
    }

    /// Record a skipped launch
    pub fn record_skip(&self) {
        self.probes_skipped_total.inc();
    }

    /// Record a finished probe
    pub fn record_result(&self, record: &Record, duration: Duration) {
        self.probes_in_flight.dec();
        self.probe_results_total
            .get_or_create(&OutcomeLabels {
                outcome: outcome(record).to_string(),
            })
            .inc();
        self.probe_duration_seconds.observe(duration.as_secs_f64());
    }

    /// Record a failed log append
    pub fn record_append_error(&self) {
        self.log_append_errors_total.inc();
    }

    /// Encode all metrics in the Prometheus text format
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome(&Record::with_response(0, 200, None)), "success");
        assert_eq!(outcome(&Record::with_response(0, 302, None)), "success");
        assert_eq!(outcome(&Record::with_response(0, 500, None)), "failure");
        assert_eq!(outcome(&Record::new(0)), "no_response");
    }

    #[test]
    fn test_launch_and_result_counts() {
        let registry = MetricsRegistry::new();

        registry.record_launch(Duration::from_micros(300));
        registry.record_launch(Duration::from_micros(500));
        registry.record_result(&Record::with_response(0, 200, None), Duration::from_millis(40));

        let text = registry.encode().unwrap();
        assert!(text.contains("connectivity_probes_launched_total 2"), "{}", text);
        assert!(text.contains("connectivity_probes_in_flight 1"), "{}", text);
        assert!(
            text.contains("connectivity_probe_results_total{outcome=\"success\"} 1"),
            "{}",
            text
        );
    }

    #[test]
    fn test_skip_and_append_errors() {
        let registry = MetricsRegistry::new();

        registry.record_skip();
        registry.record_append_error();
        registry.record_append_error();

        let text = registry.encode().unwrap();
        assert!(text.contains("connectivity_probes_skipped_total 1"), "{}", text);
        assert!(text.contains("connectivity_log_append_errors_total 2"), "{}", text);
    }
}
