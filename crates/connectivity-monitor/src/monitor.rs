//! `--monitor` mode: probe a target at a fixed cadence and append every
//! outcome to the log.

use crate::config::Config;
use crate::control;
use crate::http_server::MetricsServer;
use crate::metrics::MetricsRegistry;
use common::{Error, Result};
use connectivity::{
    AppendLog, Launch, Launcher, ProbeExecutor, ReqwestTransport, RunSummary, Scheduler, Transport,
};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Launches one detached probe task per tick.
///
/// Each task runs the probe, appends the record and releases its in-flight
/// slot. Append failures are logged and counted; they never reach the
/// scheduler.
pub struct ProbeLauncher {
    url: Arc<str>,
    executor: ProbeExecutor,
    log: Arc<AppendLog>,
    metrics: Option<Arc<MetricsRegistry>>,
    tasks: TaskTracker,
}

impl ProbeLauncher {
    pub fn new(
        url: impl Into<Arc<str>>,
        executor: ProbeExecutor,
        log: Arc<AppendLog>,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        Self {
            url: url.into(),
            executor,
            log,
            metrics,
            tasks: TaskTracker::new(),
        }
    }

    /// Probes launched and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Wait up to `grace` for in-flight probes. Returns whether all finished.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.tasks.close();
        tokio::time::timeout(grace, self.tasks.wait()).await.is_ok()
    }
}

impl Launcher for ProbeLauncher {
    fn launch(&self, launch: Launch) {
        let url = self.url.clone();
        let executor = self.executor.clone();
        let log = self.log.clone();
        let metrics = self.metrics.clone();

        if let Some(metrics) = &metrics {
            metrics.record_launch(launch.lateness);
        }

        self.tasks.spawn(async move {
            // Released when the task ends.
            let _permit = launch.permit;

            let started = Instant::now();
            let record = executor.probe(&url).await;
            if let Some(metrics) = &metrics {
                metrics.record_result(&record, started.elapsed());
            }

            if let Err(e) = log.append(&record).await {
                error!(tick = launch.tick, path = %log.path().display(), error = %e, "Failed to append record");
                if let Some(metrics) = &metrics {
                    metrics.record_append_error();
                }
                return;
            }
            debug!(tick = launch.tick, status = ?record.status_code(), "Record appended");
        });
    }

    fn skipped(&self, _tick: u64) {
        if let Some(metrics) = &self.metrics {
            metrics.record_skip();
        }
    }
}

/// Run the probe loop against `url` until stopped from stdin or by Ctrl-C.
pub async fn run_monitor(config: &Config, log_path: &Path, url: &str) -> Result<RunSummary> {
    let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(&config.probe.user_agent)?);
    run_monitor_with(config, log_path, url, transport, control::spawn_stdin_reader).await
}

/// [`run_monitor`] with an injected transport and control input.
///
/// `commands` is only called once start-up checks have passed.
pub async fn run_monitor_with<F>(
    config: &Config,
    log_path: &Path,
    url: &str,
    transport: Arc<dyn Transport>,
    commands: F,
) -> Result<RunSummary>
where
    F: FnOnce() -> mpsc::Receiver<String>,
{
    if url.trim().is_empty() {
        return Err(Error::config("target URL must not be empty"));
    }

    let scheduler = Scheduler::new(config.to_scheduler_config())?;
    let executor = ProbeExecutor::new(transport, config.probe.timeout)?;
    let log = AppendLog::open(log_path)
        .await
        .map_err(|e| Error::config(format!("cannot append to {}: {}", log_path.display(), e)))?
        .with_policy(config.malformed_line_policy());

    println!(
        "Monitoring {} and updating {} every {} second(s).",
        url,
        log_path.display(),
        config.probe.cadence.as_secs()
    );
    println!(
        "Requests time-out after {} second(s).",
        config.probe.timeout.as_secs_f64()
    );

    let cancel = CancellationToken::new();

    let metrics = config
        .metrics
        .listen_addr
        .as_ref()
        .map(|addr| (Arc::new(MetricsRegistry::new()), addr.clone()));
    if let Some((registry, addr)) = &metrics {
        let server = MetricsServer::new(registry.clone(), addr.clone());
        let shutdown = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = server.run(shutdown).await {
                error!(error = %e, "Metrics server failed");
            }
        });
    }

    let launcher = ProbeLauncher::new(url, executor, Arc::new(log), metrics.map(|(registry, _)| registry));

    tokio::spawn(control::stop_on_ctrl_c(cancel.clone()));
    let control = {
        let commands = commands();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = control::handle_commands(commands, tokio::io::stdout(), cancel).await {
                warn!(error = %e, "Control channel failed");
            }
        })
    };

    info!(url, path = %log_path.display(), "Monitoring started");
    let summary = scheduler.run(&launcher, cancel.clone()).await;
    cancel.cancel();
    if let Err(e) = control.await {
        warn!(error = %e, "Control task failed");
    }

    let in_flight = launcher.in_flight();
    if in_flight > 0 && !launcher.drain(config.probe.timeout).await {
        warn!(in_flight, "Probes still running at exit, their records are lost");
    }

    info!(launched = summary.launched, skipped = summary.skipped, "Monitoring stopped");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use connectivity::TransportError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FixedTransport {
        status: u16,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for FixedTransport {
        async fn perform(&self, _url: &str, _timeout: Duration) -> std::result::Result<u16, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.status)
        }
    }

    fn launch(tick: u64) -> Launch {
        Launch {
            tick,
            target: Instant::now(),
            lateness: Duration::ZERO,
            permit: None,
        }
    }

    #[tokio::test]
    async fn test_launches_append_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.log");
        let transport = Arc::new(FixedTransport {
            status: 204,
            calls: AtomicUsize::new(0),
        });
        let executor = ProbeExecutor::new(transport.clone(), Duration::from_secs(1)).unwrap();
        let log = Arc::new(AppendLog::open(&path).await.unwrap());
        let metrics = Arc::new(MetricsRegistry::new());
        let launcher = ProbeLauncher::new("http://target/", executor, log.clone(), Some(metrics.clone()));

        launcher.launch(launch(0));
        launcher.launch(launch(1));
        launcher.skipped(2);
        assert!(launcher.drain(Duration::from_secs(5)).await);

        let records = log.replay_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.status_code() == Some(204)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);

        let text = metrics.encode().unwrap();
        assert!(text.contains("connectivity_probes_launched_total 2"), "{}", text);
        assert!(text.contains("connectivity_probes_skipped_total 1"), "{}", text);
        assert!(text.contains("connectivity_probes_in_flight 0"), "{}", text);
    }

    #[tokio::test]
    async fn test_append_failure_is_counted() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(FixedTransport {
            status: 200,
            calls: AtomicUsize::new(0),
        });
        let executor = ProbeExecutor::new(transport, Duration::from_secs(1)).unwrap();
        // Appending to a directory fails on every probe.
        let log = Arc::new(AppendLog::new(dir.path()));
        let metrics = Arc::new(MetricsRegistry::new());
        let launcher = ProbeLauncher::new("http://target/", executor, log, Some(metrics.clone()));

        launcher.launch(launch(0));
        assert!(launcher.drain(Duration::from_secs(5)).await);

        let text = metrics.encode().unwrap();
        assert!(text.contains("connectivity_log_append_errors_total 1"), "{}", text);
    }

    #[tokio::test]
    async fn test_monitor_stops_on_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.log");
        let mut config = Config::default();
        config.probe.cadence = Duration::from_secs(1);
        let transport = Arc::new(FixedTransport {
            status: 200,
            calls: AtomicUsize::new(0),
        });

        let (tx, rx) = mpsc::channel(1);
        let handle = {
            let path = path.clone();
            tokio::spawn(async move { run_monitor_with(&config, &path, "http://target/", transport, move || rx).await })
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send("stop".to_string()).await.unwrap();

        let summary = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("monitor did not stop")
            .unwrap()
            .unwrap();
        assert_eq!(summary.launched, 1);

        let records = AppendLog::new(&path).replay_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status_code(), Some(200));
    }

    #[tokio::test]
    async fn test_unwritable_log_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(FixedTransport {
            status: 200,
            calls: AtomicUsize::new(0),
        });
        let control_started = AtomicBool::new(false);

        let result = run_monitor_with(&Config::default(), dir.path(), "http://target/", transport.clone(), || {
            control_started.store(true, Ordering::SeqCst);
            mpsc::channel(1).1
        })
        .await;

        assert!(matches!(result, Err(Error::Config(_))));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert!(!control_started.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_empty_url_rejected_before_control_starts() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(FixedTransport {
            status: 200,
            calls: AtomicUsize::new(0),
        });
        let control_started = AtomicBool::new(false);

        let result = run_monitor_with(&Config::default(), &dir.path().join("probe.log"), " ", transport, || {
            control_started.store(true, Ordering::SeqCst);
            mpsc::channel(1).1
        })
        .await;

        assert!(matches!(result, Err(Error::Config(_))));
        assert!(!control_started.load(Ordering::SeqCst));
        assert!(!dir.path().join("probe.log").exists());
    }
}
