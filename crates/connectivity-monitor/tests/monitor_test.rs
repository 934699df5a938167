//! Integration tests for the probe launcher against a local HTTP server

use axum::{Router, http::StatusCode, routing::get};
use connectivity::{AppendLog, Launch, Launcher, ProbeExecutor, ReqwestTransport};
use connectivity_monitor::ProbeLauncher;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

/// Helper to serve a fixed status on 127.0.0.1 and return the base URL
async fn serve(status: StatusCode) -> String {
    let app = Router::new()
        .route("/", get(move || async move { status }))
        .route("/slow", get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::OK
        }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn launch(tick: u64) -> Launch {
    Launch {
        tick,
        target: Instant::now(),
        lateness: Duration::ZERO,
        permit: None,
    }
}

fn launcher(url: String, log: Arc<AppendLog>, timeout: Duration) -> ProbeLauncher {
    let transport = Arc::new(ReqwestTransport::new("connectivity-monitor-test").unwrap());
    let executor = ProbeExecutor::new(transport, timeout).unwrap();
    ProbeLauncher::new(url, executor, log, None)
}

#[tokio::test]
async fn test_probe_records_status_and_latency() {
    let base = serve(StatusCode::NO_CONTENT).await;
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(AppendLog::open(dir.path().join("probe.log")).await.unwrap());

    let launcher = launcher(format!("{}/", base), log.clone(), Duration::from_secs(5));
    launcher.launch(launch(0));
    assert!(launcher.drain(Duration::from_secs(10)).await);

    let records = log.replay_all().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status_code(), Some(204));
    assert!(records[0].elapsed().is_some());
    assert!(records[0].is_success());
}

#[tokio::test]
async fn test_server_error_is_recorded_as_failure() {
    let base = serve(StatusCode::SERVICE_UNAVAILABLE).await;
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(AppendLog::open(dir.path().join("probe.log")).await.unwrap());

    let launcher = launcher(format!("{}/", base), log.clone(), Duration::from_secs(5));
    launcher.launch(launch(0));
    assert!(launcher.drain(Duration::from_secs(10)).await);

    let records = log.replay_all().await.unwrap();
    assert_eq!(records[0].status_code(), Some(503));
    assert!(!records[0].is_success());
}

#[tokio::test]
async fn test_timeout_records_only_timestamp() {
    let base = serve(StatusCode::OK).await;
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(AppendLog::open(dir.path().join("probe.log")).await.unwrap());

    let launcher = launcher(format!("{}/slow", base), log.clone(), Duration::from_millis(200));
    let started = Instant::now();
    launcher.launch(launch(0));
    assert!(launcher.drain(Duration::from_secs(3)).await);
    assert!(started.elapsed() < Duration::from_secs(3));

    let records = log.replay_all().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status_code(), None);
    assert_eq!(records[0].elapsed(), None);
}

#[tokio::test]
async fn test_overlapping_probes_write_whole_lines() {
    let base = serve(StatusCode::OK).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("probe.log");
    let log = Arc::new(AppendLog::open(&path).await.unwrap());

    let launcher = launcher(format!("{}/", base), log.clone(), Duration::from_secs(5));
    for tick in 0..20 {
        launcher.launch(launch(tick));
    }
    assert!(launcher.drain(Duration::from_secs(10)).await);

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 20);
    assert_eq!(log.replay_all().await.unwrap().len(), 20);
}
