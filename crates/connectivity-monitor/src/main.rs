//! Connectivity monitor binary

use clap::Parser;
use connectivity::{AppendLog, PERIODS, compute_stats};
use connectivity_monitor::{Action, Args, Config, report, run_monitor};
use std::io::Write;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logging is not initialized yet, so configuration errors go to stderr directly
    let config_path = Config::resolve_path(args.config.as_deref());
    let config = match Config::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let log_level = config.logging.level.as_deref().unwrap_or("info");
    match config.logging.format.as_deref() {
        Some("json") => common::logging::init_json(log_level),
        _ => common::logging::init(log_level),
    }

    match &config_path {
        Some(path) => tracing::info!("Loaded configuration from: {}", path.display()),
        None => tracing::debug!("No configuration file found, using defaults"),
    }

    let log = AppendLog::new(&args.logfile).with_policy(config.malformed_line_policy());
    let stdout = std::io::stdout();

    match args.action() {
        Action::Dump => {
            let records = report::load_records(&log).await?;
            let mut out = stdout.lock();
            if args.json {
                report::write_dump_json(&mut out, &records)?;
            } else {
                report::write_dump(&mut out, &records)?;
            }
            out.flush()?;
        }
        Action::Stats => {
            let records = report::load_records(&log).await?;
            let now = chrono::Utc::now().timestamp();
            let stats = compute_stats(&records, &PERIODS, now, config.probe.cadence);
            let mut out = stdout.lock();
            if args.json {
                report::write_stats_json(&mut out, &stats)?;
            } else {
                report::write_stats(&mut out, &stats)?;
            }
            out.flush()?;
        }
        Action::Monitor(url) => {
            run_monitor(&config, &args.logfile, &url).await?;
        }
    }

    Ok(())
}
