//! Operator control channel for a running monitor.
//!
//! Lines typed on stdin are forwarded over a channel; the word `stop` (ignoring
//! surrounding whitespace) cancels the monitor. Ctrl-C cancels it as well.

use std::io::BufRead;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Keyword that stops monitoring.
pub const STOP_COMMAND: &str = "stop";

const PROMPT: &str = "> ";

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Stop,
    Unrecognized(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed == STOP_COMMAND {
            Command::Stop
        } else {
            Command::Unrecognized(trimmed.to_string())
        }
    }
}

/// Forward stdin lines from a detached thread.
///
/// A blocking stdin read cannot be cancelled, so it runs on a plain thread
/// that the process may exit without joining.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);

    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read control input");
                    break;
                }
            }
        }
    });

    rx
}

/// Handle operator commands until `stop` arrives or `cancel` fires elsewhere.
///
/// When the input closes, monitoring continues; only Ctrl-C can stop it then.
pub async fn handle_commands<W>(
    mut lines: mpsc::Receiver<String>,
    mut output: W,
    cancel: CancellationToken,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    output
        .write_all(format!("Enter \"{}\" to stop monitoring.\n{}", STOP_COMMAND, PROMPT).as_bytes())
        .await?;
    output.flush().await?;

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            line = lines.recv() => line,
        };

        match line.as_deref().map(Command::parse) {
            Some(Command::Stop) => {
                info!("Stop requested by operator");
                cancel.cancel();
                return Ok(());
            }
            Some(Command::Unrecognized(text)) => {
                debug!(input = %text, "Rejected operator input");
                output
                    .write_all(format!("Unrecognized command.\n{}", PROMPT).as_bytes())
                    .await?;
                output.flush().await?;
            }
            None => {
                info!("Control input closed, press Ctrl-C to stop monitoring");
                return Ok(());
            }
        }
    }
}

/// Cancel on Ctrl-C.
pub async fn stop_on_ctrl_c(cancel: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => {
                info!("Interrupt received, stopping");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        },
        _ = cancel.cancelled() => {}
    }
}
