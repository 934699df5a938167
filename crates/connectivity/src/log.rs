//! Append-only record log.
//!
//! Every append opens the file in append mode, writes one complete line in
//! a single write and syncs it before returning. Readers replay the whole
//! file; a trailing line cut short by a crash is skipped.

use crate::codec;
use crate::types::Record;
use common::{Error, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::io::SeekFrom;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// How replay treats a malformed line that is not the last line of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedLinePolicy {
    /// Fail the replay
    #[default]
    Strict,
    /// Log a warning and skip the line
    Skip,
}

/// Append-only probe log backed by a text file.
#[derive(Debug)]
pub struct AppendLog {
    path: PathBuf,
    policy: MalformedLinePolicy,
    write_lock: Mutex<()>,
}

impl AppendLog {
    /// Create a handle without touching the file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            policy: MalformedLinePolicy::default(),
            write_lock: Mutex::new(()),
        }
    }

    /// Create a handle and verify the file can be opened for appending.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let log = Self::new(path);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log.path)
            .await?;
        Ok(log)
    }

    /// Set the replay policy for interior malformed lines.
    pub fn with_policy(mut self, policy: MalformedLinePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably append one record.
    ///
    /// If the file ends in a torn line, the record starts on a fresh line so
    /// the fragment stays separate.
    pub async fn append(&self, record: &Record) -> Result<()> {
        let encoded = codec::encode(record)?;

        // Serialize in-process writers; O_APPEND covers other processes.
        let _guard = self.write_lock.lock().await;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await?;

        let mut line = String::with_capacity(encoded.len() + 2);
        if ends_mid_line(&mut file).await? {
            warn!(path = %self.path.display(), "Log ends in a torn line, starting a new line");
            line.push('\n');
        }
        line.push_str(&encoded);
        line.push('\n');

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        file.sync_data().await?;

        Ok(())
    }

    /// Read every well-formed record in file order.
    ///
    /// A missing file replays as empty.
    pub async fn replay_all(&self) -> Result<Vec<Record>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Log file does not exist yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        parse_records(&String::from_utf8_lossy(&bytes), self.policy)
    }
}

/// Decode the contents of a log file.
///
/// Appends always end in a newline, so text after the last newline is a torn
/// write and is dropped even when it would decode.
pub fn parse_records(contents: &str, policy: MalformedLinePolicy) -> Result<Vec<Record>> {
    let complete = match contents.rfind('\n') {
        Some(end) => &contents[..=end],
        None => "",
    };
    if complete.len() < contents.len() {
        debug!(bytes = contents.len() - complete.len(), "Skipping unterminated trailing line");
    }

    let lines: Vec<&str> = complete.lines().collect();
    let last = lines.iter().rposition(|line| !line.trim().is_empty());

    let mut records = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        match codec::decode(line) {
            Ok(record) => records.push(record),
            Err(e) if Some(index) == last => {
                debug!(line = index + 1, error = %e, "Skipping truncated trailing line");
            }
            Err(e) => match policy {
                MalformedLinePolicy::Strict => return Err(at_line(e, index + 1)),
                MalformedLinePolicy::Skip => {
                    warn!(line = index + 1, error = %e, "Skipping malformed line");
                }
            },
        }
    }

    Ok(records)
}

async fn ends_mid_line(file: &mut File) -> Result<bool> {
    if file.metadata().await?.len() == 0 {
        return Ok(false);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1)).await?;
    file.read_exact(&mut last).await?;
    Ok(last[0] != b'\n')
}

fn at_line(error: Error, line: usize) -> Error {
    match error {
        Error::MalformedRecord(msg) => Error::malformed(format!("line {}: {}", line, msg)),
        other => other,
    }
}
