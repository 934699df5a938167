//! Textual log line encoding for probe records.
//!
//! A line is `<timestamp> [<status code> [<elapsed microseconds>]]` with the
//! timestamp written as a fixed-width ISO-8601 UTC instant, for example
//! `2024-03-01T12:00:30Z 200 15321`. Trailing fields are optional and only
//! meaningful in order.

use crate::types::{Record, UnixTime};
use chrono::{DateTime, NaiveDateTime, Utc};
use common::{Error, Result};
use std::time::Duration;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Width of an encoded timestamp (`1970-01-01T00:00:00Z`).
pub const TIMESTAMP_WIDTH: usize = 20;

/// Last instant representable with a four digit year (9999-12-31T23:59:59Z).
pub const MAX_TIMESTAMP: UnixTime = 253_402_300_799;

/// Format seconds since the epoch as a fixed-width UTC timestamp.
pub fn format_timestamp(timestamp: UnixTime) -> Result<String> {
    if !(0..=MAX_TIMESTAMP).contains(&timestamp) {
        return Err(Error::malformed(format!(
            "timestamp {} is outside the encodable range",
            timestamp
        )));
    }

    let instant = DateTime::<Utc>::from_timestamp(timestamp, 0).ok_or_else(|| {
        Error::malformed(format!("timestamp {} is not a valid instant", timestamp))
    })?;
    Ok(instant.format(TIMESTAMP_FORMAT).to_string())
}

/// Parse a fixed-width UTC timestamp back into seconds since the epoch.
pub fn parse_timestamp(text: &str) -> Result<UnixTime> {
    if text.len() != TIMESTAMP_WIDTH {
        return Err(Error::malformed(format!(
            "timestamp {:?} is not {} characters wide",
            text, TIMESTAMP_WIDTH
        )));
    }

    let naive = NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .map_err(|e| Error::malformed(format!("invalid timestamp {:?}: {}", text, e)))?;
    let timestamp = naive.and_utc().timestamp();

    if !(0..=MAX_TIMESTAMP).contains(&timestamp) {
        return Err(Error::malformed(format!("timestamp {:?} predates the epoch", text)));
    }
    Ok(timestamp)
}

/// Encode a record as one log line, without the trailing newline.
pub fn encode(record: &Record) -> Result<String> {
    let mut line = format_timestamp(record.timestamp())?;

    if let Some(code) = record.status_code() {
        line.push(' ');
        line.push_str(&code.to_string());

        if let Some(elapsed) = record.elapsed() {
            line.push(' ');
            line.push_str(&elapsed.as_micros().to_string());
        }
    }

    Ok(line)
}

/// Decode one log line.
///
/// Only the timestamp is mandatory. An unparsable status code is treated as
/// absent, and so is any latency that follows it.
pub fn decode(line: &str) -> Result<Record> {
    let mut fields = line.split_whitespace();

    let timestamp = match fields.next() {
        Some(field) => parse_timestamp(field)?,
        None => return Err(Error::malformed("missing timestamp")),
    };

    let Some(code) = fields.next().and_then(|field| field.parse::<u16>().ok()) else {
        return Ok(Record::new(timestamp));
    };

    let elapsed = fields
        .next()
        .and_then(|field| field.parse::<u64>().ok())
        .map(Duration::from_micros);

    Ok(Record::with_response(timestamp, code, elapsed))
}
