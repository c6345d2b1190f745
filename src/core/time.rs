//! Shared timestamp and identifier helpers.
//!
//! Identifiers are ULIDs: 128 bits, millisecond timestamp prefix, rendered as
//! 26 Crockford base32 characters so that lexicographic order is creation order.

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use ulid::{Generator, Ulid};

use crate::core::error::{CupboardError, Result};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Returns a timestamp strictly after `previous`, normally the wall clock.
pub fn advance(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + TimeDelta::nanoseconds(1)
    }
}

/// Fixed-width RFC3339 rendering used for row-store columns, so that text
/// ordering matches time ordering.
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| CupboardError::InvalidData(format!("bad timestamp '{}': {}", raw, e)))
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

pub fn is_valid_id(id: &str) -> bool {
    Ulid::from_string(id).is_ok()
}

/// Monotonic identifier source owned by one attached cupboard.
///
/// IDs minted within the same millisecond increment the random part, so they
/// still sort in mint order.
pub struct IdGenerator {
    inner: Generator,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            inner: Generator::new(),
        }
    }

    pub fn mint(&mut self) -> String {
        match self.inner.generate() {
            Ok(id) => id.to_string(),
            // Random part overflowed within one millisecond.
            Err(_) => Ulid::new().to_string(),
        }
    }
}
