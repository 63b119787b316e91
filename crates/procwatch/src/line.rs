//! Timestamped line value type

use std::fmt;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A line of process output paired with the wall-clock instant it was
/// observed.
///
/// The text keeps its trailing line terminator when one was read; a final
/// unterminated chunk at end-of-stream is carried as-is. Lines are immutable
/// once constructed. Buffers order them by arrival, not by timestamp (the
/// two coincide in practice, but arrival order is the invariant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampedLine {
    text: String,
    observed_at: DateTime<Utc>,
}

impl TimestampedLine {
    /// Wrap `text`, stamping it with the current time.
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_timestamp(text, Utc::now())
    }

    /// Wrap `text` with an explicit observation instant.
    pub fn with_timestamp(text: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            observed_at,
        }
    }

    /// The raw line text, trailing terminator included.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Instant at which the reader observed this line.
    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    /// Whether `pattern` matches the line text.
    pub fn is_match(&self, pattern: &Regex) -> bool {
        pattern.is_match(&self.text)
    }
}

impl fmt::Display for TimestampedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
