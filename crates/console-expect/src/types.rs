//! Common types for console-expect.
//!
//! This module defines the result of a single expectation ([`ExpectOutcome`]),
//! the details of a successful match ([`Match`]) and the reason a stream
//! stopped producing data ([`CloseReason`]).

use std::fmt;
use std::time::Duration;

use crate::error::{ExpectError, Result};

/// A successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// The text that matched.
    pub matched: String,

    /// Capture groups from regex patterns.
    pub captures: Vec<String>,

    /// Output skipped between the previous consumption point and the match.
    pub before: String,

    /// Absolute stream offset of the first matched byte.
    pub start: u64,

    /// Absolute stream offset just past the match. Everything before it has
    /// been consumed.
    pub end: u64,
}

impl Match {
    /// Get a capture group by index.
    #[must_use]
    pub fn capture(&self, index: usize) -> Option<&str> {
        self.captures.get(index).map(String::as_str)
    }

    /// Get the full matched text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.matched
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.matched)
    }
}

/// Why a stream stopped delivering data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The connection reported end of file.
    Eof,
    /// A read failed.
    ReadError(String),
    /// The transport was closed by its owner.
    Cancelled,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eof => write!(f, "EOF"),
            Self::ReadError(e) => write!(f, "read error: {e}"),
            Self::Cancelled => write!(f, "closed by harness"),
        }
    }
}

/// How a single expectation resolved.
///
/// Timeouts are an ordinary result here, not an error, because some
/// scenarios accept them as a branch outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectOutcome {
    /// The pattern matched and the buffer was consumed through `Match::end`.
    Matched(Match),

    /// The deadline passed. Nothing was consumed.
    Timeout {
        /// The timeout that elapsed.
        duration: Duration,
        /// Unconsumed output at the time of the timeout.
        buffer: String,
    },

    /// The stream closed before a match.
    Closed {
        /// Why the stream closed.
        reason: CloseReason,
        /// Unconsumed output at the time of closure.
        buffer: String,
    },
}

impl ExpectOutcome {
    /// Check if this is a successful match.
    #[must_use]
    pub const fn is_match(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    /// Check if this is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if the stream closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }

    /// Get the match if this is a successful match.
    #[must_use]
    pub fn into_match(self) -> Option<Match> {
        match self {
            Self::Matched(m) => Some(m),
            _ => None,
        }
    }

    /// Get the buffer snapshot of a timeout or closure.
    #[must_use]
    pub fn buffer(&self) -> Option<&str> {
        match self {
            Self::Timeout { buffer, .. } | Self::Closed { buffer, .. } => Some(buffer),
            Self::Matched(_) => None,
        }
    }

    /// Turn timeouts and closures into errors.
    ///
    /// `pattern` is only used to describe the error.
    pub fn into_result(self, pattern: &str) -> Result<Match> {
        match self {
            Self::Matched(m) => Ok(m),
            Self::Timeout { duration, buffer } => {
                Err(ExpectError::timeout(duration, pattern, buffer))
            }
            Self::Closed { reason, buffer } => Err(ExpectError::stream_closed(
                reason.to_string(),
                pattern,
                buffer,
            )),
        }
    }
}
