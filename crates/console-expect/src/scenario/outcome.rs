//! Scenario outcomes.

use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::error::{ExpectError, format_buffer_snippet};
use crate::util::duration::secs;

fn as_millis<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
}

/// Result of running one scenario.
///
/// Equality includes the wall-clock `elapsed`, so two runs of the same
/// scenario rarely compare equal. Use [`Outcome::same_result`] to compare
/// what happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    /// Name of the scenario.
    pub scenario: String,

    /// Pass or fail.
    #[serde(flatten)]
    pub verdict: Verdict,

    /// Wall-clock time of the run.
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

impl Outcome {
    /// Check if the scenario passed.
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self.verdict, Verdict::Pass)
    }

    /// The failure, if the scenario failed.
    #[must_use]
    pub const fn failure(&self) -> Option<&Failure> {
        match &self.verdict {
            Verdict::Pass => None,
            Verdict::Fail(failure) => Some(failure),
        }
    }

    /// Check if two outcomes report the same scenario and verdict, ignoring
    /// how long each run took.
    #[must_use]
    pub fn same_result(&self, other: &Self) -> bool {
        self.scenario == other.scenario && self.verdict == other.verdict
    }

    /// Render the outcome as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({ "scenario": self.scenario, "error": e.to_string() })
        })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.verdict {
            Verdict::Pass => write!(f, "PASS {} ({:.3?})", self.scenario, self.elapsed),
            Verdict::Fail(failure) => {
                write!(f, "FAIL {} ({:.3?}): {failure}", self.scenario, self.elapsed)
            }
        }
    }
}

/// Pass/fail verdict of a scenario run.
///
/// Only the first failing step is reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Verdict {
    /// Every step succeeded.
    Pass,
    /// The run aborted at a step.
    Fail(Failure),
}

/// Where and why a scenario failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// Zero-based index of the failing step.
    pub step: usize,

    /// Human-readable form of the failing step.
    pub description: String,

    /// The unmet pattern, for steps that expect something.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,

    /// What went wrong.
    pub kind: FailureKind,

    /// Tail of the unconsumed output at the time of failure.
    pub buffer_tail: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} ({}): {}", self.step, self.description, self.kind)?;
        if let Some(expected) = &self.expected {
            write!(f, "\n  expected: {expected}")?;
        }
        write!(f, "\n\n{}", format_buffer_snippet(&self.buffer_tail))
    }
}

/// Classification of a step failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// The pattern did not appear in time.
    Timeout {
        /// How long the step waited.
        #[serde(with = "secs")]
        after: Duration,
    },

    /// The stream closed before the pattern appeared.
    StreamClosed {
        /// Why the stream closed.
        reason: String,
    },

    /// Writing a line failed.
    WriteFailed {
        /// Error message.
        message: String,
    },

    /// Another expectation was already pending on the connection.
    EngineBusy,

    /// The connection's reader was already started.
    AlreadyStarted,

    /// The step's pattern is invalid.
    InvalidPattern {
        /// Error message.
        message: String,
    },

    /// Any other harness error.
    Error {
        /// Error message.
        message: String,
    },
}

impl From<&ExpectError> for FailureKind {
    fn from(error: &ExpectError) -> Self {
        match error {
            ExpectError::Timeout { duration, .. } => Self::Timeout { after: *duration },
            ExpectError::StreamClosed { reason, .. } => Self::StreamClosed {
                reason: reason.clone(),
            },
            ExpectError::WriteFailed { reason, .. } => Self::WriteFailed {
                message: reason.clone(),
            },
            ExpectError::EngineBusy => Self::EngineBusy,
            ExpectError::AlreadyStarted => Self::AlreadyStarted,
            ExpectError::InvalidPattern { message } => Self::InvalidPattern {
                message: message.clone(),
            },
            ExpectError::Regex(e) => Self::InvalidPattern {
                message: e.to_string(),
            },
            other => Self::Error {
                message: other.to_string(),
            },
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { after } => write!(f, "timed out after {after:?}"),
            Self::StreamClosed { reason } => write!(f, "stream closed ({reason})"),
            Self::WriteFailed { message } => write!(f, "write failed: {message}"),
            Self::EngineBusy => write!(f, "another expectation is already pending"),
            Self::AlreadyStarted => write!(f, "transport already started"),
            Self::InvalidPattern { message } => write!(f, "invalid pattern: {message}"),
            Self::Error { message } => write!(f, "{message}"),
        }
    }
}
