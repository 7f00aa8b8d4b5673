//! Error types for console-expect.
//!
//! Every failure the harness can report lives in [`ExpectError`]. Variants
//! that happen while output is pending carry a copy of the unconsumed buffer
//! so a failing test shows what the device actually printed.

use std::time::Duration;

use thiserror::Error;

/// Maximum length of buffer content to display in error messages.
const MAX_BUFFER_DISPLAY: usize = 500;

/// Lines kept when a long buffer is truncated for display.
const TAIL_LINES: usize = 6;

/// Format buffer content for display, keeping only the tail of long buffers.
pub(crate) fn format_buffer_snippet(buffer: &str) -> String {
    if buffer.is_empty() {
        return "(empty buffer)".to_string();
    }

    let lines: Vec<&str> = buffer.lines().collect();
    if buffer.len() <= MAX_BUFFER_DISPLAY || lines.len() <= TAIL_LINES {
        return format!(
            "┌─ unconsumed output ({} bytes) ─────────────\n│ {}\n└────────────────────────────────────────",
            buffer.len(),
            lines.join("\n│ ")
        );
    }

    let hidden = lines.len() - TAIL_LINES;
    format!(
        "┌─ unconsumed output ({} bytes, {} lines) ───\n│ ... ({} lines hidden)\n│ {}\n└────────────────────────────────────────",
        buffer.len(),
        lines.len(),
        hidden,
        lines[hidden..].join("\n│ ")
    )
}

fn format_timeout(duration: Duration, pattern: &str, buffer: &str) -> String {
    format!(
        "timeout after {duration:?} waiting for '{pattern}'\n\n{}",
        format_buffer_snippet(buffer)
    )
}

fn format_closed(reason: &str, pattern: &str, buffer: &str) -> String {
    format!(
        "stream closed ({reason}) while waiting for '{pattern}'\n\n{}",
        format_buffer_snippet(buffer)
    )
}

/// The main error type for console-expect operations.
#[derive(Debug, Error)]
pub enum ExpectError {
    /// Writing to the connection failed, or the connection is already closed.
    #[error("write failed: {reason}")]
    WriteFailed {
        /// Why the write could not be completed.
        reason: String,
        /// The underlying I/O error, if the write reached the connection.
        #[source]
        source: Option<std::io::Error>,
    },

    /// The stream hit EOF, a read error or was closed before the pattern matched.
    #[error("{}", format_closed(reason, pattern, buffer))]
    StreamClosed {
        /// Why the stream closed.
        reason: String,
        /// The pattern that was being waited for.
        pattern: String,
        /// Unconsumed output at the time of closure.
        buffer: String,
    },

    /// The deadline elapsed without a match.
    #[error("{}", format_timeout(*duration, pattern, buffer))]
    Timeout {
        /// The timeout that elapsed.
        duration: Duration,
        /// The pattern that was being waited for.
        pattern: String,
        /// Unconsumed output at the time of the timeout.
        buffer: String,
    },

    /// Another expectation is already outstanding on this connection.
    #[error("an expectation is already pending on this connection")]
    EngineBusy,

    /// The transport reader was started twice.
    #[error("transport reader already started")]
    AlreadyStarted,

    /// The transport has no connection yet.
    #[error("transport reader not started")]
    NotStarted,

    /// A pattern was empty or otherwise unusable.
    #[error("invalid pattern: {message}")]
    InvalidPattern {
        /// What is wrong with the pattern.
        message: String,
    },

    /// A regex pattern failed to compile.
    #[error("invalid regex pattern: {0}")]
    Regex(#[from] regex::Error),

    /// An I/O error outside of the connection's read/write path.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration or scenario file could not be used.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// A connection to the device or process could not be established.
    #[error("failed to open connection to {target}: {source}")]
    Connect {
        /// What we tried to connect to.
        target: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for console-expect operations.
pub type Result<T> = std::result::Result<T, ExpectError>;

impl ExpectError {
    /// Create a timeout error.
    pub fn timeout(duration: Duration, pattern: impl Into<String>, buffer: impl Into<String>) -> Self {
        Self::Timeout {
            duration,
            pattern: pattern.into(),
            buffer: buffer.into(),
        }
    }

    /// Create a stream-closed error.
    pub fn stream_closed(
        reason: impl Into<String>,
        pattern: impl Into<String>,
        buffer: impl Into<String>,
    ) -> Self {
        Self::StreamClosed {
            reason: reason.into(),
            pattern: pattern.into(),
            buffer: buffer.into(),
        }
    }

    /// Create a write error for a connection that is already closed.
    pub fn write_closed(reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            reason: reason.into(),
            source: None,
        }
    }

    /// Create a write error from an I/O failure.
    #[must_use]
    pub fn write_io(source: std::io::Error) -> Self {
        Self::WriteFailed {
            reason: source.to_string(),
            source: Some(source),
        }
    }

    /// Create an invalid pattern error.
    pub fn invalid_pattern(message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a connection error.
    pub fn connect(target: impl Into<String>, source: std::io::Error) -> Self {
        Self::Connect {
            target: target.into(),
            source,
        }
    }

    /// Check if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if the stream closed underneath the caller.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::StreamClosed { .. })
    }

    /// Get the buffer contents if this error carries them.
    #[must_use]
    pub fn buffer(&self) -> Option<&str> {
        match self {
            Self::Timeout { buffer, .. } | Self::StreamClosed { buffer, .. } => Some(buffer),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_includes_pattern_and_buffer() {
        let err = ExpectError::timeout(Duration::from_secs(5), "false", "starting test\ntrue\n");
        let msg = err.to_string();
        assert!(msg.contains("timeout"));
        assert!(msg.contains("'false'"));
        assert!(msg.contains("starting test"));
        assert!(msg.contains("unconsumed output"));
    }

    #[test]
    fn closed_display_includes_reason() {
        let err = ExpectError::stream_closed("EOF", "SUCCESS", "");
        let msg = err.to_string();
        assert!(msg.contains("EOF"));
        assert!(msg.contains("SUCCESS"));
        assert!(msg.contains("empty buffer"));
    }

    #[test]
    fn long_buffer_is_truncated() {
        let large: String = (0..50).fold(String::new(), |mut acc, i| {
            use std::fmt::Write;
            let _ = writeln!(acc, "line {i}: some console chatter");
            acc
        });
        let snippet = format_buffer_snippet(&large);
        assert!(snippet.contains("44 lines hidden"));
        assert!(snippet.contains("line 49"));
        assert!(!snippet.contains("line 3:"));
    }

    #[test]
    fn predicates() {
        assert!(ExpectError::timeout(Duration::ZERO, "x", "").is_timeout());
        assert!(ExpectError::stream_closed("EOF", "x", "").is_closed());
        assert!(!ExpectError::EngineBusy.is_timeout());
    }

    #[test]
    fn buffer_accessor() {
        let err = ExpectError::timeout(Duration::from_secs(1), "x", "the buffer");
        assert_eq!(err.buffer(), Some("the buffer"));
        assert!(ExpectError::AlreadyStarted.buffer().is_none());
    }

    #[test]
    fn write_io_keeps_source() {
        use std::error::Error as _;
        let err = ExpectError::write_io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "pipe gone",
        ));
        assert!(err.to_string().contains("pipe gone"));
        assert!(err.source().is_some());
    }
}
