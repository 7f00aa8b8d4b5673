//! Configuration types for console-expect.
//!
//! A [`HarnessConfig`] is built in code, loaded from a TOML file, or both,
//! and can then be overridden from `CONSOLE_EXPECT_*` environment variables
//! (see [`env`]). Every field has a default, so an expectation always has a
//! defined timeout even when neither the scenario nor the step sets one.

pub mod env;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ExpectError, Result};
use crate::util::duration::secs;

/// Default timeout for a single expectation (10 seconds).
pub const DEFAULT_EXPECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default budget for closing a connection.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default buffer cap (1 MB).
pub const DEFAULT_BUFFER_SIZE: usize = crate::expect::DEFAULT_CAPACITY;

/// Default number of bytes requested per read.
pub const DEFAULT_READ_CHUNK: usize = 4096;

/// Default number of trailing bytes kept in failure diagnostics.
pub const DEFAULT_TAIL_BYTES: usize = 512;

/// Top-level harness configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Timeout configuration.
    pub timeout: TimeoutConfig,

    /// Buffer configuration.
    pub buffer: BufferConfig,

    /// Line ending appended by `write_line`.
    pub line_ending: LineEnding,
}

impl HarnessConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the text is not valid.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ExpectError::config(e.to_string()))
    }

    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ExpectError::config(format!("reading {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
            .map_err(|e| ExpectError::config(format!("{}: {e}", path.display())))
    }

    /// Set the default expectation timeout.
    #[must_use]
    pub const fn expect_timeout(mut self, timeout: Duration) -> Self {
        self.timeout.expect = timeout;
        self
    }

    /// Set the buffer cap.
    #[must_use]
    pub const fn buffer_size(mut self, max_size: usize) -> Self {
        self.buffer.max_size = max_size;
        self
    }

    /// Set the line ending.
    #[must_use]
    pub const fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }
}

/// Configuration for timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Default timeout for expectations that do not set their own.
    #[serde(with = "secs")]
    pub expect: Duration,

    /// Budget for shutting down the connection at the end of a run.
    #[serde(with = "secs")]
    pub close: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            expect: DEFAULT_EXPECT_TIMEOUT,
            close: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

/// Configuration for the output buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BufferConfig {
    /// Maximum number of unconsumed bytes kept.
    pub max_size: usize,

    /// Bytes requested per read from the connection.
    pub read_chunk: usize,

    /// Trailing bytes of unconsumed output included in failure reports.
    pub tail_bytes: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_BUFFER_SIZE,
            read_chunk: DEFAULT_READ_CHUNK,
            tail_bytes: DEFAULT_TAIL_BYTES,
        }
    }
}

/// Line ending styles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// Unix-style line ending (LF).
    #[default]
    Lf,

    /// Windows-style line ending (CRLF).
    CrLf,

    /// Carriage return only (CR), as some serial consoles expect.
    Cr,
}

impl LineEnding {
    /// Get the line ending as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::Cr => "\r",
        }
    }

    /// Parse a line ending name (`lf`, `crlf`, `cr`).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "lf" | "\\n" => Some(Self::Lf),
            "crlf" | "\\r\\n" => Some(Self::CrLf),
            "cr" | "\\r" => Some(Self::Cr),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.timeout.expect, DEFAULT_EXPECT_TIMEOUT);
        assert_eq!(config.buffer.max_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(config.line_ending, LineEnding::Lf);
    }

    #[test]
    fn builder() {
        let config = HarnessConfig::new()
            .expect_timeout(Duration::from_secs(3))
            .buffer_size(64)
            .line_ending(LineEnding::CrLf);
        assert_eq!(config.timeout.expect, Duration::from_secs(3));
        assert_eq!(config.buffer.max_size, 64);
        assert_eq!(config.line_ending.as_str(), "\r\n");
    }

    #[test]
    fn parse_partial_toml() {
        let config = HarnessConfig::from_toml_str(
            r#"
            line_ending = "crlf"

            [timeout]
            expect = 2.5
        "#,
        )
        .unwrap();
        assert_eq!(config.timeout.expect, Duration::from_millis(2500));
        assert_eq!(config.timeout.close, DEFAULT_CLOSE_TIMEOUT);
        assert_eq!(config.buffer, BufferConfig::default());
        assert_eq!(config.line_ending, LineEnding::CrLf);
    }

    #[test]
    fn unknown_keys_rejected() {
        let err = HarnessConfig::from_toml_str("[timeout]\nexpcet = 1").unwrap_err();
        assert!(matches!(err, ExpectError::Config { .. }));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = HarnessConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("not/here.toml"));
    }

    #[test]
    fn line_ending_names() {
        assert_eq!(LineEnding::from_name("CRLF"), Some(LineEnding::CrLf));
        assert_eq!(LineEnding::from_name("cr"), Some(LineEnding::Cr));
        assert_eq!(LineEnding::from_name("nl"), None);
    }
}
