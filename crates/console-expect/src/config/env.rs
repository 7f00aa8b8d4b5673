//! Environment-based configuration.
//!
//! Overrides are read from `CONSOLE_EXPECT_*` variables. The reader takes a
//! snapshot of the variables when it is created, so tests can feed it an
//! explicit map instead of touching the process environment.

use std::collections::HashMap;
use std::time::Duration;

use super::{HarnessConfig, LineEnding};
use crate::error::{ExpectError, Result};

/// Environment configuration prefix.
pub const DEFAULT_PREFIX: &str = "CONSOLE_EXPECT";

/// Variable names understood by [`HarnessConfig::apply_env`], without prefix.
pub mod vars {
    /// Default expectation timeout in milliseconds.
    pub const TIMEOUT_MS: &str = "TIMEOUT_MS";
    /// Close budget in milliseconds.
    pub const CLOSE_TIMEOUT_MS: &str = "CLOSE_TIMEOUT_MS";
    /// Buffer cap in bytes.
    pub const BUFFER_SIZE: &str = "BUFFER_SIZE";
    /// Line ending name (`lf`, `crlf`, `cr`).
    pub const LINE_ENDING: &str = "LINE_ENDING";
}

/// Environment variable reader.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Prefix for environment variables.
    prefix: String,
    /// Snapshot of the variables.
    values: HashMap<String, String>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl EnvConfig {
    /// Read the process environment with the default prefix.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build a reader from an explicit set of variables.
    #[must_use]
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            values: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Use a different prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Build the full environment variable name.
    fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Get a string value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(&self.var_name(name)).map(String::as_str)
    }

    /// Get a parsed value, reporting malformed values as errors.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the variable if the value does
    /// not parse.
    pub fn parse<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(name)
            .map(|v| {
                v.trim().parse().map_err(|e| {
                    ExpectError::config(format!("{}={v:?}: {e}", self.var_name(name)))
                })
            })
            .transpose()
    }

    /// Get a duration given in milliseconds.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the value is not an integer.
    pub fn duration_millis(&self, name: &str) -> Result<Option<Duration>> {
        Ok(self.parse::<u64>(name)?.map(Duration::from_millis))
    }

    /// Check if a variable is set.
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

impl HarnessConfig {
    /// Apply environment overrides on top of this configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a set variable is malformed.
    pub fn apply_env(mut self, env: &EnvConfig) -> Result<Self> {
        if let Some(timeout) = env.duration_millis(vars::TIMEOUT_MS)? {
            self.timeout.expect = timeout;
        }
        if let Some(timeout) = env.duration_millis(vars::CLOSE_TIMEOUT_MS)? {
            self.timeout.close = timeout;
        }
        if let Some(size) = env.parse::<usize>(vars::BUFFER_SIZE)? {
            self.buffer.max_size = size;
        }
        if let Some(name) = env.get(vars::LINE_ENDING) {
            self.line_ending = LineEnding::from_name(name).ok_or_else(|| {
                ExpectError::config(format!(
                    "{}={name:?}: expected lf, crlf or cr",
                    env.var_name(vars::LINE_ENDING)
                ))
            })?;
        }
        Ok(self)
    }
}
