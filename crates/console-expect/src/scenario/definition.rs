//! Scenario definitions.
//!
//! A [`Scenario`] is plain data: an ordered list of [`Step`]s. It can be
//! built in code, with the `scenario!` macro, or loaded from TOML:
//!
//! ```toml
//! name = "sema"
//! default_timeout = 10
//!
//! [[step]]
//! kind = "send"
//! line = "start"
//!
//! [[step]]
//! kind = "expect"
//! pattern = "SUCCESS"
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ExpectError, Result};
use crate::expect::{MatchMode, Pattern};
use crate::util::duration::option_secs;

/// Number of attempts a probe makes when the file does not say.
pub const DEFAULT_PROBE_ATTEMPTS: u32 = 10;

const fn default_attempts() -> u32 {
    DEFAULT_PROBE_ATTEMPTS
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}

/// A single expectation as written in a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectation {
    /// Pattern text.
    pub pattern: String,

    /// How the pattern is interpreted.
    #[serde(default)]
    pub mode: MatchMode,

    /// Timeout for this expectation; falls back to the scenario default.
    #[serde(default, with = "option_secs", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,

    /// Accept a timeout as a satisfied step instead of failing the run.
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
}

impl Expectation {
    /// Expect a literal substring.
    #[must_use]
    pub fn literal(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            mode: MatchMode::Literal,
            timeout: None,
            optional: false,
        }
    }

    /// Expect a regular expression.
    #[must_use]
    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            mode: MatchMode::Regex,
            ..Self::literal(pattern)
        }
    }

    /// Set the timeout for this expectation.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Treat a timeout on this expectation as acceptable.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Compile the pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is empty or is an invalid regex.
    pub fn compile(&self) -> Result<Pattern> {
        Pattern::new(&self.pattern, self.mode)
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            MatchMode::Literal => write!(f, "{:?}", self.pattern)?,
            MatchMode::Regex => write!(f, "/{}/", self.pattern)?,
        }
        if self.optional {
            write!(f, " (optional)")?;
        }
        Ok(())
    }
}

/// One step of a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// Write a line to the connection.
    Send {
        /// Line to write, without line ending.
        line: String,
    },

    /// Wait for a pattern.
    Expect(Expectation),

    /// Write a line and wait for a short answer, up to `attempts` times.
    ///
    /// Used to wait for a shell prompt on a device that may still be booting.
    Probe {
        /// Line to write on every attempt.
        line: String,
        /// Answer that ends the probe.
        expect: Expectation,
        /// Maximum number of attempts.
        #[serde(default = "default_attempts")]
        attempts: u32,
    },
}

impl Step {
    /// A send step.
    #[must_use]
    pub fn send(line: impl Into<String>) -> Self {
        Self::Send { line: line.into() }
    }

    /// An expect step.
    #[must_use]
    pub const fn expect(expectation: Expectation) -> Self {
        Self::Expect(expectation)
    }

    /// A probe step.
    #[must_use]
    pub fn probe(line: impl Into<String>, expect: Expectation, attempts: u32) -> Self {
        Self::Probe {
            line: line.into(),
            expect,
            attempts,
        }
    }

    /// The expectation of this step, if it has one.
    #[must_use]
    pub const fn expectation(&self) -> Option<&Expectation> {
        match self {
            Self::Send { .. } => None,
            Self::Expect(e) | Self::Probe { expect: e, .. } => Some(e),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send { line } => write!(f, "send {line:?}"),
            Self::Expect(e) => write!(f, "expect {e}"),
            Self::Probe {
                line,
                expect,
                attempts,
            } => write!(f, "probe {line:?} until {expect} (max {attempts} attempts)"),
        }
    }
}

/// A scenario step that failed validation.
#[derive(Debug, Error)]
#[error("step {step}: {source}")]
pub struct InvalidStep {
    /// Zero-based index of the offending step.
    pub step: usize,
    /// What is wrong with it.
    #[source]
    pub source: ExpectError,
}

/// A step with its pattern compiled.
#[derive(Debug)]
pub(crate) enum CompiledStep<'a> {
    Send(&'a str),
    Expect(&'a Expectation, Pattern),
    Probe(&'a str, &'a Expectation, Pattern, u32),
}

/// An ordered script of send and expect steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Scenario name, used in reports and logs.
    pub name: String,

    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Timeout for expectations that do not set their own.
    #[serde(default, with = "option_secs", skip_serializing_if = "Option::is_none")]
    pub default_timeout: Option<Duration>,

    /// Steps, executed strictly in order.
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Create an empty scenario.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            default_timeout: None,
            steps: Vec::new(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the default expectation timeout.
    #[must_use]
    pub const fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Append a step.
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Append a send step.
    #[must_use]
    pub fn send(self, line: impl Into<String>) -> Self {
        self.step(Step::send(line))
    }

    /// Append an expect step for a literal.
    #[must_use]
    pub fn expect(self, pattern: impl Into<String>) -> Self {
        self.step(Step::Expect(Expectation::literal(pattern)))
    }

    /// Append an expect step for a regex.
    #[must_use]
    pub fn expect_regex(self, pattern: impl Into<String>) -> Self {
        self.step(Step::Expect(Expectation::regex(pattern)))
    }

    /// Append an arbitrary expectation.
    #[must_use]
    pub fn expect_with(self, expectation: Expectation) -> Self {
        self.step(Step::Expect(expectation))
    }

    /// Append a probe step.
    #[must_use]
    pub fn probe(self, line: impl Into<String>, expect: Expectation, attempts: u32) -> Self {
        self.step(Step::probe(line, expect, attempts))
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the scenario has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Parse a scenario from TOML text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the text is not a valid scenario.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ExpectError::config(e.to_string()))
    }

    /// Load a scenario file.
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

    /// Check every step without running anything.
    ///
    /// # Errors
    ///
    /// Returns the first step with an empty or invalid pattern, or a probe
    /// with zero attempts.
    pub fn validate(&self) -> std::result::Result<(), InvalidStep> {
        self.compile().map(|_| ())
    }

    /// Effective timeout of an expectation in this scenario.
    #[must_use]
    pub fn timeout_for(&self, expectation: &Expectation, fallback: Duration) -> Duration {
        expectation
            .timeout
            .or(self.default_timeout)
            .unwrap_or(fallback)
    }

    pub(crate) fn compile(&self) -> std::result::Result<Vec<CompiledStep<'_>>, InvalidStep> {
        self.steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                Self::compile_step(step).map_err(|source| InvalidStep {
                    step: index,
                    source,
                })
            })
            .collect()
    }

    fn compile_step(step: &Step) -> Result<CompiledStep<'_>> {
        Ok(match step {
            Step::Send { line } => CompiledStep::Send(line),
            Step::Expect(e) => CompiledStep::Expect(e, e.compile()?),
            Step::Probe {
                line,
                expect,
                attempts,
            } => {
                if *attempts == 0 {
                    return Err(ExpectError::invalid_pattern(
                        "probe needs at least one attempt",
                    ));
                }
                CompiledStep::Probe(line, expect, expect.compile()?, *attempts)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_order() {
        let s = Scenario::new("sema")
            .send("start")
            .expect("SUCCESS")
            .expect_regex(r"\d+ ticks");
        assert_eq!(s.len(), 3);
        assert_eq!(s.steps[0], Step::send("start"));
        assert_eq!(s.steps[2].expectation().unwrap().mode, MatchMode::Regex);
    }

    #[test]
    fn timeout_resolution_chain() {
        let fallback = Duration::from_secs(10);
        let plain = Expectation::literal("x");
        let own = Expectation::literal("x").timeout(Duration::from_secs(1));

        let s = Scenario::new("a");
        assert_eq!(s.timeout_for(&plain, fallback), fallback);

        let s = s.default_timeout(Duration::from_secs(3));
        assert_eq!(s.timeout_for(&plain, fallback), Duration::from_secs(3));
        assert_eq!(s.timeout_for(&own, fallback), Duration::from_secs(1));
    }

    #[test]
    fn validate_reports_offending_step() {
        let s = Scenario::new("bad").expect("ok").expect_regex("(unclosed");
        let err = s.validate().unwrap_err();
        assert_eq!(err.step, 1);

        let s = Scenario::new("empty").send("x").expect("");
        assert_eq!(s.validate().unwrap_err().step, 1);

        let s = Scenario::new("probe").probe("help", Expectation::literal("> "), 0);
        assert_eq!(s.validate().unwrap_err().step, 0);
    }

    #[test]
    fn parse_toml() {
        let s = Scenario::from_toml_str(
            r#"
            name = "freertos"
            default_timeout = 5

            [[step]]
            kind = "probe"
            line = "help"
            expect = { pattern = "> ", timeout = 1 }

            [[step]]
            kind = "send"
            line = "mutex_semaphore"

            [[step]]
            kind = "expect"
            pattern = "starting test: mutex semaphore"
            mode = "regex"

            [[step]]
            kind = "expect"
            pattern = "Second semaphore block, as expected false"
            timeout = 0.5
            optional = true
        "#,
        )
        .unwrap();

        assert_eq!(s.default_timeout, Some(Duration::from_secs(5)));
        assert_eq!(
            s.steps[0],
            Step::probe(
                "help",
                Expectation::literal("> ").timeout(Duration::from_secs(1)),
                DEFAULT_PROBE_ATTEMPTS
            )
        );
        assert_eq!(
            s.steps[3],
            Step::Expect(
                Expectation::literal("Second semaphore block, as expected false")
                    .timeout(Duration::from_millis(500))
                    .optional()
            )
        );
        s.validate().unwrap();
    }

    #[test]
    fn unknown_step_kind_rejected() {
        let err = Scenario::from_toml_str("name = \"x\"\n[[step]]\nkind = \"reset\"").unwrap_err();
        assert!(matches!(err, ExpectError::Config { .. }));
    }

    #[test]
    fn display() {
        assert_eq!(Step::send("help").to_string(), "send \"help\"");
        assert_eq!(
            Step::Expect(Expectation::regex("O+K").optional()).to_string(),
            "expect /O+K/ (optional)"
        );
    }
}
