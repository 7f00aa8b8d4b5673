//! Pattern types for expect operations.
//!
//! Patterns match raw bytes so that offsets reported back to the caller are
//! exact stream offsets, even when the device prints invalid UTF-8.

use std::fmt;

use regex::bytes::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ExpectError, Result};

/// How a pattern's text is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Exact substring equality.
    #[default]
    Literal,
    /// Regular expression matching some contiguous span.
    Regex,
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal => write!(f, "literal"),
            Self::Regex => write!(f, "regex"),
        }
    }
}

/// A compiled pattern that can be matched against buffered output.
#[derive(Clone)]
pub enum Pattern {
    /// Match an exact string.
    Literal(String),

    /// Match a regular expression.
    Regex(CompiledRegex),
}

impl Pattern {
    /// Build a pattern from text and a mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is empty or, in regex mode, fails to compile.
    pub fn new(text: &str, mode: MatchMode) -> Result<Self> {
        match mode {
            MatchMode::Literal => Self::literal(text),
            MatchMode::Regex => Self::regex(text),
        }
    }

    /// Create a literal pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is empty.
    pub fn literal(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.is_empty() {
            return Err(ExpectError::invalid_pattern("literal pattern is empty"));
        }
        Ok(Self::Literal(text))
    }

    /// Create a regex pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is empty or invalid.
    pub fn regex(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(ExpectError::invalid_pattern("regex pattern is empty"));
        }
        let regex = Regex::new(pattern)?;
        Ok(Self::Regex(CompiledRegex::new(pattern.to_string(), regex)))
    }

    /// Get the match mode of this pattern.
    #[must_use]
    pub const fn mode(&self) -> MatchMode {
        match self {
            Self::Literal(_) => MatchMode::Literal,
            Self::Regex(_) => MatchMode::Regex,
        }
    }

    /// Get the pattern source text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(s) => s,
            Self::Regex(r) => r.pattern(),
        }
    }

    /// Find the first match in `haystack`.
    #[must_use]
    pub fn find(&self, haystack: &[u8]) -> Option<PatternMatch> {
        match self {
            Self::Literal(s) => {
                let needle = s.as_bytes();
                if needle.len() > haystack.len() {
                    return None;
                }
                haystack
                    .windows(needle.len())
                    .position(|window| window == needle)
                    .map(|start| PatternMatch {
                        start,
                        end: start + needle.len(),
                        captures: Vec::new(),
                    })
            }
            Self::Regex(r) => r.find(haystack),
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "Literal({s:?})"),
            Self::Regex(r) => write!(f, "Regex({:?})", r.pattern()),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "{s:?}"),
            Self::Regex(r) => write!(f, "/{}/", r.pattern()),
        }
    }
}

/// A compiled regular expression with its source pattern.
#[derive(Clone)]
pub struct CompiledRegex {
    pattern: String,
    regex: Regex,
}

impl CompiledRegex {
    /// Create a new compiled regex.
    #[must_use]
    pub const fn new(pattern: String, regex: Regex) -> Self {
        Self { pattern, regex }
    }

    /// Get the source pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Find the first match and its capture groups.
    #[must_use]
    pub fn find(&self, haystack: &[u8]) -> Option<PatternMatch> {
        let caps = self.regex.captures(haystack)?;
        let whole = caps.get(0)?;
        let captures = caps
            .iter()
            .skip(1)
            .map(|m| {
                m.map_or_else(String::new, |m| {
                    String::from_utf8_lossy(m.as_bytes()).into_owned()
                })
            })
            .collect();
        Some(PatternMatch {
            start: whole.start(),
            end: whole.end(),
            captures,
        })
    }
}

/// Position of a match relative to the searched slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// Start position of the match.
    pub start: usize,
    /// End position of the match (exclusive).
    pub end: usize,
    /// Capture groups (regex patterns only). Groups that did not take part
    /// in the match are empty.
    pub captures: Vec<String>,
}

impl PatternMatch {
    /// Get the length of the match.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if the match is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_finds_first_occurrence() {
        let pattern = Pattern::literal("true").unwrap();
        let m = pattern.find(b"starting test\ntrue\nfalse\ntrue\n").unwrap();
        assert_eq!(m.start, 14);
        assert_eq!(m.end, 18);
    }

    #[test]
    fn literal_longer_than_haystack() {
        let pattern = Pattern::literal("SUCCESS").unwrap();
        assert!(pattern.find(b"SUCC").is_none());
    }

    #[test]
    fn regex_captures() {
        let pattern = Pattern::regex(r"prio (\d+) -> (\w+)").unwrap();
        let m = pattern.find(b"thread prio 3 -> 3rd done").unwrap();
        assert_eq!(m.captures, vec!["3", "3rd"]);
        assert_eq!(m.len(), "prio 3 -> 3rd".len());
    }

    #[test]
    fn regex_on_invalid_utf8() {
        let pattern = Pattern::regex("OK").unwrap();
        let m = pattern.find(b"\xff\xfeOK").unwrap();
        assert_eq!(m.start, 2);
    }

    #[test]
    fn empty_patterns_rejected() {
        assert!(Pattern::literal("").is_err());
        assert!(Pattern::regex("").is_err());
        assert!(Pattern::new("", MatchMode::Regex).is_err());
    }

    #[test]
    fn invalid_regex_rejected() {
        let err = Pattern::regex("[unclosed").unwrap_err();
        assert!(matches!(err, ExpectError::Regex(_)));
    }

    #[test]
    fn new_respects_mode() {
        // In literal mode the dot is not a wildcard.
        let literal = Pattern::new("a.c", MatchMode::Literal).unwrap();
        assert!(literal.find(b"abc").is_none());
        let regex = Pattern::new("a.c", MatchMode::Regex).unwrap();
        assert!(regex.find(b"abc").is_some());
        assert_eq!(regex.mode(), MatchMode::Regex);
    }
}
