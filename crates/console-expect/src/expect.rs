//! Expect pattern matching module.
//!
//! This module provides the core matching machinery: pattern types, the
//! buffer of unconsumed output, and the engine that waits for matches.

mod buffer;
mod engine;
mod pattern;

pub use buffer::{DEFAULT_CAPACITY, StreamBuffer};
pub(crate) use engine::SharedStream;
pub use engine::ExpectEngine;
pub use pattern::{CompiledRegex, MatchMode, Pattern, PatternMatch};
