//! Convenient re-exports for common console-expect usage.
//!
//! ```ignore
//! use console_expect::prelude::*;
//! ```

// Configuration
pub use crate::config::{HarnessConfig, LineEnding};

// Error handling
pub use crate::error::{ExpectError, Result};

// Connections and the transport
pub use crate::connection::{ChildConnection, Connection, connect_tcp};
#[cfg(unix)]
pub use crate::connection::PtyConnection;
pub use crate::transport::Transport;

// Matching
pub use crate::expect::{ExpectEngine, MatchMode, Pattern};
pub use crate::types::{CloseReason, ExpectOutcome, Match};

// Scenarios
pub use crate::scenario::{Expectation, Outcome, Scenario, ScenarioRunner, Step, Verdict};

// Macros (re-exported from console-expect-macros)
pub use crate::{scenario, timeout};
