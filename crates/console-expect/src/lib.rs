//! console-expect: expectation harness for device and process consoles
//!
//! This crate drives scripted console tests: it owns a byte stream to a
//! device or process, buffers everything the other side prints, and waits
//! for literal or regex expectations in order, each with its own deadline.
//!
//! # Features
//!
//! - **Async-first design** with Tokio runtime
//! - **Background draining**: output arriving between steps is never lost
//! - **Monotonic consumption**: an expectation only sees output after the
//!   previous match
//! - **Tri-state results**: matched, timed out, or stream closed
//! - **Data-driven scenarios** built in code, with `scenario!`, or from TOML
//! - **Mock device** for testing (feature: `mock`)
//!
//! # Example
//!
//! ```ignore
//! use console_expect::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let scenario = scenario! {
//!         name "mutex_3threads";
//!         timeout 10 s;
//!         expect "3rd";
//!         expect "2nd";
//!         expect "SUCCESS";
//!     };
//!     let connection = connect_tcp("127.0.0.1:4321").await?;
//!     let outcome = ScenarioRunner::default().run(&scenario, connection).await;
//!     println!("{outcome}");
//!     Ok(())
//! }
//! ```

// Re-export macros
pub use console_expect_macros::{scenario, timeout};

pub mod config;
pub mod connection;
pub mod error;
pub mod expect;
pub mod prelude;
pub mod scenario;
pub mod transport;
pub mod types;
pub mod util;

/// Scripted mock device for testing.
#[cfg(feature = "mock")]
pub mod mock;

pub use config::{BufferConfig, HarnessConfig, LineEnding, TimeoutConfig, env::EnvConfig};
pub use connection::{ChildConnection, Connection, connect_tcp};
#[cfg(unix)]
pub use connection::{PtyConnection, PtyOptions};
pub use error::{ExpectError, Result};
pub use expect::{ExpectEngine, MatchMode, Pattern, StreamBuffer};
#[cfg(feature = "mock")]
pub use mock::{MockBuilder, MockConnection, MockDevice};
pub use scenario::{Expectation, Outcome, Scenario, ScenarioRunner, Step, Verdict};
pub use transport::Transport;
pub use types::{CloseReason, ExpectOutcome, Match};
pub use util::{Deadline, TimeoutExt};
