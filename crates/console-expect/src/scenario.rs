//! Scenarios: ordered send/expect scripts and their execution.
//!
//! A [`Scenario`] describes one test case as data. A [`ScenarioRunner`]
//! executes it against a [`Connection`](crate::Connection) and returns an
//! [`Outcome`]: pass, or fail at the first step that did not succeed.
//!
//! # Example
//!
//! ```ignore
//! use console_expect::scenario::{Expectation, Scenario, ScenarioRunner};
//! use std::time::Duration;
//!
//! let scenario = Scenario::new("freertos")
//!     .probe("help", Expectation::literal("> ").timeout(Duration::from_secs(1)), 10)
//!     .send("mutex_semaphore")
//!     .expect("starting test: mutex semaphore")
//!     .expect("OK");
//!
//! let outcome = ScenarioRunner::default().run(&scenario, connection).await;
//! assert!(outcome.is_pass(), "{outcome}");
//! ```

mod definition;
mod outcome;
mod runner;

pub use definition::{DEFAULT_PROBE_ATTEMPTS, Expectation, InvalidStep, Scenario, Step};
pub use outcome::{Failure, FailureKind, Outcome, Verdict};
pub use runner::ScenarioRunner;
