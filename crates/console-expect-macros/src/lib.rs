//! console-expect-macros: Procedural macros for console-expect
//!
//! This crate provides compile-time macros for the console-expect harness:
//!
//! - [`scenario!`] - Write a scenario as a compact script, with regex
//!   patterns validated at compile time
//! - [`timeout!`] - Parse timeout duration specifications
//!
//! # Example: Scenario Script
//!
//! ```ignore
//! use console_expect_macros::scenario;
//!
//! let freertos = scenario! {
//!     name "freertos";
//!     timeout 10 s;
//!     probe "help" => "> " within 1 s attempts 10;
//!     send "mutex_semaphore";
//!     expect "starting test: mutex semaphore";
//!     expect_re r"OK";
//!     expect "> ";
//! };
//! ```
//!
//! # Example: Human-Readable Timeout
//!
//! ```ignore
//! use console_expect_macros::timeout;
//!
//! let duration = timeout!(5 s);
//! let long_timeout = timeout!(2 m + 30 s);
//! ```

// In proc-macro crates, passing parsed input by value is idiomatic
#![allow(clippy::needless_pass_by_value)]

use proc_macro::TokenStream;
use syn::parse_macro_input;

mod scenario;
mod timeout;

/// Define a scenario as a script of `;`-separated commands.
///
/// Expands to a `console_expect::scenario::Scenario`.
///
/// # Commands
///
/// - `name "text"` - Scenario name
/// - `timeout duration` - Default timeout for expectations
/// - `send "line"` - Write a line
/// - `expect "literal" [within duration]` - Wait for a literal
/// - `expect_re "regex" [within duration]` - Wait for a regex (validated at
///   compile time)
/// - `optional "literal" within duration` - Wait for a literal; a timeout is
///   accepted and the scenario continues
/// - `optional_re "regex" within duration` - Same, for a regex
/// - `probe "line" => "literal" [within duration] [attempts N]` - Write the
///   line until the literal appears
///
/// Durations use the [`timeout!`] syntax, e.g. `1 m + 30 s`.
///
/// # Examples
///
/// ```ignore
/// use console_expect_macros::scenario;
///
/// let sema = scenario! {
///     name "sema";
///     expect "starting test";
///     expect "true";
///     optional "Second semaphore block, as expected false" within 2 s;
///     expect "SUCCESS";
/// };
/// ```
#[proc_macro]
pub fn scenario(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as scenario::ScenarioInput);
    scenario::expand(input).into()
}

/// Parse a human-readable timeout specification.
///
/// Creates a `std::time::Duration` from a human-readable format.
///
/// # Supported Units
///
/// - `ms` - Milliseconds
/// - `s` - Seconds
/// - `m` - Minutes
///
/// # Examples
///
/// ```ignore
/// use console_expect_macros::timeout;
///
/// let short = timeout!(100 ms);
/// let compound = timeout!(1 m + 30 s + 500 ms);
/// ```
#[proc_macro]
pub fn timeout(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as timeout::TimeoutInput);
    timeout::expand(&input).into()
}
