//! Scripted in-memory device for testing scenarios.
//!
//! A mock device plays back a timeline of output, delays and closure, and
//! can answer lines the harness writes with canned responses. The
//! [`MockConnection`] half goes to the harness; the [`MockDevice`] half
//! stays with the test.
//!
//! # Example
//!
//! ```ignore
//! use console_expect::mock::MockBuilder;
//! use console_expect::scenario::{Scenario, ScenarioRunner};
//!
//! let (connection, device) = MockBuilder::new()
//!     .respond("help", "> ")
//!     .respond("sema", "starting test\nSUCCESS\n> ")
//!     .build();
//!
//! let scenario = Scenario::new("sema").send("sema").expect("SUCCESS");
//! let outcome = ScenarioRunner::default().run(&scenario, connection).await;
//! assert!(outcome.is_pass());
//! assert_eq!(device.input_lines(), vec!["sema"]);
//! ```

mod device;
mod event;

use std::time::Duration;

pub use device::{MockConnection, MockDevice};
pub use event::{EventTimeline, MockEvent};

/// Builder for mock devices.
#[derive(Debug, Clone, Default)]
pub struct MockBuilder {
    events: Vec<MockEvent>,
    responders: Vec<device::Responder>,
}

impl MockBuilder {
    /// Create a new mock builder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            events: Vec::new(),
            responders: Vec::new(),
        }
    }

    /// Print text.
    #[must_use]
    pub fn output(mut self, data: &str) -> Self {
        self.events.push(MockEvent::output_str(data));
        self
    }

    /// Print raw bytes.
    #[must_use]
    pub fn output_bytes(mut self, data: &[u8]) -> Self {
        self.events.push(MockEvent::output(data));
        self
    }

    /// Pause before the next event.
    #[must_use]
    pub fn delay(mut self, duration: Duration) -> Self {
        self.events.push(MockEvent::Delay(duration));
        self
    }

    /// Pause for `ms` milliseconds.
    #[must_use]
    pub fn delay_ms(mut self, ms: u64) -> Self {
        self.events.push(MockEvent::delay_ms(ms));
        self
    }

    /// Close the device's output.
    #[must_use]
    pub fn eof(mut self) -> Self {
        self.events.push(MockEvent::Eof);
        self
    }

    /// Fail the next read with `message`.
    #[must_use]
    pub fn read_error(mut self, message: &str) -> Self {
        self.events.push(MockEvent::error(message));
        self
    }

    /// Print `response` every time the harness writes `trigger`.
    #[must_use]
    pub fn respond(mut self, trigger: &str, response: &str) -> Self {
        self.responders.push(device::Responder {
            trigger: trigger.as_bytes().to_vec(),
            response: response.as_bytes().to_vec(),
        });
        self
    }

    /// Build the connection and its device handle.
    #[must_use]
    pub fn build(self) -> (MockConnection, MockDevice) {
        device::pair(EventTimeline::from_events(self.events), self.responders)
    }
}

/// A mock device that prints `output` and then closes.
#[must_use]
pub fn replay(output: &str) -> (MockConnection, MockDevice) {
    MockBuilder::new().output(output).eof().build()
}
