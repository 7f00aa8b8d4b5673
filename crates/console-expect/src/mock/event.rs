//! Events played back by the mock device.

use std::time::Duration;

/// Something the mock device does, in timeline order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    /// Bytes the device prints.
    Output(Vec<u8>),
    /// Pause before the next event.
    Delay(Duration),
    /// The device closes its output.
    Eof,
    /// The next read fails with this message.
    Error(String),
}

impl MockEvent {
    /// Create an output event from bytes.
    pub fn output(data: impl Into<Vec<u8>>) -> Self {
        Self::Output(data.into())
    }

    /// Create an output event from a string.
    #[must_use]
    pub fn output_str(s: &str) -> Self {
        Self::Output(s.as_bytes().to_vec())
    }

    /// Create a delay event from milliseconds.
    #[must_use]
    pub const fn delay_ms(ms: u64) -> Self {
        Self::Delay(Duration::from_millis(ms))
    }

    /// Create a read error event.
    pub fn error(msg: impl Into<String>) -> Self {
        Self::Error(msg.into())
    }

    /// Check if this is an output event.
    #[must_use]
    pub const fn is_output(&self) -> bool {
        matches!(self, Self::Output(_))
    }
}

/// A timeline of events for a mock device.
#[derive(Debug, Clone, Default)]
pub struct EventTimeline {
    events: Vec<MockEvent>,
    position: usize,
}

impl EventTimeline {
    /// Create a timeline from a list of events.
    #[must_use]
    pub const fn from_events(events: Vec<MockEvent>) -> Self {
        Self {
            events,
            position: 0,
        }
    }

    /// Add an event to the end of the timeline.
    pub fn push(&mut self, event: MockEvent) {
        self.events.push(event);
    }

    /// Take the next event.
    pub fn next_event(&mut self) -> Option<MockEvent> {
        let event = self.events.get(self.position).cloned()?;
        self.position += 1;
        Some(event)
    }

    /// Get the number of remaining events.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.events.len().saturating_sub(self.position)
    }

    /// Rewind to the first event, for replaying the same output again.
    pub fn reset(&mut self) {
        self.position = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_in_order() {
        let mut timeline = EventTimeline::default();
        timeline.push(MockEvent::output_str("3rd\n"));
        timeline.push(MockEvent::delay_ms(5));
        timeline.push(MockEvent::Eof);

        assert!(timeline.next_event().unwrap().is_output());
        assert_eq!(timeline.next_event(), Some(MockEvent::delay_ms(5)));
        assert_eq!(timeline.next_event(), Some(MockEvent::Eof));
        assert_eq!(timeline.next_event(), None);
    }

    #[test]
    fn timeline_reset() {
        let mut timeline =
            EventTimeline::from_events(vec![MockEvent::output_str("test"), MockEvent::Eof]);

        assert_eq!(timeline.remaining(), 2);
        timeline.next_event();
        assert_eq!(timeline.remaining(), 1);
        timeline.reset();
        assert_eq!(timeline.remaining(), 2);
    }
}
