//! Timeout utilities.
//!
//! This module provides deadline tracking for expectations and a small
//! extension trait for bounding teardown operations.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, Timeout, timeout, timeout_at};

/// Upper bound used when a requested timeout does not fit into an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Extension trait for adding timeouts to futures.
pub trait TimeoutExt: Sized {
    /// Wrap this future with a timeout.
    fn with_timeout(self, duration: Duration) -> Timeout<Self>;
}

impl<F: Future> TimeoutExt for F {
    fn with_timeout(self, duration: Duration) -> Timeout<Self> {
        timeout(duration, self)
    }
}

/// A fixed point in time by which an operation must finish.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    deadline: Instant,
}

impl Deadline {
    /// Create a deadline `duration` from now.
    #[must_use]
    pub fn from_now(duration: Duration) -> Self {
        let started = Instant::now();
        let deadline = started
            .checked_add(duration)
            .unwrap_or_else(|| started + FAR_FUTURE);
        Self { started, deadline }
    }

    /// Check if the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Time left until the deadline.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Time since the deadline was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Bound a future by this deadline.
    pub fn apply<F: Future>(&self, future: F) -> Timeout<F> {
        timeout_at(self.deadline, future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_deadline_is_expired_immediately() {
        let deadline = Deadline::from_now(Duration::ZERO);
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[tokio::test]
    async fn huge_duration_does_not_overflow() {
        let deadline = Deadline::from_now(Duration::MAX);
        assert!(!deadline.is_expired());
        assert!(deadline.remaining() > Duration::from_secs(60));
    }

    #[tokio::test]
    async fn apply_times_out_pending_future() {
        let deadline = Deadline::from_now(Duration::from_millis(10));
        let result = deadline.apply(std::future::pending::<()>()).await;
        assert!(result.is_err());
        assert!(deadline.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn timeout_ext() {
        let result = async { 42 }.with_timeout(Duration::from_secs(1)).await;
        assert_eq!(result.unwrap(), 42);
    }
}
