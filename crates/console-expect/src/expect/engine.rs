//! The expectation engine.
//!
//! [`ExpectEngine`] waits for a pattern to show up in the output the
//! transport reader has buffered. The reader and the engine share one
//! [`SharedStream`]: the reader appends and closes, the engine matches and
//! consumes, and both go through the same lock. Waiting is edge-triggered:
//! the reader wakes all waiters after every append and on closure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;

use super::buffer::StreamBuffer;
use super::pattern::Pattern;
use crate::error::{ExpectError, Result};
use crate::types::{CloseReason, ExpectOutcome, Match};
use crate::util::Deadline;

/// Buffer plus closure flag, guarded together.
#[derive(Debug)]
pub(crate) struct StreamState {
    pub(crate) buffer: StreamBuffer,
    pub(crate) closed: Option<CloseReason>,
}

/// State shared by the transport reader and the expectation engine.
#[derive(Debug)]
pub(crate) struct SharedStream {
    state: Mutex<StreamState>,
    notify: Notify,
    busy: AtomicBool,
}

impl SharedStream {
    pub(crate) fn new(max_size: usize) -> Self {
        Self {
            state: Mutex::new(StreamState {
                buffer: StreamBuffer::new(max_size),
                closed: None,
            }),
            notify: Notify::new(),
            busy: AtomicBool::new(false),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a received chunk and wake waiters.
    pub(crate) fn append(&self, chunk: &[u8]) {
        let dropped = self.lock().buffer.append(chunk);
        if dropped > 0 {
            tracing::warn!(dropped, "output buffer full, discarding oldest unconsumed bytes");
        }
        tracing::trace!(bytes = chunk.len(), "buffered output");
        self.notify.notify_waiters();
    }

    /// Mark the stream closed. Only the first reason is kept.
    pub(crate) fn close(&self, reason: CloseReason) -> bool {
        let first = {
            let mut state = self.lock();
            if state.closed.is_none() {
                state.closed = Some(reason.clone());
                true
            } else {
                false
            }
        };
        if first {
            tracing::debug!(%reason, "stream closed");
        }
        self.notify.notify_waiters();
        first
    }

    pub(crate) fn close_reason(&self) -> Option<CloseReason> {
        self.lock().closed.clone()
    }

    pub(crate) fn tail(&self, n: usize) -> String {
        self.lock().buffer.tail(n)
    }
}

/// Marks the engine busy for as long as it lives.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ExpectError::EngineBusy)?;
        Ok(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Matches patterns against a connection's buffered output.
///
/// Handles are cheap to clone and all refer to the same buffer. At most one
/// expectation may be outstanding per connection; a concurrent call fails
/// with [`ExpectError::EngineBusy`].
#[derive(Debug, Clone)]
pub struct ExpectEngine {
    shared: Arc<SharedStream>,
}

impl ExpectEngine {
    pub(crate) const fn new(shared: Arc<SharedStream>) -> Self {
        Self { shared }
    }

    /// Wait until `pattern` appears in the unconsumed output.
    ///
    /// On a match the buffer is consumed through the end of the match. On a
    /// timeout nothing is consumed. A zero timeout checks the current buffer
    /// once and never waits. Buffered output is always checked before a
    /// closure is reported, so data that arrived just before EOF still
    /// matches.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::EngineBusy`] if another expectation is pending.
    pub async fn expect(&self, pattern: &Pattern, timeout: Duration) -> Result<ExpectOutcome> {
        let _busy = BusyGuard::acquire(&self.shared.busy)?;
        let deadline = Deadline::from_now(timeout);

        loop {
            // Register for wakeups before looking at the buffer so an append
            // between the check and the wait is not missed.
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(outcome) = self.resolve(pattern, timeout, &deadline) {
                return Ok(outcome);
            }

            // Either woken by the reader or the deadline passed; the next
            // resolve() decides which.
            let _ = deadline.apply(notified).await;
        }
    }

    /// Like [`expect`](Self::expect), but timeouts and closures are errors.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Timeout`], [`ExpectError::StreamClosed`] or
    /// [`ExpectError::EngineBusy`].
    pub async fn expect_match(&self, pattern: &Pattern, timeout: Duration) -> Result<Match> {
        self.expect(pattern, timeout)
            .await?
            .into_result(pattern.as_str())
    }

    /// Check the current buffer once without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::EngineBusy`] if another expectation is pending.
    pub fn check(&self, pattern: &Pattern) -> Result<ExpectOutcome> {
        let _busy = BusyGuard::acquire(&self.shared.busy)?;
        let deadline = Deadline::from_now(Duration::ZERO);
        Ok(self
            .resolve(pattern, Duration::ZERO, &deadline)
            .unwrap_or_else(|| ExpectOutcome::Timeout {
                duration: Duration::ZERO,
                buffer: self.shared.lock().buffer.as_str_lossy(),
            }))
    }

    /// The last `n` bytes of unconsumed output.
    #[must_use]
    pub fn buffer_tail(&self, n: usize) -> String {
        self.shared.tail(n)
    }

    /// Absolute stream offset of the consumption point.
    #[must_use]
    pub fn consumed(&self) -> u64 {
        self.shared.lock().buffer.consumed()
    }

    /// Check if the stream has closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.close_reason().is_some()
    }

    fn resolve(
        &self,
        pattern: &Pattern,
        timeout: Duration,
        deadline: &Deadline,
    ) -> Option<ExpectOutcome> {
        let mut state = self.shared.lock();

        if let Some(m) = state.buffer.take_match(pattern) {
            tracing::debug!(%pattern, start = m.start, end = m.end, "pattern matched");
            return Some(ExpectOutcome::Matched(m));
        }

        if let Some(reason) = state.closed.clone() {
            tracing::debug!(%pattern, %reason, "stream closed before match");
            return Some(ExpectOutcome::Closed {
                reason,
                buffer: state.buffer.as_str_lossy(),
            });
        }

        if deadline.is_expired() {
            tracing::debug!(%pattern, ?timeout, "expectation timed out");
            return Some(ExpectOutcome::Timeout {
                duration: timeout,
                buffer: state.buffer.as_str_lossy(),
            });
        }

        None
    }
}
