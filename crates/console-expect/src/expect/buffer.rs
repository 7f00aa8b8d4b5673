//! Buffer of received-but-unconsumed console output.
//!
//! The buffer only ever grows at the back (reader appends) and shrinks at the
//! front (a successful match consumes through its end). Absolute stream
//! offsets stay valid across consumption, so a match can report where in the
//! whole session it happened.

use std::fmt;

use super::pattern::{Pattern, PatternMatch};
use crate::types::Match;

/// Default buffer capacity (1 MB).
pub const DEFAULT_CAPACITY: usize = 1024 * 1024;

/// Unconsumed console output.
#[derive(Clone)]
pub struct StreamBuffer {
    /// Unconsumed bytes, oldest first.
    data: Vec<u8>,
    /// Maximum number of unconsumed bytes kept.
    max_size: usize,
    /// Absolute stream offset of `data[0]`.
    offset: u64,
    /// Total bytes ever appended.
    total_written: u64,
    /// Bytes dropped because the buffer was full.
    bytes_discarded: u64,
}

impl StreamBuffer {
    /// Create a buffer holding at most `max_size` unconsumed bytes.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            data: Vec::with_capacity(max_size.min(64 * 1024)),
            max_size: max_size.max(1),
            offset: 0,
            total_written: 0,
            bytes_discarded: 0,
        }
    }

    /// Append received bytes.
    ///
    /// Returns the number of old bytes that had to be dropped to stay within
    /// `max_size`. Those bytes count as consumed: offsets keep increasing.
    pub fn append(&mut self, chunk: &[u8]) -> usize {
        self.total_written += chunk.len() as u64;
        self.data.extend_from_slice(chunk);

        let overflow = self.data.len().saturating_sub(self.max_size);
        if overflow > 0 {
            self.data.drain(..overflow);
            self.offset += overflow as u64;
            self.bytes_discarded += overflow as u64;
        }
        overflow
    }

    /// Unconsumed bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Unconsumed output as text (lossy UTF-8 conversion).
    #[must_use]
    pub fn as_str_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// Number of unconsumed bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if nothing is waiting to be matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Absolute stream offset of the consumption point.
    #[must_use]
    pub const fn consumed(&self) -> u64 {
        self.offset
    }

    /// Total bytes ever appended.
    #[must_use]
    pub const fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Bytes dropped because the buffer was full.
    #[must_use]
    pub const fn bytes_discarded(&self) -> u64 {
        self.bytes_discarded
    }

    /// Maximum number of unconsumed bytes kept.
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Search the unconsumed bytes without consuming anything.
    #[must_use]
    pub fn find(&self, pattern: &Pattern) -> Option<PatternMatch> {
        pattern.find(&self.data)
    }

    /// Consume everything up to and including the end of `found`.
    pub fn consume_match(&mut self, found: PatternMatch) -> Match {
        let end = found.end.min(self.data.len());
        let start = found.start.min(end);
        let consumed: Vec<u8> = self.data.drain(..end).collect();

        let m = Match {
            matched: String::from_utf8_lossy(&consumed[start..]).into_owned(),
            captures: found.captures,
            before: String::from_utf8_lossy(&consumed[..start]).into_owned(),
            start: self.offset + start as u64,
            end: self.offset + end as u64,
        };
        self.offset += end as u64;
        m
    }

    /// Find `pattern` and consume through the end of the match.
    pub fn take_match(&mut self, pattern: &Pattern) -> Option<Match> {
        let found = self.find(pattern)?;
        Some(self.consume_match(found))
    }

    /// The last `n` unconsumed bytes as text, for diagnostics.
    #[must_use]
    pub fn tail(&self, n: usize) -> String {
        let start = self.data.len().saturating_sub(n);
        String::from_utf8_lossy(&self.data[start..]).into_owned()
    }
}

impl Default for StreamBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl fmt::Debug for StreamBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamBuffer")
            .field("len", &self.len())
            .field("max_size", &self.max_size)
            .field("consumed", &self.offset)
            .field("total_written", &self.total_written)
            .field("bytes_discarded", &self.bytes_discarded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> Pattern {
        Pattern::literal(s).unwrap()
    }

    #[test]
    fn literal_match_consumes_through_end() {
        let mut buf = StreamBuffer::new(1024);
        buf.append(b"starting test\ntrue\n");

        let m = buf.take_match(&lit("starting test")).unwrap();
        assert_eq!(m.before, "");
        assert_eq!(m.matched, "starting test");
        assert_eq!(m.end, 13);
        assert_eq!(buf.as_str_lossy(), "\ntrue\n");
        assert_eq!(buf.consumed(), 13);
    }

    #[test]
    fn consumed_bytes_are_never_rescanned() {
        let mut buf = StreamBuffer::new(1024);
        buf.append(b"3rd\n2nd\n");
        assert!(buf.take_match(&lit("2nd")).is_some());
        // "3rd" came before "2nd" and is gone now.
        assert!(buf.take_match(&lit("3rd")).is_none());
    }

    #[test]
    fn offsets_are_absolute() {
        let mut buf = StreamBuffer::new(1024);
        buf.append(b"aaOKbb");
        let first = buf.take_match(&lit("OK")).unwrap();
        assert_eq!((first.start, first.end), (2, 4));

        buf.append(b"OK");
        let second = buf.take_match(&lit("OK")).unwrap();
        assert_eq!(second.before, "bb");
        assert_eq!((second.start, second.end), (6, 8));
        assert_eq!(buf.total_written(), 8);
    }

    #[test]
    fn find_does_not_consume() {
        let mut buf = StreamBuffer::new(1024);
        buf.append(b"hello");
        assert!(buf.find(&lit("hello")).is_some());
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn overflow_discards_oldest() {
        let mut buf = StreamBuffer::new(10);
        buf.append(b"12345");
        buf.append(b"67890");
        let dropped = buf.append(b"abc");

        assert_eq!(dropped, 3);
        assert_eq!(buf.as_str_lossy(), "4567890abc");
        assert_eq!(buf.consumed(), 3);
        assert_eq!(buf.bytes_discarded(), 3);
    }

    #[test]
    fn tail_returns_last_bytes() {
        let mut buf = StreamBuffer::new(100);
        buf.append(b"hello world");
        assert_eq!(buf.tail(5), "world");
        assert_eq!(buf.tail(500), "hello world");
    }
}
