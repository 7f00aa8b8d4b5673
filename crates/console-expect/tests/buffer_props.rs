//! Property tests for stream buffer consumption.

use console_expect::{Pattern, StreamBuffer};
use proptest::prelude::*;

proptest! {
    /// After a match, everything through its end is consumed and the rest
    /// is untouched.
    #[test]
    fn take_match_consumes_through_end(
        prefix in "[a-z ]{0,40}",
        needle in "[A-Z]{1,8}",
        suffix in "[a-z ]{0,40}",
    ) {
        let data = format!("{prefix}{needle}{suffix}");
        let mut buffer = StreamBuffer::new(1024);
        buffer.append(data.as_bytes());

        let pattern = Pattern::literal(needle.clone()).unwrap();
        let m = buffer.take_match(&pattern).unwrap();

        let end = usize::try_from(m.end).unwrap();
        prop_assert_eq!(m.start, prefix.len() as u64);
        prop_assert_eq!(&m.matched, &needle);
        prop_assert_eq!(&m.before, &prefix);
        prop_assert_eq!(buffer.consumed(), m.end);
        prop_assert_eq!(buffer.as_bytes(), &data.as_bytes()[end..]);
    }

    /// Offsets only grow, however the stream is chunked.
    #[test]
    fn offsets_are_monotonic(chunks in prop::collection::vec("[a-c]{0,16}", 1..20)) {
        let mut buffer = StreamBuffer::new(1024);
        let pattern = Pattern::literal("b").unwrap();
        let mut last = 0u64;

        for chunk in &chunks {
            buffer.append(chunk.as_bytes());
            while let Some(m) = buffer.take_match(&pattern) {
                prop_assert!(m.start >= last);
                prop_assert_eq!(m.end, m.start + 1);
                last = m.end;
                prop_assert_eq!(buffer.consumed(), last);
            }
        }

        let total: usize = chunks.iter().map(String::len).sum();
        prop_assert!(buffer.consumed() + buffer.as_bytes().len() as u64 == total as u64);
    }

    /// A full buffer keeps the newest bytes and accounts for the dropped ones.
    #[test]
    fn overflow_keeps_newest(data in prop::collection::vec(any::<u8>(), 0..200), max in 1usize..64) {
        let mut buffer = StreamBuffer::new(max);
        let dropped = buffer.append(&data);

        let kept = data.len().min(max);
        prop_assert_eq!(dropped, data.len() - kept);
        prop_assert_eq!(buffer.as_bytes(), &data[data.len() - kept..]);
        prop_assert_eq!(buffer.consumed(), dropped as u64);
    }
}
