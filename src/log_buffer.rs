//! Bounded per-process scrollback, reassembled on line boundaries from raw pipe chunks.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

/// Maximum number of committed lines retained per process.
pub const CAPACITY: usize = 1000;

/// One committed line of captured output, without its trailing newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Raw line bytes. Content is opaque and may be invalid UTF-8.
    pub text: Vec<u8>,
    /// Wall-clock milliseconds since the Unix epoch at commit time.
    pub timestamp: u64,
}

impl LogLine {
    /// Lossy UTF-8 view for display layers.
    #[must_use]
    pub fn text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.text)
    }
}

/// Ring of committed lines plus the unterminated tail of the stream.
///
/// A chunk appended with K newlines commits exactly K lines; bytes after the
/// last newline stay in the partial accumulator and are not visible until
/// their terminator arrives. Once full, committing a line drops the oldest
/// one, so index 0 always means "oldest visible now".
#[derive(Debug, Default)]
pub struct LogBuffer {
    lines: VecDeque<LogLine>,
    partial: Vec<u8>,
}

impl LogBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a raw chunk, committing every newline-terminated line.
    ///
    /// Chunk boundaries are arbitrary: a line split across appends (including
    /// mid-UTF-8) is reassembled through the partial accumulator.
    pub fn append(&mut self, bytes: &[u8]) {
        let mut rest = bytes;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let mut text = std::mem::take(&mut self.partial);
            text.extend_from_slice(&rest[..pos]);
            self.commit(text);
            rest = &rest[pos + 1..];
        }
        self.partial.extend_from_slice(rest);
    }

    fn commit(&mut self, text: Vec<u8>) {
        if self.lines.len() == CAPACITY {
            self.lines.pop_front();
        }
        self.lines.push_back(LogLine {
            text,
            timestamp: now_millis(),
        });
    }

    /// Line at logical index `i`, 0 being the oldest visible line.
    #[must_use]
    pub fn line(&self, i: usize) -> Option<&LogLine> {
        self.lines.get(i)
    }

    /// Number of committed lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines `[start, min(end, len))` concatenated, each followed by a newline.
    #[must_use]
    pub fn text_range(&self, start: usize, end: usize) -> Vec<u8> {
        let end = end.min(self.lines.len());
        let mut out = Vec::new();
        for i in start..end {
            out.extend_from_slice(&self.lines[i].text);
            out.push(b'\n');
        }
        out
    }

    /// Every committed line, each followed by a newline.
    #[must_use]
    pub fn all_text(&self) -> Vec<u8> {
        self.text_range(0, self.lines.len())
    }

    /// Drop all committed lines and any partial bytes.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.partial.clear();
    }

    /// Forward iteration over committed lines, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter()
    }

    /// Forward iteration starting at logical index `i`.
    pub fn iter_from(&self, i: usize) -> impl Iterator<Item = &LogLine> {
        self.lines.iter().skip(i)
    }
}

fn now_millis() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    millis.min(u128::from(u64::MAX)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn committed(buffer: &LogBuffer) -> Vec<Vec<u8>> {
        buffer.iter().map(|line| line.text.clone()).collect()
    }

    #[test]
    fn append_commits_one_line_per_newline() {
        let mut buffer = LogBuffer::new();
        buffer.append(b"line1\nline2\nline3\n");
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.line(0).map(|l| l.text.as_slice()), Some(&b"line1"[..]));
        assert_eq!(buffer.line(2).map(|l| l.text.as_slice()), Some(&b"line3"[..]));
        assert!(buffer.line(3).is_none());
    }

    #[test]
    fn trailing_bytes_stay_invisible_until_terminated() {
        let mut buffer = LogBuffer::new();
        buffer.append(b"hel");
        assert_eq!(buffer.len(), 0);
        buffer.append(b"lo\n");
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.line(0).map(|l| l.text.as_slice()), Some(&b"hello"[..]));
    }

    #[test]
    fn committed_lines_never_contain_newlines() {
        let mut buffer = LogBuffer::new();
        buffer.append(b"a\n\nb\nc");
        for line in buffer.iter() {
            assert!(!line.text.contains(&b'\n'));
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.line(1).map(|l| l.text.as_slice()), Some(&b""[..]));
    }

    #[test]
    fn overflow_keeps_the_newest_capacity_lines_in_order() {
        let mut buffer = LogBuffer::new();
        for i in 1..=(CAPACITY + 50) {
            buffer.append(format!("{i}\n").as_bytes());
        }
        assert_eq!(buffer.len(), CAPACITY);
        assert_eq!(buffer.line(0).map(|l| l.text.as_slice()), Some(&b"51"[..]));
        assert_eq!(
            buffer.line(CAPACITY - 1).map(|l| l.text.clone()),
            Some(format!("{}", CAPACITY + 50).into_bytes())
        );
    }

    #[test]
    fn all_text_round_trips_terminated_input() {
        let mut buffer = LogBuffer::new();
        buffer.append(b"one\ntwo\nthree\ntail");
        assert_eq!(buffer.all_text(), b"one\ntwo\nthree\n".to_vec());
    }

    #[test]
    fn text_range_clamps_end_to_len() {
        let mut buffer = LogBuffer::new();
        buffer.append(b"a\nb\n");
        assert_eq!(buffer.text_range(1, 99), b"b\n".to_vec());
        assert!(buffer.text_range(2, 99).is_empty());
    }

    #[test]
    fn clear_drops_committed_lines_and_partial() {
        let mut buffer = LogBuffer::new();
        buffer.append(b"done\nhalf");
        buffer.clear();
        assert_eq!(buffer.len(), 0);
        buffer.append(b"way\n");
        assert_eq!(buffer.line(0).map(|l| l.text.as_slice()), Some(&b"way"[..]));
    }

    #[test]
    fn mid_utf8_chunk_boundaries_reassemble_byte_for_byte() {
        let text = "héllo wörld\n".as_bytes();
        let mut buffer = LogBuffer::new();
        // Split inside the two-byte sequences.
        buffer.append(&text[..2]);
        buffer.append(&text[2..9]);
        buffer.append(&text[9..]);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.line(0).map(|l| l.text.as_slice()), Some(&text[..text.len() - 1]));
    }

    #[test]
    fn iter_from_skips_older_lines() {
        let mut buffer = LogBuffer::new();
        buffer.append(b"a\nb\nc\n");
        let tail: Vec<&[u8]> = buffer.iter_from(1).map(|l| l.text.as_slice()).collect();
        assert_eq!(tail, vec![&b"b"[..], &b"c"[..]]);
    }

    proptest! {
        #[test]
        fn chunked_append_matches_whole_append(
            bytes in proptest::collection::vec(any::<u8>(), 0..512),
            cuts in proptest::collection::vec(0usize..512, 0..8),
        ) {
            let mut whole = LogBuffer::new();
            whole.append(&bytes);

            let mut cuts: Vec<usize> = cuts.into_iter().map(|c| c.min(bytes.len())).collect();
            cuts.sort_unstable();
            let mut chunked = LogBuffer::new();
            let mut start = 0;
            for cut in cuts {
                chunked.append(&bytes[start..cut.max(start)]);
                start = cut.max(start);
            }
            chunked.append(&bytes[start..]);
            prop_assert_eq!(committed(&whole), committed(&chunked));

            // Terminating both flushes the partial accumulator; the tails
            // must have been identical too.
            whole.append(b"\n");
            chunked.append(b"\n");
            prop_assert_eq!(committed(&whole), committed(&chunked));
        }

        #[test]
        fn len_is_newline_count_capped_at_capacity(
            bytes in proptest::collection::vec(any::<u8>(), 0..4096),
        ) {
            let newlines = bytes.iter().filter(|&&b| b == b'\n').count();
            let mut buffer = LogBuffer::new();
            buffer.append(&bytes);
            prop_assert_eq!(buffer.len(), newlines.min(CAPACITY));
        }
    }
}
