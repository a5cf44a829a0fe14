//! Out-of-order byte-range reassembly.
//!
//! The network may deliver the pieces of a byte stream in any order, with
//! duplication and overlap.  [`StreamReassembler`] accepts substrings tagged
//! with their absolute stream index, holds the out-of-order ones, and pushes
//! the longest contiguous prefix into its output [`ByteStream`] as gaps are
//! filled.
//!
//! # Capacity discipline
//!
//! One `capacity` bounds the *sum* of bytes sitting in the output stream's
//! buffer and bytes pending reassembly.  Anything past
//! `first_unassembled + (capacity - output.buffer_size())` is cut off at
//! ingest, which also caps how far the acceptance window can run ahead of
//! the reader.

use std::collections::BTreeMap;

use crate::byte_stream::ByteStream;

/// Reassembles tagged substrings into a contiguous byte stream.
#[derive(Debug)]
pub struct StreamReassembler {
    output: ByteStream,
    capacity: usize,
    /// Absolute index of the next byte to hand to the output stream.
    first_unassembled: u64,
    /// Pending non-overlapping blocks, keyed by absolute start index.
    blocks: BTreeMap<u64, Vec<u8>>,
    /// Total bytes across `blocks`.
    unassembled: usize,
    /// Absolute index one past the final byte, once the end is known.
    eof_at: Option<u64>,
}

impl StreamReassembler {
    /// Create a reassembler whose output stream shares the same `capacity`.
    pub fn new(capacity: usize) -> Self {
        Self {
            output: ByteStream::new(capacity),
            capacity,
            first_unassembled: 0,
            blocks: BTreeMap::new(),
            unassembled: 0,
            eof_at: None,
        }
    }

    /// Accept a substring of the stream starting at absolute `index`.
    ///
    /// Bytes already assembled and bytes beyond the acceptance window are
    /// discarded.  `eof` marks `data` as ending the stream; the end index is
    /// only recorded when the tail of `data` survives window truncation.
    pub fn push_substring(&mut self, data: &[u8], index: u64, eof: bool) {
        let window_end =
            self.first_unassembled + (self.capacity - self.output.buffer_size()) as u64;
        let end = index + data.len() as u64;

        if eof && end <= window_end {
            self.eof_at = Some(end);
        }

        let start = index.max(self.first_unassembled);
        let stop = end.min(window_end);
        if start < stop {
            let lo = (start - index) as usize;
            let hi = (stop - index) as usize;
            self.insert_block(start, &data[lo..hi]);
        }

        self.assemble();

        if self.eof_at == Some(self.first_unassembled) {
            self.output.end_input();
        }
    }

    /// Merge `data` (starting at absolute index `abs`) into the pending
    /// blocks, keeping already-stored bytes wherever ranges overlap.
    fn insert_block(&mut self, abs: u64, data: &[u8]) {
        let mut start = abs;
        let end = abs + data.len() as u64;

        // A predecessor block may cover our head (or all of us).
        if let Some((&prev_start, prev_data)) = self.blocks.range(..=start).next_back() {
            let prev_end = prev_start + prev_data.len() as u64;
            if prev_end >= end {
                return;
            }
            start = start.max(prev_end);
        }

        // Walk the blocks that begin inside [start, end), storing only the
        // gaps between them.
        while start < end {
            let next = self
                .blocks
                .range(start..end)
                .next()
                .map(|(&s, d)| (s, d.len() as u64));
            match next {
                Some((next_start, next_len)) => {
                    if next_start > start {
                        let lo = (start - abs) as usize;
                        let hi = (next_start - abs) as usize;
                        self.store(start, &data[lo..hi]);
                    }
                    start = next_start + next_len;
                }
                None => {
                    self.store(start, &data[(start - abs) as usize..]);
                    break;
                }
            }
        }
    }

    fn store(&mut self, at: u64, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.unassembled += bytes.len();
        self.blocks.insert(at, bytes.to_vec());
    }

    /// Drain every block that now lines up with `first_unassembled` into the
    /// output stream.
    fn assemble(&mut self) {
        while let Some((&start, _)) = self.blocks.first_key_value() {
            if start != self.first_unassembled {
                break;
            }
            let data = match self.blocks.pop_first() {
                Some((_, data)) => data,
                None => break,
            };
            let written = self.output.write(&data);
            self.unassembled -= written;
            self.first_unassembled += written as u64;
            if written < data.len() {
                // Output full; park the tail until the reader catches up.
                self.blocks
                    .insert(self.first_unassembled, data[written..].to_vec());
                break;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Bytes held back waiting for earlier gaps to fill.
    pub fn unassembled_bytes(&self) -> usize {
        self.unassembled
    }

    /// `true` when nothing is pending reassembly.
    pub fn empty(&self) -> bool {
        self.unassembled == 0
    }

    /// Absolute index of the next byte the output stream is owed.
    pub fn first_unassembled(&self) -> u64 {
        self.first_unassembled
    }

    pub fn output(&self) -> &ByteStream {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut ByteStream {
        &mut self.output
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(r: &mut StreamReassembler) -> Vec<u8> {
        let n = r.output().buffer_size();
        r.output_mut().read(n)
    }

    #[test]
    fn in_order_substrings_flow_straight_through() {
        let mut r = StreamReassembler::new(64);
        r.push_substring(b"abc", 0, false);
        r.push_substring(b"def", 3, false);
        assert_eq!(read_all(&mut r), b"abcdef");
        assert_eq!(r.unassembled_bytes(), 0);
        assert_eq!(r.first_unassembled(), 6);
    }

    #[test]
    fn out_of_order_substring_waits_for_the_gap() {
        let mut r = StreamReassembler::new(64);
        r.push_substring(b"def", 3, false);
        assert_eq!(r.output().buffer_size(), 0);
        assert_eq!(r.unassembled_bytes(), 3);

        r.push_substring(b"abc", 0, false);
        assert_eq!(read_all(&mut r), b"abcdef");
        assert_eq!(r.unassembled_bytes(), 0);
    }

    #[test]
    fn every_permutation_of_three_chunks_assembles() {
        let chunks: [(&[u8], u64); 3] = [(b"ab", 0), (b"cde", 2), (b"fg", 5)];
        let orders = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        for order in orders {
            let mut r = StreamReassembler::new(64);
            for &i in &order {
                let (data, index) = chunks[i];
                r.push_substring(data, index, false);
            }
            assert_eq!(read_all(&mut r), b"abcdefg", "order {order:?}");
        }
    }

    #[test]
    fn overlapping_inputs_keep_existing_bytes() {
        let mut r = StreamReassembler::new(64);
        r.push_substring(b"bcd", 1, false);
        // Overlaps [1, 4) entirely and extends both sides; stored bytes win.
        r.push_substring(b"aXYZe", 0, false);
        assert_eq!(read_all(&mut r), b"abcde");
    }

    #[test]
    fn duplicate_substring_is_a_no_op() {
        let mut r = StreamReassembler::new(64);
        r.push_substring(b"abc", 0, false);
        r.push_substring(b"abc", 0, false);
        assert_eq!(r.output().bytes_written(), 3);
        assert_eq!(read_all(&mut r), b"abc");
    }

    #[test]
    fn already_assembled_prefix_is_discarded() {
        let mut r = StreamReassembler::new(64);
        r.push_substring(b"abc", 0, false);
        // First two bytes are old news; only "d" is new.
        r.push_substring(b"bcd", 1, false);
        assert_eq!(read_all(&mut r), b"abcd");
    }

    #[test]
    fn bytes_beyond_the_window_are_truncated() {
        let mut r = StreamReassembler::new(4);
        r.push_substring(b"abcdef", 0, false);
        assert_eq!(read_all(&mut r), b"abcd");
        // The cut tail was dropped, not stored.
        assert_eq!(r.unassembled_bytes(), 0);
        // Window has slid; the rest can arrive again.
        r.push_substring(b"ef", 4, false);
        assert_eq!(read_all(&mut r), b"ef");
    }

    #[test]
    fn pending_plus_buffered_never_exceed_capacity() {
        let mut r = StreamReassembler::new(8);
        r.push_substring(b"abcd", 0, false); // buffered, unread
        r.push_substring(b"ijkl", 8, false); // would land past the window
        assert!(r.output().buffer_size() + r.unassembled_bytes() <= 8);
        r.push_substring(b"ghij", 6, false); // partially fits
        assert!(r.output().buffer_size() + r.unassembled_bytes() <= 8);
    }

    #[test]
    fn eof_ends_the_output_once_everything_arrives() {
        let mut r = StreamReassembler::new(64);
        r.push_substring(b"def", 3, true);
        assert!(!r.output().input_ended());
        r.push_substring(b"abc", 0, false);
        assert!(r.output().input_ended());
        assert_eq!(read_all(&mut r), b"abcdef");
        assert!(r.output().eof());
    }

    #[test]
    fn empty_substring_with_eof_ends_the_stream() {
        let mut r = StreamReassembler::new(64);
        r.push_substring(b"ab", 0, false);
        r.push_substring(b"", 2, true);
        assert!(r.output().input_ended());
    }

    #[test]
    fn truncated_eof_suffix_forgets_the_eof() {
        let mut r = StreamReassembler::new(4);
        // The tail carrying the end marker does not fit; the end index must
        // not be recorded.
        r.push_substring(b"abcdef", 0, true);
        assert_eq!(read_all(&mut r), b"abcd");
        assert!(!r.output().input_ended());
        // Retransmission of the surviving tail ends the stream.
        r.push_substring(b"ef", 4, true);
        assert!(r.output().input_ended());
    }

    #[test]
    fn window_stalls_while_output_is_unread() {
        let mut r = StreamReassembler::new(4);
        r.push_substring(b"abcd", 0, false);
        // Output buffer holds the full capacity; nothing more fits.
        r.push_substring(b"ef", 4, false);
        assert_eq!(r.unassembled_bytes(), 0);
        assert_eq!(read_all(&mut r), b"abcd");
        r.push_substring(b"ef", 4, false);
        assert_eq!(read_all(&mut r), b"ef");
    }
}
