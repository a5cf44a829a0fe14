//! Receive half of a TCP connection.
//!
//! [`TcpReceiver`] turns arriving segments into an in-order inbound byte
//! stream and produces the two values every outbound segment advertises
//! back to the peer:
//!
//! - `ackno`: the next sequence number expected, counting SYN and FIN.
//!   Undefined until the first SYN arrives.
//! - `window_size`: how much more the inbound stream can absorb, so the
//!   peer's sender never overruns our buffer.
//!
//! The receiver does not send anything itself; the connection layer stamps
//! its values onto whatever segments the send side produces.

use crate::reassembler::StreamReassembler;
use crate::byte_stream::ByteStream;
use crate::segment::TcpSegment;
use crate::wrapping::{unwrap, wrap, WrappingInt32};

/// Receive-side state for one connection.
#[derive(Debug)]
pub struct TcpReceiver {
    reassembler: StreamReassembler,
    capacity: usize,
    /// Peer's initial sequence number, learned from the first SYN.
    isn: Option<WrappingInt32>,
}

impl TcpReceiver {
    /// Create a receiver able to buffer `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            reassembler: StreamReassembler::new(capacity),
            capacity,
            isn: None,
        }
    }

    /// Process one arriving segment.
    ///
    /// Before the first SYN, everything else is dropped.  Afterwards the
    /// segment's sequence number is resolved against the next expected
    /// absolute position, checked against the window, and its payload (and
    /// FIN) handed to the reassembler.
    pub fn segment_received(&mut self, seg: &TcpSegment) {
        let header = &seg.header;

        let isn = match self.isn {
            Some(isn) => isn,
            None => {
                if !header.syn {
                    return; // not synchronised yet
                }
                self.isn = Some(header.seqno);
                header.seqno
            }
        };

        let checkpoint = self.abs_ackno();
        let abs_seqno = unwrap(header.seqno, isn, checkpoint);

        // Only a SYN may claim absolute position zero; payload there is
        // bogus and its stream index would underflow.
        if abs_seqno == 0 && !header.syn {
            return;
        }
        // Entirely beyond the window.
        if abs_seqno >= checkpoint + self.window_size() as u64 {
            return;
        }
        // Nothing that occupies sequence space: pure ACK or window probe
        // carrier, handled (if at all) at the connection layer.
        if seg.length_in_sequence_space() == 0 {
            return;
        }

        // SYN occupies the position before payload byte zero.
        let stream_index = abs_seqno + u64::from(header.syn) - 1;
        self.reassembler
            .push_substring(&seg.payload, stream_index, header.fin);
    }

    /// Absolute sequence number of the next byte (or FIN) expected:
    /// one for the SYN, plus bytes written, plus one once FIN is in.
    fn abs_ackno(&self) -> u64 {
        let stream = self.reassembler.output();
        stream.bytes_written() + 1 + u64::from(stream.input_ended())
    }

    /// The acknowledgment number to advertise, once a SYN has arrived.
    pub fn ackno(&self) -> Option<WrappingInt32> {
        self.isn.map(|isn| wrap(self.abs_ackno(), isn))
    }

    /// Receive window: capacity minus bytes buffered but not yet read.
    pub fn window_size(&self) -> usize {
        self.capacity - self.reassembler.output().buffer_size()
    }

    /// Bytes accepted out of order, still waiting for earlier gaps.
    pub fn unassembled_bytes(&self) -> usize {
        self.reassembler.unassembled_bytes()
    }

    /// The reassembled inbound stream.
    pub fn stream_out(&self) -> &ByteStream {
        self.reassembler.output()
    }

    pub fn stream_out_mut(&mut self) -> &mut ByteStream {
        self.reassembler.output_mut()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
