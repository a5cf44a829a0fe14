//! Logical TCP segment.
//!
//! These are the in-memory structures the state machines exchange; putting
//! them on an actual wire (and computing the transport checksum) is the
//! encapsulation layer's job.  A segment's footprint in sequence space is
//! its payload length plus one for SYN and one for FIN.

use std::fmt;

use crate::wrapping::WrappingInt32;

/// Header fields the state machines care about.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TcpHeader {
    /// Sequence number of the first sequence-space position this segment
    /// occupies.
    pub seqno: WrappingInt32,
    /// `true` when `ackno` is meaningful.
    pub ack: bool,
    /// Next sequence number the sender of this segment expects to receive.
    pub ackno: WrappingInt32,
    /// Advertised receive-window size in bytes.
    pub win: u16,
    pub syn: bool,
    pub fin: bool,
    pub rst: bool,
}

impl fmt::Display for TcpHeader {
    /// Compact one-line form for logs, e.g. `S.A seq=17 ack=5 win=1000`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |on: bool, c: char| if on { c } else { '.' };
        write!(
            f,
            "{}{}{}{} seq={}",
            flag(self.syn, 'S'),
            flag(self.fin, 'F'),
            flag(self.rst, 'R'),
            flag(self.ack, 'A'),
            self.seqno,
        )?;
        if self.ack {
            write!(f, " ack={}", self.ackno)?;
        }
        write!(f, " win={}", self.win)
    }
}

/// A header plus opaque payload bytes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TcpSegment {
    pub header: TcpHeader,
    pub payload: Vec<u8>,
}

impl TcpSegment {
    /// How many sequence numbers this segment occupies: one per payload
    /// byte, plus one each for SYN and FIN.
    pub fn length_in_sequence_space(&self) -> u64 {
        self.payload.len() as u64 + u64::from(self.header.syn) + u64::from(self.header.fin)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
