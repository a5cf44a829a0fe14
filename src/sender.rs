//! Send half of a TCP connection.
//!
//! [`TcpSender`] reads from its outbound [`ByteStream`] and produces
//! segments that respect the window the peer last advertised, tracking
//! everything sent-but-unacknowledged for retransmission.
//!
//! # Sequence-number layout
//!
//! ```text
//!  ack_abs_seqno      next_seqno
//!       |                 |
//!  -----+-----------------+------------------> absolute sequence space
//!       | <- in flight -> | <- sendable up to the window's right edge
//! ```
//!
//! Absolute position 0 is the SYN; payload bytes start at 1; FIN takes the
//! position after the last payload byte.
//!
//! # Retransmission discipline
//!
//! One timer covers the oldest outstanding segment.  On expiry that segment
//! is re-sent, the timer restarts, and the timeout doubles (exponential
//! backoff) unless the peer's window is zero, in which case the expiry was a
//! window probe and the timeout holds steady.  Any ACK that moves the left
//! window edge resets the timeout to its initial value.
//!
//! This module only manages state; delivering the segments queued in
//! `segments_out` is the caller's responsibility.

use std::collections::VecDeque;

use rand::Rng;

use crate::byte_stream::ByteStream;
use crate::segment::{TcpHeader, TcpSegment};
use crate::wrapping::{unwrap, wrap, WrappingInt32};

// ---------------------------------------------------------------------------
// OutstandingSegment
// ---------------------------------------------------------------------------

/// A sent-but-unacknowledged segment awaiting its cumulative ACK.
#[derive(Debug, Clone)]
struct OutstandingSegment {
    /// Absolute sequence number of the segment's first position.
    abs_seqno: u64,
    segment: TcpSegment,
    /// Total number of times this segment has been transmitted.
    tx_count: u32,
}

impl OutstandingSegment {
    /// Absolute sequence number one past this segment's last position.
    fn end_abs_seqno(&self) -> u64 {
        self.abs_seqno + self.segment.length_in_sequence_space()
    }
}

// ---------------------------------------------------------------------------
// TcpSender
// ---------------------------------------------------------------------------

/// Send-side state for one connection.
#[derive(Debug)]
pub struct TcpSender {
    isn: WrappingInt32,
    /// Application bytes waiting to be segmented.
    stream: ByteStream,
    /// Segments ready for the caller to transmit, oldest first.
    segments_out: VecDeque<TcpSegment>,
    /// Sent-but-unacked segments in sequence order (front = oldest).
    outstanding: VecDeque<OutstandingSegment>,

    /// Absolute sequence number of the next new position to send.
    next_seqno: u64,
    /// Highest absolute ackno the peer has confirmed (left window edge).
    ack_abs_seqno: u64,
    /// Window the peer last advertised.
    window_size: u16,
    /// Sum of sequence-space lengths across `outstanding`.
    bytes_in_flight: u64,

    syn_sent: bool,
    fin_sent: bool,

    max_payload_size: usize,
    initial_rto: u64,
    current_rto: u64,
    /// Milliseconds accumulated toward the current timeout.
    timer_ms: u64,
    consecutive_retransmissions: u32,
}

impl TcpSender {
    /// Create a sender.
    ///
    /// `fixed_isn` pins the initial sequence number (handy for tests and
    /// required for deterministic replay); `None` draws a random one.
    pub fn new(
        capacity: usize,
        retx_timeout: u64,
        max_payload_size: usize,
        fixed_isn: Option<WrappingInt32>,
    ) -> Self {
        let isn = fixed_isn.unwrap_or_else(|| WrappingInt32::new(rand::rng().random()));
        Self {
            isn,
            stream: ByteStream::new(capacity),
            segments_out: VecDeque::new(),
            outstanding: VecDeque::new(),
            next_seqno: 0,
            ack_abs_seqno: 0,
            // Before the first ACK, assume room for exactly the SYN.
            window_size: 1,
            bytes_in_flight: 0,
            syn_sent: false,
            fin_sent: false,
            max_payload_size,
            initial_rto: retx_timeout,
            current_rto: retx_timeout,
            timer_ms: 0,
            consecutive_retransmissions: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Segment production
    // -----------------------------------------------------------------------

    /// Generate as many segments as the peer's window allows.
    ///
    /// A zero window is treated as one byte wide so the sender keeps probing
    /// until the peer opens up again.  Emits nothing after FIN: that final
    /// sequence number is only ever re-sent by the retransmission timer.
    pub fn fill_window(&mut self) {
        if self.fin_sent {
            return;
        }

        if !self.syn_sent {
            if self.effective_window() <= self.bytes_in_flight {
                return;
            }
            let seg = TcpSegment {
                header: TcpHeader {
                    seqno: self.isn,
                    syn: true,
                    ..Default::default()
                },
                payload: Vec::new(),
            };
            self.syn_sent = true;
            self.transmit(seg);
            // Fall through: the window may hold payload behind the SYN.
        }

        loop {
            let window_remaining = self
                .effective_window()
                .saturating_sub(self.bytes_in_flight);
            if window_remaining == 0 {
                break;
            }

            let take = window_remaining
                .min(self.stream.buffer_size() as u64)
                .min(self.max_payload_size as u64) as usize;
            let payload = self.stream.read(take);

            let mut seg = TcpSegment {
                header: TcpHeader {
                    seqno: wrap(self.next_seqno, self.isn),
                    ..Default::default()
                },
                payload,
            };

            // Piggyback FIN when the stream is finished and the extra
            // sequence number still fits in the window.
            if self.stream.eof() && seg.payload.len() as u64 + 1 <= window_remaining {
                seg.header.fin = true;
                self.fin_sent = true;
            }

            if seg.length_in_sequence_space() == 0 {
                break; // nothing useful to send
            }

            self.transmit(seg);

            if self.fin_sent {
                break;
            }
        }
    }

    /// Queue one segment for transmission and start tracking it.
    fn transmit(&mut self, seg: TcpSegment) {
        let len = seg.length_in_sequence_space();
        log::debug!(
            "[sender] -> {} len={} in_flight={}",
            seg.header,
            len,
            self.bytes_in_flight + len
        );
        self.segments_out.push_back(seg.clone());
        self.outstanding.push_back(OutstandingSegment {
            abs_seqno: self.next_seqno,
            segment: seg,
            tx_count: 1,
        });
        self.next_seqno += len;
        self.bytes_in_flight += len;

        // First segment into an empty window arms the timer fresh.
        if self.outstanding.len() == 1 {
            self.timer_ms = 0;
            self.current_rto = self.initial_rto;
        }
    }

    /// Queue a segment occupying no sequence space (pure ACK, keep-alive,
    /// or RST carrier).  Never tracked for retransmission.
    pub fn send_empty_segment(&mut self) {
        let seg = TcpSegment {
            header: TcpHeader {
                seqno: wrap(self.next_seqno, self.isn),
                ..Default::default()
            },
            payload: Vec::new(),
        };
        self.segments_out.push_back(seg);
    }

    // -----------------------------------------------------------------------
    // Peer feedback
    // -----------------------------------------------------------------------

    /// Process a cumulative acknowledgment and window update from the peer.
    ///
    /// An ackno beyond `next_seqno` acknowledges data never sent and is
    /// ignored entirely.  New acknowledgments retire fully-covered segments
    /// from the outstanding queue and reset the retransmission state; the
    /// window update applies either way.
    pub fn ack_received(&mut self, ackno: WrappingInt32, window_size: u16) {
        self.window_size = window_size;

        let ack_abs = unwrap(ackno, self.isn, self.next_seqno);
        if ack_abs > self.next_seqno {
            return; // acks data we never sent
        }

        if ack_abs > self.ack_abs_seqno {
            self.ack_abs_seqno = ack_abs;

            while let Some(front) = self.outstanding.front() {
                if front.end_abs_seqno() > ack_abs {
                    break; // only partially covered; keep for retransmission
                }
                self.bytes_in_flight -= front.segment.length_in_sequence_space();
                self.outstanding.pop_front();
            }
            log::debug!(
                "[sender] <- ACK ack_abs={} in_flight={}",
                ack_abs,
                self.bytes_in_flight
            );

            self.current_rto = self.initial_rto;
            self.consecutive_retransmissions = 0;
            self.timer_ms = 0;
        }

        self.fill_window();
    }

    /// Advance the retransmission timer by `ms` milliseconds.
    ///
    /// On expiry, re-queues the oldest outstanding segment and doubles the
    /// timeout, unless the peer's window is zero (the loss was a probe into
    /// a closed window, not a sign of congestion).
    pub fn tick(&mut self, ms: u64) {
        if self.outstanding.is_empty() {
            return;
        }
        self.timer_ms += ms;
        if self.timer_ms < self.current_rto {
            return;
        }

        if let Some(oldest) = self.outstanding.front_mut() {
            oldest.tx_count += 1;
            log::debug!(
                "[sender] timeout, retransmit {} (tx {})",
                oldest.segment.header,
                oldest.tx_count
            );
            self.segments_out.push_back(oldest.segment.clone());
        }
        self.timer_ms = 0;
        if self.window_size > 0 {
            self.current_rto *= 2;
        }
        self.consecutive_retransmissions += 1;
    }

    /// Window to fill, with a zero window treated as one byte for probing.
    fn effective_window(&self) -> u64 {
        if self.window_size == 0 {
            1
        } else {
            u64::from(self.window_size)
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Sequence-space positions sent but not yet acknowledged.
    pub fn bytes_in_flight(&self) -> u64 {
        self.bytes_in_flight
    }

    /// Retransmissions since the last acknowledgment of new data.
    pub fn consecutive_retransmissions(&self) -> u32 {
        self.consecutive_retransmissions
    }

    /// Wire sequence number of the next new position.
    pub fn next_seqno(&self) -> WrappingInt32 {
        wrap(self.next_seqno, self.isn)
    }

    /// Absolute sequence number of the next new position.
    pub fn next_seqno_abs(&self) -> u64 {
        self.next_seqno
    }

    pub fn syn_sent(&self) -> bool {
        self.syn_sent
    }

    pub fn fin_sent(&self) -> bool {
        self.fin_sent
    }

    /// Segments ready for the caller to transmit.
    pub fn segments_out_mut(&mut self) -> &mut VecDeque<TcpSegment> {
        &mut self.segments_out
    }

    /// The outbound byte stream this sender segments.
    pub fn stream_in(&self) -> &ByteStream {
        &self.stream
    }

    pub fn stream_in_mut(&mut self) -> &mut ByteStream {
        &mut self.stream
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
