//! Full-duplex TCP connection.
//!
//! [`TcpConnection`] glues a [`TcpSender`] and a [`TcpReceiver`] into one
//! peer-facing state machine:
//!
//! ```text
//!  application
//!      | write / end_input_stream            inbound_stream | read
//!      v                                                    |
//!  +--------------+   outgoing stream   +----------------+  |
//!  |  TcpSender   | ------------------> |  segments_out  |  |
//!  +--------------+    (ACK/win stamped |  (to the wire) |  |
//!      ^               from receiver)   +----------------+  |
//!      | ackno, window                                      |
//!  +--------------+                                         |
//!  | TcpReceiver  | <-- segment_received (from the wire) ---+
//!  +--------------+
//! ```
//!
//! Every public entry point ends by pumping the sender: fill the window,
//! move its segments to `segments_out` with the receiver's current `ackno`
//! and window stamped on, and re-check whether the connection can finish.
//!
//! # Closing
//!
//! The connection is done when both byte streams have ended and nothing is
//! left in flight.  Whoever receives the peer's FIN before ending its own
//! stream closes passively and can stop right away; the active closer must
//! linger for ten retransmission timeouts after the last received segment,
//! standing by to re-ACK the peer's FIN, before it may disappear.

use std::collections::VecDeque;

use crate::byte_stream::ByteStream;
use crate::config::TcpConfig;
use crate::receiver::TcpReceiver;
use crate::segment::{TcpHeader, TcpSegment};
use crate::sender::TcpSender;
use crate::state::ConnectionState;

/// One end of a TCP connection.
#[derive(Debug)]
pub struct TcpConnection {
    cfg: TcpConfig,
    sender: TcpSender,
    receiver: TcpReceiver,
    /// Segments ready for the wire, fully stamped.
    segments_out: VecDeque<TcpSegment>,
    time_since_last_segment_received_ms: u64,
    /// Whether to wait out a TIME_WAIT period after both streams finish.
    /// Cleared when the peer's stream ends before ours does.
    linger_after_streams_finish: bool,
    is_active: bool,
}

impl TcpConnection {
    pub fn new(cfg: TcpConfig) -> Self {
        let sender = TcpSender::new(
            cfg.send_capacity,
            cfg.rt_timeout,
            cfg.max_payload_size,
            cfg.fixed_isn,
        );
        let receiver = TcpReceiver::new(cfg.recv_capacity);
        Self {
            cfg,
            sender,
            receiver,
            segments_out: VecDeque::new(),
            time_since_last_segment_received_ms: 0,
            linger_after_streams_finish: true,
            is_active: true,
        }
    }

    // -----------------------------------------------------------------------
    // Wire-facing events
    // -----------------------------------------------------------------------

    /// Process one segment that arrived from the peer.
    pub fn segment_received(&mut self, seg: &TcpSegment) {
        if !self.active() {
            return;
        }
        self.time_since_last_segment_received_ms = 0;

        if seg.header.rst {
            log::debug!("[conn] <- RST, tearing down");
            self.abort_streams();
            return;
        }

        self.receiver.segment_received(seg);

        if seg.header.ack {
            self.sender.ack_received(seg.header.ackno, seg.header.win);
        }

        // Peer finished first while our stream is still open: we are the
        // passive closer and need no TIME_WAIT of our own.
        if self.receiver.stream_out().input_ended() && !self.sender.stream_in().input_ended() {
            self.linger_after_streams_finish = false;
        }

        self.sender.fill_window();
        let produced = self.drain_sender();

        // A segment that occupied sequence space deserves at least a bare
        // ACK, as does a keep-alive probe one left of the window.  Pure ACKs
        // get no reply (answering them would ping-pong forever), and before
        // we are synchronised there is no ackno to offer.
        let reply_due = match self.receiver.ackno() {
            None => false,
            Some(ackno) => {
                seg.length_in_sequence_space() > 0
                    || seg.header.seqno == ackno.wrapping_sub(1)
            }
        };
        if produced == 0 && reply_due {
            self.sender.send_empty_segment();
            self.drain_sender();
        }

        self.check_shutdown();
        log::trace!("[conn] <- {} now {}", seg.header, self.state());
    }

    /// Advance all timers by `ms` milliseconds.
    pub fn tick(&mut self, ms: u64) {
        if !self.active() {
            return;
        }
        self.sender.tick(ms);

        if self.sender.consecutive_retransmissions() > self.cfg.max_retx_attempts {
            log::warn!(
                "[conn] {} consecutive retransmissions, giving up",
                self.sender.consecutive_retransmissions()
            );
            self.send_rst_and_die();
            return;
        }

        self.time_since_last_segment_received_ms += ms;
        self.flush();

        if self.linger_after_streams_finish
            && self.streams_finished()
            && self.time_since_last_segment_received_ms >= 10 * self.cfg.rt_timeout
        {
            log::debug!("[conn] linger period over, closing");
            self.is_active = false;
        }
    }

    // -----------------------------------------------------------------------
    // Application-facing operations
    // -----------------------------------------------------------------------

    /// Begin the handshake by letting the sender emit its SYN.
    pub fn connect(&mut self) {
        if !self.active() {
            return;
        }
        self.flush();
    }

    /// Queue application data for sending.  Returns how much was accepted.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if !self.active() {
            return 0;
        }
        let written = self.sender.stream_in_mut().write(data);
        self.flush();
        written
    }

    /// Finish the outbound stream; a FIN goes out as soon as the window
    /// allows.
    pub fn end_input_stream(&mut self) {
        if !self.active() {
            return;
        }
        self.sender.stream_in_mut().end_input();
        self.flush();
    }

    // -----------------------------------------------------------------------
    // Pumping
    // -----------------------------------------------------------------------

    /// Fill the window, ship whatever the sender queued, and re-evaluate
    /// shutdown.  Runs at the tail of every public entry point.
    fn flush(&mut self) {
        self.sender.fill_window();
        self.drain_sender();
        self.check_shutdown();
    }

    /// Move the sender's segments onto the wire queue, stamping each with
    /// the receiver's acknowledgment state.  Returns how many moved.
    fn drain_sender(&mut self) -> usize {
        let mut moved = 0;
        while let Some(mut seg) = self.sender.segments_out_mut().pop_front() {
            self.stamp_ack(&mut seg.header);
            self.segments_out.push_back(seg);
            moved += 1;
        }
        moved
    }

    fn stamp_ack(&self, header: &mut TcpHeader) {
        if let Some(ackno) = self.receiver.ackno() {
            header.ack = true;
            header.ackno = ackno;
            header.win = self.receiver.window_size().min(u16::MAX as usize) as u16;
        }
    }

    /// Both streams have ended and every sent byte is acknowledged.
    fn streams_finished(&self) -> bool {
        self.receiver.stream_out().input_ended()
            && self.sender.stream_in().input_ended()
            && self.sender.bytes_in_flight() == 0
    }

    fn check_shutdown(&mut self) {
        if self.streams_finished() && !self.linger_after_streams_finish {
            self.is_active = false;
        }
    }

    /// Abandon the connection: one RST to the peer, both streams errored.
    fn send_rst_and_die(&mut self) {
        // Whatever was queued is superseded by the reset.
        self.sender.segments_out_mut().clear();
        self.sender.send_empty_segment();
        if let Some(mut seg) = self.sender.segments_out_mut().pop_front() {
            seg.header.rst = true;
            self.stamp_ack(&mut seg.header);
            self.segments_out.push_back(seg);
        }
        self.abort_streams();
    }

    fn abort_streams(&mut self) {
        self.receiver.stream_out_mut().set_error();
        self.sender.stream_in_mut().set_error();
        self.is_active = false;
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// `false` once the connection has fully shut down (cleanly or not).
    pub fn active(&self) -> bool {
        if !self.is_active {
            return false;
        }
        // A passive closer is done the moment everything is acknowledged.
        !(self.streams_finished() && !self.linger_after_streams_finish)
    }

    /// Segments ready to be put on the wire.
    pub fn segments_out_mut(&mut self) -> &mut VecDeque<TcpSegment> {
        &mut self.segments_out
    }

    /// The stream of bytes received from the peer.
    pub fn inbound_stream(&self) -> &ByteStream {
        self.receiver.stream_out()
    }

    pub fn inbound_stream_mut(&mut self) -> &mut ByteStream {
        self.receiver.stream_out_mut()
    }

    /// Room left in the outbound stream's buffer.
    pub fn remaining_outbound_capacity(&self) -> usize {
        self.sender.stream_in().remaining_capacity()
    }

    /// Sequence-space positions sent but not yet acknowledged.
    pub fn bytes_in_flight(&self) -> u64 {
        self.sender.bytes_in_flight()
    }

    /// Bytes the receiver holds out of order.
    pub fn unassembled_bytes(&self) -> usize {
        self.receiver.unassembled_bytes()
    }

    pub fn time_since_last_segment_received(&self) -> u64 {
        self.time_since_last_segment_received_ms
    }

    /// Where the connection stands, in classic state-diagram terms.
    pub fn state(&self) -> ConnectionState {
        if self.sender.stream_in().error() || self.receiver.stream_out().error() {
            return ConnectionState::Reset;
        }
        if !self.active() {
            return ConnectionState::Closed;
        }

        let syn_received = self.receiver.ackno().is_some();
        if !syn_received {
            return if self.sender.syn_sent() {
                ConnectionState::SynSent
            } else {
                ConnectionState::Listen
            };
        }
        let syn_acked = self.sender.syn_sent()
            && self.sender.next_seqno_abs() > self.sender.bytes_in_flight();
        if !syn_acked {
            return ConnectionState::SynRcvd;
        }

        let inbound_ended = self.receiver.stream_out().input_ended();
        if !self.sender.fin_sent() {
            return if inbound_ended {
                ConnectionState::CloseWait
            } else {
                ConnectionState::Established
            };
        }

        let fin_acked = self.sender.bytes_in_flight() == 0;
        match (inbound_ended, fin_acked) {
            (false, false) => ConnectionState::FinWait1,
            (false, true) => ConnectionState::FinWait2,
            (true, false) => {
                if self.linger_after_streams_finish {
                    ConnectionState::Closing
                } else {
                    ConnectionState::LastAck
                }
            }
            // linger is necessarily set here; otherwise `active` were false.
            (true, true) => ConnectionState::TimeWait,
        }
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        if self.active() {
            log::warn!("[conn] dropped while still active, peer left dangling");
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wrapping::WrappingInt32;

    const ISN: u32 = 0x4000_0000;
    const PEER_ISN: u32 = 0x9000_0000;

    fn conn() -> TcpConnection {
        TcpConnection::new(TcpConfig {
            fixed_isn: Some(WrappingInt32::new(ISN)),
            ..Default::default()
        })
    }

    fn drain(c: &mut TcpConnection) -> Vec<TcpSegment> {
        c.segments_out_mut().drain(..).collect()
    }

    /// A SYN-ACK from the peer answering our ISN.
    fn syn_ack() -> TcpSegment {
        TcpSegment {
            header: TcpHeader {
                seqno: WrappingInt32::new(PEER_ISN),
                syn: true,
                ack: true,
                ackno: WrappingInt32::new(ISN + 1),
                win: 1000,
                ..Default::default()
            },
            payload: Vec::new(),
        }
    }

    fn establish(c: &mut TcpConnection) {
        c.connect();
        drain(c);
        c.segment_received(&syn_ack());
        drain(c);
        assert_eq!(c.state(), ConnectionState::Established);
    }

    #[test]
    fn connect_emits_a_single_syn() {
        let mut c = conn();
        assert_eq!(c.state(), ConnectionState::Listen);
        c.connect();
        let segs = drain(&mut c);
        assert_eq!(segs.len(), 1);
        assert!(segs[0].header.syn);
        assert!(!segs[0].header.ack); // no peer ISN to acknowledge yet
        assert_eq!(c.state(), ConnectionState::SynSent);
    }

    #[test]
    fn syn_ack_completes_the_handshake_and_is_acked() {
        let mut c = conn();
        c.connect();
        drain(&mut c);

        c.segment_received(&syn_ack());
        assert_eq!(c.state(), ConnectionState::Established);

        // The peer's SYN occupied a sequence number; it must be acked.
        let segs = drain(&mut c);
        assert_eq!(segs.len(), 1);
        assert!(segs[0].header.ack);
        assert_eq!(segs[0].header.ackno, WrappingInt32::new(PEER_ISN + 1));
        assert_eq!(segs[0].length_in_sequence_space(), 0);
    }

    #[test]
    fn incoming_syn_is_answered_with_syn_ack() {
        let mut c = conn();
        let syn = TcpSegment {
            header: TcpHeader {
                seqno: WrappingInt32::new(PEER_ISN),
                syn: true,
                win: 1000,
                ..Default::default()
            },
            payload: Vec::new(),
        };
        c.segment_received(&syn);
        let segs = drain(&mut c);
        assert_eq!(segs.len(), 1);
        assert!(segs[0].header.syn);
        assert!(segs[0].header.ack);
        assert_eq!(c.state(), ConnectionState::SynRcvd);
    }

    #[test]
    fn segments_before_syn_are_dropped_silently() {
        let mut c = conn();
        let stray = TcpSegment {
            header: TcpHeader {
                seqno: WrappingInt32::new(123),
                ..Default::default()
            },
            payload: b"junk".to_vec(),
        };
        c.segment_received(&stray);
        assert!(drain(&mut c).is_empty());
        assert_eq!(c.state(), ConnectionState::Listen);
    }

    #[test]
    fn written_data_is_stamped_with_ack_state() {
        let mut c = conn();
        establish(&mut c);

        assert_eq!(c.write(b"hello"), 5);
        let segs = drain(&mut c);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].payload, b"hello");
        assert!(segs[0].header.ack);
        assert_eq!(segs[0].header.ackno, WrappingInt32::new(PEER_ISN + 1));
        assert_eq!(c.bytes_in_flight(), 5);
    }

    #[test]
    fn pure_acks_get_no_reply() {
        let mut c = conn();
        establish(&mut c);

        let ack = TcpSegment {
            header: TcpHeader {
                seqno: WrappingInt32::new(PEER_ISN + 1),
                ack: true,
                ackno: WrappingInt32::new(ISN + 1),
                win: 1000,
                ..Default::default()
            },
            payload: Vec::new(),
        };
        c.segment_received(&ack);
        assert!(drain(&mut c).is_empty());
    }

    #[test]
    fn keep_alive_probe_is_acknowledged() {
        let mut c = conn();
        establish(&mut c);

        // Probe one sequence number left of the window.
        let probe = TcpSegment {
            header: TcpHeader {
                seqno: WrappingInt32::new(PEER_ISN), // ackno - 1
                ack: true,
                ackno: WrappingInt32::new(ISN + 1),
                win: 1000,
                ..Default::default()
            },
            payload: Vec::new(),
        };
        c.segment_received(&probe);
        let segs = drain(&mut c);
        assert_eq!(segs.len(), 1);
        assert!(segs[0].header.ack);
        assert_eq!(segs[0].length_in_sequence_space(), 0);
    }

    #[test]
    fn rst_latches_both_streams_and_deactivates() {
        let mut c = conn();
        establish(&mut c);

        let rst = TcpSegment {
            header: TcpHeader {
                seqno: WrappingInt32::new(PEER_ISN + 1),
                rst: true,
                ..Default::default()
            },
            payload: Vec::new(),
        };
        c.segment_received(&rst);
        assert!(!c.active());
        assert!(c.inbound_stream().error());
        assert_eq!(c.state(), ConnectionState::Reset);
        // No reply to a reset, and later operations are inert.
        assert!(drain(&mut c).is_empty());
        assert_eq!(c.write(b"more"), 0);
        assert!(drain(&mut c).is_empty());
    }

    #[test]
    fn retransmission_exhaustion_resets_the_connection() {
        let mut c = conn();
        c.connect();
        drain(&mut c);

        // Nobody answers the SYN; let the backoff run its course.
        let mut guard = 0;
        while c.active() {
            c.tick(1000);
            guard += 1;
            assert!(guard < 2000, "connection never gave up");
        }

        let segs = drain(&mut c);
        let last = segs.last().expect("a reset should have been sent");
        assert!(last.header.rst);
        assert!(c.inbound_stream().error());
        assert_eq!(c.state(), ConnectionState::Reset);
    }

    #[test]
    fn inactive_connection_ignores_ticks_and_segments() {
        let mut c = conn();
        establish(&mut c);
        let rst = TcpSegment {
            header: TcpHeader {
                seqno: WrappingInt32::new(PEER_ISN + 1),
                rst: true,
                ..Default::default()
            },
            payload: Vec::new(),
        };
        c.segment_received(&rst);

        c.tick(60_000);
        c.segment_received(&syn_ack());
        c.connect();
        c.end_input_stream();
        assert!(drain(&mut c).is_empty());
    }
}
