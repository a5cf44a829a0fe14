//! Classic names for the connection's lifecycle stages.
//!
//! Nothing in the protocol machinery branches on these: the real state is
//! the handful of flags spread across the sender and receiver.  The enum
//! exists so logs and tests can talk about "FIN_WAIT_2" instead of a tuple
//! of booleans; [`crate::connection::TcpConnection::state`] derives it on
//! demand.

use std::fmt;

/// A summary of where a connection stands, in RFC 793 terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Nothing sent or received yet.
    Listen,
    /// Our SYN is out; nothing heard back.
    SynSent,
    /// Peer's SYN arrived; our SYN not yet sent or not yet acknowledged.
    SynRcvd,
    /// Handshake complete; both directions open.
    Established,
    /// We sent FIN and await its acknowledgment, inbound still open.
    FinWait1,
    /// Our FIN is acknowledged; waiting for the peer's FIN.
    FinWait2,
    /// Peer finished first; our outbound side is still open.
    CloseWait,
    /// Both sides sent FIN; ours is not yet acknowledged.
    Closing,
    /// Peer finished first and we sent our FIN; awaiting its acknowledgment.
    LastAck,
    /// Everything acknowledged; lingering in case the peer needs our ACKs
    /// retransmitted.
    TimeWait,
    /// Fully closed.
    Closed,
    /// Torn down by a reset.
    Reset,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Listen => "LISTEN",
            Self::SynSent => "SYN_SENT",
            Self::SynRcvd => "SYN_RCVD",
            Self::Established => "ESTABLISHED",
            Self::FinWait1 => "FIN_WAIT_1",
            Self::FinWait2 => "FIN_WAIT_2",
            Self::CloseWait => "CLOSE_WAIT",
            Self::Closing => "CLOSING",
            Self::LastAck => "LAST_ACK",
            Self::TimeWait => "TIME_WAIT",
            Self::Closed => "CLOSED",
            Self::Reset => "RESET",
        };
        f.write_str(name)
    }
}
