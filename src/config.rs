//! Per-connection tuning knobs.

use crate::wrapping::WrappingInt32;

/// Default capacity of the outbound and inbound byte streams.
pub const DEFAULT_CAPACITY: usize = 64_000;

/// Largest payload a single segment may carry, leaving room for headers in
/// a 1500-byte Ethernet MTU.
pub const MAX_PAYLOAD_SIZE: usize = 1452;

/// Default initial retransmission timeout in milliseconds.
pub const TIMEOUT_DFLT: u64 = 1000;

/// Default cap on consecutive retransmissions before the connection resets.
pub const MAX_RETX_ATTEMPTS: u32 = 8;

/// Configuration shared by the sender, receiver, and connection.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Capacity of the outbound byte stream.
    pub send_capacity: usize,
    /// Capacity of the inbound byte stream (and thus the largest window the
    /// receiver will ever advertise).
    pub recv_capacity: usize,
    /// Initial retransmission timeout in milliseconds; doubles on backoff.
    pub rt_timeout: u64,
    /// Consecutive retransmissions tolerated before giving up with a reset.
    pub max_retx_attempts: u32,
    /// Largest payload placed in one segment.
    pub max_payload_size: usize,
    /// Pin the initial sequence number; `None` draws a random one.
    pub fixed_isn: Option<WrappingInt32>,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            send_capacity: DEFAULT_CAPACITY,
            recv_capacity: DEFAULT_CAPACITY,
            rt_timeout: TIMEOUT_DFLT,
            max_retx_attempts: MAX_RETX_ATTEMPTS,
            max_payload_size: MAX_PAYLOAD_SIZE,
            fixed_isn: None,
        }
    }
}
