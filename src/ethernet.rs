//! Logical link-layer structures: addresses, frames, and ARP messages.
//!
//! Framing bytes and on-wire ARP layout are the encapsulation layer's
//! concern.  Here a frame's payload is already typed, so the interface code
//! dispatches on the variant rather than an ethertype field.

use std::fmt;
use std::net::Ipv4Addr;

use crate::ipv4::Ipv4Datagram;

/// A 48-bit Ethernet hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EthernetAddress(pub [u8; 6]);

/// The all-ones broadcast address.
pub const ETHERNET_BROADCAST: EthernetAddress = EthernetAddress([0xFF; 6]);

impl fmt::Display for EthernetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// ARP operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOp {
    Request,
    Reply,
}

/// An Ethernet/IPv4 ARP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpMessage {
    pub opcode: ArpOp,
    pub sender_ethernet_address: EthernetAddress,
    pub sender_ip_address: Ipv4Addr,
    /// All zeroes in a request; the request asks for this field.
    pub target_ethernet_address: EthernetAddress,
    pub target_ip_address: Ipv4Addr,
}

/// What a frame carries, already parsed.
#[derive(Debug, Clone)]
pub enum FramePayload {
    Arp(ArpMessage),
    Ipv4(Ipv4Datagram),
}

/// An Ethernet frame with a typed payload.
#[derive(Debug, Clone)]
pub struct EthernetFrame {
    pub dst: EthernetAddress,
    pub src: EthernetAddress,
    pub payload: FramePayload,
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
