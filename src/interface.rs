//! Network interface: IPv4 datagrams in, Ethernet frames out.
//!
//! A [`NetworkInterface`] owns one (MAC, IP) pair and translates between
//! the network layer above it and the link below it.  Its one hard job is
//! address resolution: a datagram can only leave once the next hop's MAC is
//! known, so unknown hops trigger an ARP request while the datagram waits
//! in a per-hop queue.
//!
//! # Resolution discipline
//!
//! - Learned mappings live for [`ARP_CACHE_LIFETIME_MS`], then expire.
//! - One outstanding request covers every datagram queued for that hop; a
//!   fresh request goes out only when none has been sent for
//!   [`ARP_REQUEST_TIMEOUT_MS`].
//! - The moment a reply arrives, every queued datagram for that hop flushes
//!   in arrival order.
//!
//! Hosts call [`NetworkInterface::recv_frame`] and take delivered datagrams
//! from the return value; a router instead calls
//! [`NetworkInterface::push_frame`] so delivered datagrams queue up for its
//! next forwarding pass.

use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;

use crate::ethernet::{
    ArpMessage, ArpOp, EthernetAddress, EthernetFrame, FramePayload, ETHERNET_BROADCAST,
};
use crate::ipv4::Ipv4Datagram;

/// How long a learned IP-to-MAC mapping stays valid.
pub const ARP_CACHE_LIFETIME_MS: u64 = 30_000;

/// How long to wait before re-asking for an unresolved address.
pub const ARP_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// A cached resolution with its remaining lifetime.
#[derive(Debug)]
struct ArpEntry {
    mac: EthernetAddress,
    remaining_lifetime_ms: u64,
}

/// One attachment point to a link.
#[derive(Debug)]
pub struct NetworkInterface {
    mac: EthernetAddress,
    ip: Ipv4Addr,
    /// Frames ready for the physical layer.
    frames_out: VecDeque<EthernetFrame>,
    /// Datagrams delivered to this interface, for a router to drain.
    datagrams_in: VecDeque<Ipv4Datagram>,
    arp_cache: HashMap<Ipv4Addr, ArpEntry>,
    /// Datagrams parked until their next hop resolves, FIFO per hop.
    pending: HashMap<Ipv4Addr, VecDeque<Ipv4Datagram>>,
    /// Milliseconds since the last request went out, per unresolved hop.
    request_age_ms: HashMap<Ipv4Addr, u64>,
}

impl NetworkInterface {
    pub fn new(mac: EthernetAddress, ip: Ipv4Addr) -> Self {
        log::debug!("[iface] up, mac {mac} ip {ip}");
        Self {
            mac,
            ip,
            frames_out: VecDeque::new(),
            datagrams_in: VecDeque::new(),
            arp_cache: HashMap::new(),
            pending: HashMap::new(),
            request_age_ms: HashMap::new(),
        }
    }

    /// Send `dgram` toward `next_hop`, resolving its MAC first if needed.
    pub fn send_datagram(&mut self, dgram: Ipv4Datagram, next_hop: Ipv4Addr) {
        if let Some(entry) = self.arp_cache.get(&next_hop) {
            let f = self.ipv4_frame(dgram, entry.mac);
            self.frames_out.push_back(f);
            return;
        }

        self.pending.entry(next_hop).or_default().push_back(dgram);

        // One request per hop per timeout window, no matter how many
        // datagrams pile up behind it.
        let request_due = match self.request_age_ms.get(&next_hop) {
            None => true,
            Some(&age) => age >= ARP_REQUEST_TIMEOUT_MS,
        };
        if request_due {
            log::debug!("[iface] -> ARP who-has {next_hop}");
            self.request_age_ms.insert(next_hop, 0);
            let f = self.arp_request_frame(next_hop);
            self.frames_out.push_back(f);
        }
    }

    /// Accept one frame from the link.
    ///
    /// Frames for other hosts are dropped.  ARP traffic updates the cache
    /// (and may flush pending datagrams or answer the asker); an IPv4
    /// payload is handed back to the caller.
    pub fn recv_frame(&mut self, frame: EthernetFrame) -> Option<Ipv4Datagram> {
        if frame.dst != self.mac && frame.dst != ETHERNET_BROADCAST {
            return None;
        }

        match frame.payload {
            FramePayload::Arp(arp) => {
                let sender_ip = arp.sender_ip_address;
                let sender_mac = arp.sender_ethernet_address;

                // Any ARP sighting refreshes the mapping and settles an
                // outstanding request for that hop.
                self.arp_cache.insert(
                    sender_ip,
                    ArpEntry {
                        mac: sender_mac,
                        remaining_lifetime_ms: ARP_CACHE_LIFETIME_MS,
                    },
                );
                self.request_age_ms.remove(&sender_ip);

                match arp.opcode {
                    ArpOp::Reply => {
                        if let Some(queue) = self.pending.remove(&sender_ip) {
                            log::debug!(
                                "[iface] <- ARP {sender_ip} is-at {sender_mac}, flushing {}",
                                queue.len()
                            );
                            for dgram in queue {
                                let f = self.ipv4_frame(dgram, sender_mac);
                                self.frames_out.push_back(f);
                            }
                        }
                    }
                    ArpOp::Request => {
                        if arp.target_ip_address == self.ip {
                            log::debug!("[iface] <- ARP who-has {}, replying", self.ip);
                            let f = self.arp_reply_frame(sender_mac, sender_ip);
                            self.frames_out.push_back(f);
                        }
                    }
                }
                None
            }
            FramePayload::Ipv4(dgram) => Some(dgram),
        }
    }

    /// Accept a frame and queue any delivered datagram on `datagrams_in`
    /// (router-side entry point).
    pub fn push_frame(&mut self, frame: EthernetFrame) {
        if let Some(dgram) = self.recv_frame(frame) {
            self.datagrams_in.push_back(dgram);
        }
    }

    /// Take the next datagram delivered to this interface, if any.
    pub fn pop_inbound(&mut self) -> Option<Ipv4Datagram> {
        self.datagrams_in.pop_front()
    }

    /// Advance cache lifetimes and request timers by `ms` milliseconds.
    pub fn tick(&mut self, ms: u64) {
        self.arp_cache.retain(|_, entry| {
            if entry.remaining_lifetime_ms > ms {
                entry.remaining_lifetime_ms -= ms;
                true
            } else {
                false
            }
        });

        let mut expired = Vec::new();
        for (&ip, age) in self.request_age_ms.iter_mut() {
            *age += ms;
            if *age >= ARP_REQUEST_TIMEOUT_MS {
                *age = 0;
                expired.push(ip);
            }
        }
        for ip in expired {
            log::debug!("[iface] ARP who-has {ip} unanswered, asking again");
            let f = self.arp_request_frame(ip);
            self.frames_out.push_back(f);
        }
    }

    // -----------------------------------------------------------------------
    // Frame builders
    // -----------------------------------------------------------------------

    fn ipv4_frame(&self, dgram: Ipv4Datagram, dst: EthernetAddress) -> EthernetFrame {
        EthernetFrame {
            dst,
            src: self.mac,
            payload: FramePayload::Ipv4(dgram),
        }
    }

    fn arp_request_frame(&self, target_ip: Ipv4Addr) -> EthernetFrame {
        EthernetFrame {
            dst: ETHERNET_BROADCAST,
            src: self.mac,
            payload: FramePayload::Arp(ArpMessage {
                opcode: ArpOp::Request,
                sender_ethernet_address: self.mac,
                sender_ip_address: self.ip,
                target_ethernet_address: EthernetAddress([0; 6]),
                target_ip_address: target_ip,
            }),
        }
    }

    fn arp_reply_frame(&self, asker_mac: EthernetAddress, asker_ip: Ipv4Addr) -> EthernetFrame {
        EthernetFrame {
            dst: asker_mac,
            src: self.mac,
            payload: FramePayload::Arp(ArpMessage {
                opcode: ArpOp::Reply,
                sender_ethernet_address: self.mac,
                sender_ip_address: self.ip,
                target_ethernet_address: asker_mac,
                target_ip_address: asker_ip,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn mac(&self) -> EthernetAddress {
        self.mac
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    /// Frames waiting for the physical layer.
    pub fn frames_out_mut(&mut self) -> &mut VecDeque<EthernetFrame> {
        &mut self.frames_out
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
