//! Longest-prefix-match IPv4 forwarding.
//!
//! A [`Router`] owns a set of [`NetworkInterface`]s and a route table.
//! Each forwarding pass drains every interface's delivered datagrams and
//! sends each one out the interface of its most specific matching route,
//! decrementing the TTL and rewriting the header checksum on the way.
//!
//! Routing and time are deliberately separate: [`Router::route`] never
//! advances ARP timers, so a quiet forwarding loop cannot masquerade as the
//! passage of time.  The driver pumps [`Router::tick`] with real elapsed
//! milliseconds.

use std::net::Ipv4Addr;

use crate::interface::NetworkInterface;
use crate::ipv4::Ipv4Datagram;

/// One row of the route table.
#[derive(Debug)]
struct RouteEntry {
    prefix: Ipv4Addr,
    /// How many leading bits of `prefix` must match, 0..=32.
    prefix_length: u8,
    /// Where to send matching datagrams; `None` on a directly attached
    /// network, where the destination itself is the next hop.
    next_hop: Option<Ipv4Addr>,
    interface_num: usize,
}

impl RouteEntry {
    fn matches(&self, dst: u32) -> bool {
        let mask = prefix_mask(self.prefix_length);
        (dst & mask) == (u32::from(self.prefix) & mask)
    }
}

/// The high `len` bits set; a length of zero matches everything.
fn prefix_mask(len: u8) -> u32 {
    if len == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(len))
    }
}

/// An IPv4 router over a fixed set of interfaces.
#[derive(Debug, Default)]
pub struct Router {
    interfaces: Vec<NetworkInterface>,
    routes: Vec<RouteEntry>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an interface and return its index for use in routes.
    pub fn add_interface(&mut self, interface: NetworkInterface) -> usize {
        self.interfaces.push(interface);
        self.interfaces.len() - 1
    }

    pub fn interface(&self, interface_num: usize) -> &NetworkInterface {
        &self.interfaces[interface_num]
    }

    pub fn interface_mut(&mut self, interface_num: usize) -> &mut NetworkInterface {
        &mut self.interfaces[interface_num]
    }

    /// Install a route.  Later entries never shadow earlier ones; only a
    /// strictly longer prefix wins.
    pub fn add_route(
        &mut self,
        prefix: Ipv4Addr,
        prefix_length: u8,
        next_hop: Option<Ipv4Addr>,
        interface_num: usize,
    ) {
        assert!(prefix_length <= 32, "prefix length {prefix_length} out of range");
        log::info!(
            "[router] route {prefix}/{prefix_length} via {} dev {interface_num}",
            match next_hop {
                Some(hop) => hop.to_string(),
                None => "(direct)".to_string(),
            }
        );
        self.routes.push(RouteEntry {
            prefix,
            prefix_length,
            next_hop,
            interface_num,
        });
    }

    /// Drain every interface's delivered datagrams and forward each one.
    pub fn route(&mut self) {
        for n in 0..self.interfaces.len() {
            while let Some(dgram) = self.interfaces[n].pop_inbound() {
                self.route_one_datagram(dgram);
            }
        }
    }

    /// Advance ARP state on every interface by `ms` milliseconds.
    pub fn tick(&mut self, ms: u64) {
        for interface in &mut self.interfaces {
            interface.tick(ms);
        }
    }

    /// Forward one datagram, or drop it (expired TTL, no matching route,
    /// route out a nonexistent interface).
    fn route_one_datagram(&mut self, mut dgram: Ipv4Datagram) {
        if dgram.header.ttl <= 1 {
            log::debug!("[router] TTL expired for {}", dgram.header.dst);
            return;
        }
        dgram.header.ttl -= 1;
        dgram.header.fill_checksum();

        let dst = dgram.header.dst;
        let best = match self.longest_prefix_match(u32::from(dst)) {
            Some(entry) => entry,
            None => {
                log::debug!("[router] no route to {dst}");
                return;
            }
        };

        let next_hop = best.next_hop.unwrap_or(dst);
        let interface_num = best.interface_num;
        if interface_num >= self.interfaces.len() {
            log::debug!("[router] route for {dst} points at missing interface {interface_num}");
            return;
        }
        log::debug!("[router] {dst} -> hop {next_hop} dev {interface_num}");
        self.interfaces[interface_num].send_datagram(dgram, next_hop);
    }

    /// The matching entry with the greatest prefix length, first installed
    /// winning ties.
    fn longest_prefix_match(&self, dst: u32) -> Option<&RouteEntry> {
        let mut best: Option<&RouteEntry> = None;
        for entry in &self.routes {
            if !entry.matches(dst) {
                continue;
            }
            match best {
                Some(b) if entry.prefix_length <= b.prefix_length => {}
                _ => best = Some(entry),
            }
        }
        best
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
