//! `netstack` - the core of a user-space TCP/IP stack.
//!
//! # Architecture
//!
//! ```text
//!  application bytes
//!      | write                                   read |
//!      v                                              |
//!  +-----------+  segments   +-------------+  in-order bytes
//!  | TcpSender |-----------> | TcpReceiver |----------+
//!  +-----+-----+             +------+------+
//!        |        ACKs, window      |
//!        |<--------------------------
//!        |
//!  +-----v----------------------------------+
//!  |            TcpConnection               |
//!  |  (joins both halves, close/reset FSM)  |
//!  +-----+----------------------------------+
//!        | IPv4 datagrams (encapsulation is external)
//!  +-----v------------+      +----------+
//!  | NetworkInterface | <--> |  Router  |  (forwarding nodes only)
//!  |  (ARP, framing)  |      |  (LPM)   |
//!  +------------------+      +----------+
//! ```
//!
//! Everything here is single-threaded and driven by explicit calls: feed
//! segments and frames in, take queued segments and frames out, and report
//! the passage of time through `tick(ms)`.  Sockets, wire serialisation,
//! and the event loop live outside this crate.
//!
//! Each module has a single responsibility:
//! - [`byte_stream`]  - bounded FIFO with EOF and error latches
//! - [`wrapping`]     - 32-bit wire sequence numbers vs 64-bit offsets
//! - [`reassembler`]  - out-of-order substrings into an ordered stream
//! - [`segment`]      - the logical TCP segment
//! - [`receiver`]     - inbound segments to ackno/window/stream
//! - [`sender`]       - outbound stream to segments, with retransmission
//! - [`connection`]   - full-duplex glue and the close/reset lifecycle
//! - [`state`]        - RFC 793 names for diagnostic summaries
//! - [`config`]       - per-connection tuning knobs
//! - [`ipv4`]         - logical datagram and RFC 1071 header checksum
//! - [`ethernet`]     - logical frames and ARP messages
//! - [`interface`]    - ARP resolution and per-hop pending queues
//! - [`router`]       - longest-prefix-match forwarding

pub mod byte_stream;
pub mod config;
pub mod connection;
pub mod ethernet;
pub mod interface;
pub mod ipv4;
pub mod reassembler;
pub mod receiver;
pub mod router;
pub mod segment;
pub mod sender;
pub mod state;
pub mod wrapping;
