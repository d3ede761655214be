//! UDP `BitTorrent` tracker (BEP 15) server.
//!
//! The UDP protocol is a binary, connectionless alternative to the HTTP
//! tracker protocol, designed to cut tracker traffic roughly in half. It is
//! defined in:
//!
//! - [BEP 15. UDP Tracker Protocol for `BitTorrent`](https://www.bittorrent.org/beps/bep_0015.html)
//! - [BEP 41. UDP Tracker Protocol Extensions](https://www.bittorrent.org/beps/bep_0041.html)
//! - [BEP 45. Multiple-address operation for the `BitTorrent` DHT](https://www.bittorrent.org/beps/bep_0045.html)
//!   (the dual-stack announce response)
//!
//! ## Sessions
//!
//! Being connectionless, UDP offers no handle to tie requests to a client.
//! The protocol fakes one: the client first sends a `connect` request with a
//! well-known magic connection ID, and the server answers with an 8-byte
//! connection ID the client must present in every announce and scrape for
//! the next two minutes. Since the ID is cryptographically bound to the
//! source address and the mint time (see
//! [`connection_cookie`](crate::servers::udp::connection_cookie)), the
//! server stays stateless and a spoofed source address cannot be used to
//! turn the tracker into an amplifier.
//!
//! ## Packet flow
//!
//! ```text
//! datagram ──▶ server::Receiver ──▶ server::Processor
//!                                     │  handlers::handle_packet
//!                                     │    ├─ request::parse_header
//!                                     │    ├─ connection_cookie::check
//!                                     │    ├─ request::parse_announce / parse_scrape
//!                                     │    ├─ core::Tracker (middleware chain → peer store)
//!                                     │    └─ response::Writer
//!                                     └─ socket.send_to ──▶ client
//! ```
//!
//! Packets shorter than the 16-byte header get no response at all: answering
//! unverifiable garbage would make the tracker a reflector for whoever wrote
//! the source address.
use std::net::SocketAddr;

pub mod connection_cookie;
pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

/// The maximum number of bytes read from, or written to, one datagram.
pub const MAX_PACKET_SIZE: usize = 2048;

/// The magic initial connection ID clients present in `connect` requests
/// (`0x0000_0417_2710_1980`, fixed by BEP 15).
pub const PROTOCOL_ID: ConnectionId = ConnectionId([0x00, 0x00, 0x04, 0x17, 0x27, 0x10, 0x19, 0x80]);

/// An 8-byte connection token as it appears on the wire. Opaque at the
/// codec layer; the [`connection_cookie`] module gives it meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionId(pub [u8; 8]);

/// The client-chosen 4-byte request identifier, echoed byte-for-byte in the
/// response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionId(pub [u8; 4]);

/// Wire actions. Clients may request the first three; `Error` and the
/// BEP 45 `AnnounceDualStack` only ever appear in responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Connect,
    Announce,
    Scrape,
    Error,
    AnnounceDualStack,
}

impl Action {
    /// The identifier of this action on the wire.
    #[must_use]
    pub fn id(self) -> u32 {
        match self {
            Action::Connect => 0,
            Action::Announce => 1,
            Action::Scrape => 2,
            Action::Error => 3,
            Action::AnnounceDualStack => 4,
        }
    }

    /// Decodes a request action identifier. Response-only and unknown
    /// identifiers yield `None`; the dispatcher answers those with an
    /// `unknown action ID` error.
    #[must_use]
    pub fn from_request_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Action::Connect),
            1 => Some(Action::Announce),
            2 => Some(Action::Scrape),
            _ => None,
        }
    }
}

/// Log target for every event of the UDP server.
pub const UDP_TRACKER_LOG_TARGET: &str = "UDP TRACKER";

/// One datagram as read from the socket: the leased payload buffer and the
/// source address.
#[derive(Debug)]
pub struct RawRequest {
    pub payload: Vec<u8>,
    pub from: SocketAddr,
}
