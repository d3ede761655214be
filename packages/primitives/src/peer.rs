//! Peer struct used by the tracker core.
//!
//! A sample peer:
//!
//! ```rust,no_run
//! use std::net::{IpAddr, Ipv4Addr, SocketAddr};
//!
//! use torrust_udp_tracker_primitives::announce_event::AnnounceEvent;
//! use torrust_udp_tracker_primitives::peer;
//! use torrust_udp_tracker_primitives::peer_id::PeerId;
//! use torrust_udp_tracker_primitives::DurationSinceUnixEpoch;
//!
//! peer::Peer {
//!     peer_id: PeerId(*b"-qB00000000000000000"),
//!     peer_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(126, 0, 0, 1)), 8080),
//!     updated: DurationSinceUnixEpoch::new(1_669_397_478, 0),
//!     uploaded: 0,
//!     downloaded: 0,
//!     left: 0,
//!     event: AnnounceEvent::Started,
//! };
//! ```
use std::net::SocketAddr;

use serde::Serialize;

use crate::announce_event::AnnounceEvent;
use crate::peer_id::PeerId;
use crate::DurationSinceUnixEpoch;

/// A peer in a torrent swarm, as kept by the peer store.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Peer {
    /// ID chosen by the downloader peer.
    pub peer_id: PeerId,
    /// The IP and port this peer is listening on.
    pub peer_addr: SocketAddr,
    /// The last time the tracker received an announce request from this peer (timestamp).
    #[serde(serialize_with = "ser_unix_time_value")]
    pub updated: DurationSinceUnixEpoch,
    /// The total amount of bytes uploaded by this peer so far.
    pub uploaded: u64,
    /// The total amount of bytes downloaded by this peer so far.
    pub downloaded: u64,
    /// The number of bytes this peer still has to download.
    pub left: u64,
    /// The event that produced the last announce from this peer.
    pub event: AnnounceEvent,
}

impl Peer {
    /// A peer is a seeder when it has nothing left to download.
    #[must_use]
    pub fn is_seeder(&self) -> bool {
        self.left == 0 && self.event != AnnounceEvent::Stopped
    }
}

/// Serializes a `DurationSinceUnixEpoch` as a Unix timestamp in seconds.
///
/// # Errors
///
/// Will return `serde::Serializer::Error` if unable to serialize the value.
pub fn ser_unix_time_value<S: serde::Serializer>(unix_time_value: &DurationSinceUnixEpoch, ser: S) -> Result<S::Ok, S::Error> {
    ser.serialize_u64(unix_time_value.as_secs())
}
