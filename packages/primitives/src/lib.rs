//! Primitive types for the [Torrust UDP Tracker](https://github.com/torrust/torrust-udp-tracker).
//!
//! This crate contains the basic data structures of the tracker: torrent and
//! peer identifiers, announce events and swarm statistics. They are used by
//! the tracker core, the UDP wire codec and the peer storage seam.
use std::time::Duration;

pub mod announce_event;
pub mod info_hash;
pub mod peer;
pub mod peer_id;
pub mod swarm_metadata;

/// Duration since the Unix Epoch (a timestamp).
///
/// Timestamps do not depend on the time zone, which gives you the ability to
/// use the clock regardless of the underlying system time zone configuration.
/// See the [Unix time Wikipedia entry](https://en.wikipedia.org/wiki/Unix_time).
pub type DurationSinceUnixEpoch = Duration;
