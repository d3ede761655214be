//! Torrust UDP Tracker. A `BitTorrent` tracker speaking the UDP protocol
//! defined in [BEP 15](https://www.bittorrent.org/beps/bep_0015.html), with
//! the [BEP 41](https://www.bittorrent.org/beps/bep_0041.html) announce
//! extensions and the
//! [BEP 45](https://www.bittorrent.org/beps/bep_0045.html) dual-stack
//! announce response.
//!
//! A tracker is the matchmaker of a `BitTorrent` swarm: peers periodically
//! **announce** their state for a torrent and receive a list of other peers
//! to exchange pieces with, and **scrape** aggregated swarm statistics. The
//! UDP flavour exists because the HTTP one spends most of its bytes on
//! headers; over UDP a full announce round-trip fits in two small
//! datagrams.
//!
//! # Architecture
//!
//! ```text
//! clients ──UDP──▶ servers::udp (codec, connection IDs, packet loop)
//!                      │
//!                      ▼
//!                  core::Tracker (announce/scrape middleware chains)
//!                      │
//!                      ▼
//!                  core::peer_store::PeerStore (swarm storage seam)
//! ```
//!
//! - [`servers::udp`] owns everything wire-related: the binary codec, the
//!   stateless connection-ID handshake that prevents source-address
//!   spoofing, and the packet-processing loop (one reader task, one worker
//!   task per datagram, pooled read buffers, graceful shutdown).
//! - [`core`] is protocol-independent: requests flow through middleware
//!   chains composed at startup from the configuration, ending at the swarm
//!   handler. Deployments hook in authentication, filtering or rate
//!   limiting by registering middleware constructors in a
//!   [`core::middleware::Registry`].
//! - Swarm state lives behind [`core::peer_store::PeerStore`];
//!   [`core::peer_store::MemoryPeerStore`] is the in-process reference
//!   implementation.
//! - [`core::statistics`] keeps request counters and a response-time
//!   histogram labelled by action and error.
//!
//! # Configuration
//!
//! The binary reads a TOML document from the `TORRUST_UDP_TRACKER_CONFIG`
//! environment variable:
//!
//! ```toml
//! [core]
//! announce_interval_secs = 120
//!
//! [udp_tracker]
//! bind_address = "0.0.0.0:6969"
//! private_key = "MyAccessTokenForTheTracker"
//! allow_ip_spoofing = false
//! ```
//!
//! The `private_key` keys the HMAC inside connection IDs; instances sharing
//! a DNS name must share the key. See
//! [`torrust_udp_tracker_configuration`] for every option.
pub mod bootstrap;
pub mod core;
pub mod servers;
pub mod shared;
