//! The peer storage seam.
//!
//! The tracker core does not own swarm state. The terminal handlers of the
//! middleware chains talk to a [`PeerStore`], and deployments plug in
//! whatever backs their swarms (shared memory, a key-value store over the
//! network, …). Implementations are called concurrently from many worker
//! tasks.
//!
//! [`MemoryPeerStore`] is the in-process reference implementation used by
//! the default build and the test suite.
use std::collections::HashMap;
use std::net::SocketAddr;

use async_trait::async_trait;
use parking_lot::RwLock;
use torrust_udp_tracker_primitives::announce_event::AnnounceEvent;
use torrust_udp_tracker_primitives::info_hash::InfoHash;
use torrust_udp_tracker_primitives::peer::Peer;
use torrust_udp_tracker_primitives::swarm_metadata::SwarmMetadata;

use super::error::Error;

/// Storage consumed by the terminal announce and scrape handlers.
#[async_trait]
pub trait PeerStore: Send + Sync {
    /// Applies an announce to the torrent swarm: inserts or refreshes the
    /// peer, removes it on `stopped`, counts completions on `completed`.
    /// Returns the swarm statistics after the update.
    async fn update_swarm(&self, info_hash: &InfoHash, peer: &Peer) -> Result<SwarmMetadata, Error>;

    /// Up to `limit` peer addresses in the swarm, excluding `excluded` (the
    /// requesting peer itself).
    async fn get_swarm_peers(&self, info_hash: &InfoHash, excluded: &SocketAddr, limit: usize) -> Result<Vec<SocketAddr>, Error>;

    /// Swarm statistics for one torrent, for scrapes. Unknown torrents
    /// report zeroed statistics.
    async fn get_swarm_metadata(&self, info_hash: &InfoHash) -> Result<SwarmMetadata, Error>;
}

#[derive(Default)]
struct Swarm {
    /// Peers keyed by the socket address they announce.
    peers: HashMap<SocketAddr, Peer>,
    /// Number of `completed` events ever seen for this torrent.
    downloaded: u32,
}

impl Swarm {
    fn metadata(&self) -> SwarmMetadata {
        let complete = self.peers.values().filter(|peer| peer.is_seeder()).count();
        let incomplete = self.peers.len() - complete;

        SwarmMetadata {
            downloaded: self.downloaded,
            complete: complete.try_into().unwrap_or(u32::MAX),
            incomplete: incomplete.try_into().unwrap_or(u32::MAX),
        }
    }
}

/// In-process swarm storage.
#[derive(Default)]
pub struct MemoryPeerStore {
    torrents: RwLock<HashMap<InfoHash, Swarm>>,
}

impl MemoryPeerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PeerStore for MemoryPeerStore {
    async fn update_swarm(&self, info_hash: &InfoHash, peer: &Peer) -> Result<SwarmMetadata, Error> {
        let mut torrents = self.torrents.write();
        let swarm = torrents.entry(*info_hash).or_default();

        match peer.event {
            AnnounceEvent::Stopped => {
                swarm.peers.remove(&peer.peer_addr);
            }
            AnnounceEvent::Completed => {
                // Only count the transition, not every repeated `completed`.
                let previously_complete = swarm
                    .peers
                    .get(&peer.peer_addr)
                    .is_some_and(|known| known.event == AnnounceEvent::Completed || known.left == 0);
                if !previously_complete {
                    swarm.downloaded += 1;
                }
                swarm.peers.insert(peer.peer_addr, *peer);
            }
            AnnounceEvent::None | AnnounceEvent::Started => {
                swarm.peers.insert(peer.peer_addr, *peer);
            }
        }

        Ok(swarm.metadata())
    }

    async fn get_swarm_peers(&self, info_hash: &InfoHash, excluded: &SocketAddr, limit: usize) -> Result<Vec<SocketAddr>, Error> {
        let torrents = self.torrents.read();

        let Some(swarm) = torrents.get(info_hash) else {
            return Ok(Vec::new());
        };

        Ok(swarm
            .peers
            .keys()
            .filter(|peer_addr| *peer_addr != excluded)
            .take(limit)
            .copied()
            .collect())
    }

    async fn get_swarm_metadata(&self, info_hash: &InfoHash) -> Result<SwarmMetadata, Error> {
        let torrents = self.torrents.read();

        Ok(torrents.get(info_hash).map_or_else(SwarmMetadata::zeroed, Swarm::metadata))
    }
}
