//! The core `Tracker`.
//!
//! A protocol-independent, middleware-composed `BitTorrent` tracker. The
//! wire front-ends (the UDP server in this crate) decode requests into the
//! types below, hand them to [`Tracker::handle_announce`] /
//! [`Tracker::handle_scrape`], and encode whatever comes back. The tracker
//! itself only runs the middleware chains; swarm state lives behind the
//! [`peer_store::PeerStore`] seam.
pub mod error;
pub mod middleware;
pub mod peer_store;
pub mod statistics;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::error::SendError;
use torrust_udp_tracker_configuration::Configuration;
use torrust_udp_tracker_primitives::announce_event::AnnounceEvent;
use torrust_udp_tracker_primitives::info_hash::InfoHash;
use torrust_udp_tracker_primitives::peer::Peer;
use torrust_udp_tracker_primitives::peer_id::PeerId;
use torrust_udp_tracker_primitives::swarm_metadata::SwarmMetadata;

use self::error::{BuildError, Error};
use self::middleware::{
    AnnounceChain, AnnounceMiddleware, AnnounceNext, Registry, ScrapeChain, ScrapeMiddleware, ScrapeNext,
};
use self::peer_store::PeerStore;
use crate::shared::clock;
use crate::shared::pool::Pool;

/// Default maximum number of peers returned in an announce response when the
/// client lets the server decide (`num_want == 0`).
pub const TORRENT_PEERS_LIMIT: usize = 74;

/// Announce intervals handed to clients, taken from the core configuration.
#[derive(Debug, Clone, Copy)]
pub struct Policy {
    pub announce_interval: Duration,
    pub min_announce_interval: Duration,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            announce_interval: Duration::from_secs(120),
            min_announce_interval: Duration::from_secs(120),
        }
    }
}

impl Policy {
    #[must_use]
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            announce_interval: Duration::from_secs(u64::from(config.core.announce_interval_secs)),
            min_announce_interval: Duration::from_secs(u64::from(config.core.min_announce_interval_secs)),
        }
    }
}

/// A decoded announce request, as seen by the middleware chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnounceRequest {
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
    pub downloaded: u64,
    pub left: u64,
    pub uploaded: u64,
    pub event: AnnounceEvent,
    /// IPv4 endpoint of the peer: the packet override when spoofing is
    /// allowed, the source address otherwise.
    pub ip_v4: Option<Ipv4Addr>,
    /// IPv6 endpoint of the peer, from the BEP 45 option.
    pub ip_v6: Option<Ipv6Addr>,
    pub port: u16,
    /// Peers the client wants. Never negative; `0` means "server decides".
    pub num_want: i32,
    /// Raw BEP 41 URL data, when the client sent any. Kept opaque.
    pub url_data: Option<Vec<u8>>,
}

impl AnnounceRequest {
    /// The peer's primary endpoint: IPv4 when known, IPv6 otherwise.
    ///
    /// # Panics
    ///
    /// Will panic if the request carries no address at all; the wire codec
    /// always sets one of them.
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        match (self.ip_v4, self.ip_v6) {
            (Some(ip), _) => SocketAddr::new(IpAddr::V4(ip), self.port),
            (None, Some(ip)) => SocketAddr::new(IpAddr::V6(ip), self.port),
            (None, None) => panic!("announce request without a peer address"),
        }
    }
}

/// The response to an announce request.
///
/// Instances are pooled by the tracker; see
/// [`Tracker::return_announce_response`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnounceResponse {
    pub interval: Duration,
    pub min_interval: Duration,
    /// Number of seeders in the swarm.
    pub complete: u32,
    /// Number of leechers in the swarm.
    pub incomplete: u32,
    /// Compact-format hint. The UDP wire format is always compact; HTTP
    /// front-ends would honour it.
    pub compact: bool,
    pub ipv4_peers: Vec<SocketAddrV4>,
    pub ipv6_peers: Vec<SocketAddrV6>,
}

impl AnnounceResponse {
    /// Resets the response to its zero state, keeping the peer-list
    /// allocations.
    pub fn zero(&mut self) {
        self.interval = Duration::ZERO;
        self.min_interval = Duration::ZERO;
        self.complete = 0;
        self.incomplete = 0;
        self.compact = false;
        self.ipv4_peers.truncate(0);
        self.ipv6_peers.truncate(0);
    }
}

/// A decoded scrape request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub info_hashes: Vec<InfoHash>,
}

/// The response to a scrape request: one entry per requested info-hash, in
/// request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeResponse {
    pub files: Vec<SwarmMetadata>,
}

/// The tracker front door: requests dispatched here flow through the
/// announce or scrape middleware chain and end at the peer store.
pub struct Tracker {
    policy: Policy,
    announce_chain: AnnounceChain,
    scrape_chain: ScrapeChain,
    responses: Pool<AnnounceResponse>,
    stats_event_sender: Option<Box<dyn statistics::EventSender>>,
}

impl Tracker {
    /// Composes a tracker from the middleware named in the configuration.
    ///
    /// Constructors for every named middleware must be present in the
    /// `registry`; chains get the swarm handler over `store` appended as
    /// their terminal stage.
    ///
    /// # Errors
    ///
    /// Will return a `BuildError` if a middleware is unknown to the registry
    /// or its constructor rejects the options.
    pub fn new(
        config: &Configuration,
        registry: &Registry,
        store: Arc<dyn PeerStore>,
        stats_event_sender: Option<Box<dyn statistics::EventSender>>,
    ) -> Result<Tracker, BuildError> {
        let announce_chain = registry.build_announce_chain(
            &config.announce_middleware,
            Box::new(SwarmHandler { store: store.clone() }),
        )?;

        let scrape_chain = registry.build_scrape_chain(&config.scrape_middleware, Box::new(SwarmHandler { store }))?;

        Ok(Tracker {
            policy: Policy::from_config(config),
            announce_chain,
            scrape_chain,
            responses: Pool::new(AnnounceResponse::default, AnnounceResponse::zero),
            stats_event_sender,
        })
    }

    #[must_use]
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Runs an announce request through the middleware chain.
    ///
    /// The response comes from an internal pool. It can be handed back with
    /// [`Tracker::return_announce_response`] once encoded, which relieves
    /// allocator pressure; that is optional.
    ///
    /// # Errors
    ///
    /// Will return the first `Error` raised by the chain.
    pub async fn handle_announce(&self, request: &mut AnnounceRequest) -> Result<AnnounceResponse, Error> {
        let mut response = self.responses.acquire();

        match self.announce_chain.handle(&self.policy, request, &mut response).await {
            Ok(()) => Ok(response),
            Err(e) => {
                self.responses.release(response);
                Err(e)
            }
        }
    }

    /// Returns an announce response to the pool for reuse. It must not be
    /// used after this call.
    pub fn return_announce_response(&self, response: AnnounceResponse) {
        self.responses.release(response);
    }

    /// Runs a scrape request through the middleware chain. Scrape responses
    /// are allocated per call; their size follows the request.
    ///
    /// # Errors
    ///
    /// Will return the first `Error` raised by the chain.
    pub async fn handle_scrape(&self, request: &ScrapeRequest) -> Result<ScrapeResponse, Error> {
        let mut response = ScrapeResponse {
            files: Vec::with_capacity(request.info_hashes.len()),
        };

        self.scrape_chain.handle(&self.policy, request, &mut response).await?;

        Ok(response)
    }

    /// Sends a statistics event, when statistics are enabled.
    pub async fn send_stats_event(&self, event: statistics::Event) -> Option<Result<(), SendError<statistics::Event>>> {
        match &self.stats_event_sender {
            None => None,
            Some(stats_event_sender) => stats_event_sender.send_event(event).await,
        }
    }
}

/// Terminal stage of both chains: the peer-store interaction.
struct SwarmHandler {
    store: Arc<dyn PeerStore>,
}

impl SwarmHandler {
    fn build_peer(request: &AnnounceRequest, peer_addr: SocketAddr, event: AnnounceEvent) -> Peer {
        Peer {
            peer_id: request.peer_id,
            peer_addr,
            updated: clock::now(),
            uploaded: request.uploaded,
            downloaded: request.downloaded,
            left: request.left,
            event,
        }
    }

    fn peers_limit(request: &AnnounceRequest) -> usize {
        if request.num_want > 0 {
            let wanted = usize::try_from(request.num_want).unwrap_or(TORRENT_PEERS_LIMIT);
            std::cmp::min(wanted, TORRENT_PEERS_LIMIT)
        } else {
            TORRENT_PEERS_LIMIT
        }
    }
}

#[async_trait]
impl AnnounceMiddleware for SwarmHandler {
    async fn handle_announce(
        &self,
        policy: &Policy,
        request: &mut AnnounceRequest,
        response: &mut AnnounceResponse,
        _next: AnnounceNext<'_>,
    ) -> Result<(), Error> {
        let primary_addr = request.peer_addr();

        let stats = self
            .store
            .update_swarm(&request.info_hash, &Self::build_peer(request, primary_addr, request.event))
            .await?;

        // A dual-stack announce (BEP 45) registers the IPv6 endpoint as
        // well. It carries no event so completions are counted once.
        if let (Some(_), Some(ip_v6)) = (request.ip_v4, request.ip_v6) {
            let secondary_addr = SocketAddr::new(IpAddr::V6(ip_v6), request.port);
            let secondary_event = if request.event == AnnounceEvent::Stopped {
                AnnounceEvent::Stopped
            } else {
                AnnounceEvent::None
            };
            self.store
                .update_swarm(&request.info_hash, &Self::build_peer(request, secondary_addr, secondary_event))
                .await?;
        }

        let peers = self
            .store
            .get_swarm_peers(&request.info_hash, &primary_addr, Self::peers_limit(request))
            .await?;

        response.interval = policy.announce_interval;
        response.min_interval = policy.min_announce_interval;
        response.complete = stats.complete;
        response.incomplete = stats.incomplete;

        for peer_addr in peers {
            match peer_addr {
                SocketAddr::V4(addr) => response.ipv4_peers.push(addr),
                SocketAddr::V6(addr) => response.ipv6_peers.push(addr),
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ScrapeMiddleware for SwarmHandler {
    async fn handle_scrape(
        &self,
        _policy: &Policy,
        request: &ScrapeRequest,
        response: &mut ScrapeResponse,
        _next: ScrapeNext<'_>,
    ) -> Result<(), Error> {
        for info_hash in &request.info_hashes {
            response.files.push(self.store.get_swarm_metadata(info_hash).await?);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    use torrust_udp_tracker_configuration::Configuration;
    use torrust_udp_tracker_primitives::announce_event::AnnounceEvent;
    use torrust_udp_tracker_primitives::info_hash::InfoHash;
    use torrust_udp_tracker_primitives::peer_id::PeerId;

    use super::middleware::Registry;
    use super::peer_store::MemoryPeerStore;
    use super::{AnnounceRequest, ScrapeRequest, Tracker};

    fn public_tracker() -> Tracker {
        Tracker::new(
            &Configuration::default(),
            &Registry::default(),
            Arc::new(MemoryPeerStore::new()),
            None,
        )
        .expect("a tracker with no middleware should always build")
    }

    fn sample_announce(port: u16) -> AnnounceRequest {
        AnnounceRequest {
            info_hash: InfoHash([7u8; 20]),
            peer_id: PeerId(*b"-qB00000000000000000"),
            left: 512,
            event: AnnounceEvent::Started,
            ip_v4: Some(Ipv4Addr::new(126, 0, 0, 1)),
            port,
            ..AnnounceRequest::default()
        }
    }

    #[tokio::test]
    async fn it_should_announce_a_peer_and_return_the_other_swarm_members() {
        let tracker = public_tracker();

        let first = tracker.handle_announce(&mut sample_announce(6881)).await.unwrap();
        assert!(first.ipv4_peers.is_empty(), "the first peer should see an empty swarm");
        tracker.return_announce_response(first);

        let second = tracker.handle_announce(&mut sample_announce(6882)).await.unwrap();

        assert_eq!(second.incomplete, 2);
        assert_eq!(second.ipv4_peers.len(), 1);
        assert_eq!(second.ipv4_peers[0].port(), 6881);
        assert_eq!(second.interval.as_secs(), 120);
    }

    #[tokio::test]
    async fn it_should_reuse_pooled_announce_responses_in_a_zeroed_state() {
        let tracker = public_tracker();

        let response = tracker.handle_announce(&mut sample_announce(6881)).await.unwrap();
        tracker.return_announce_response(response);

        // The pooled response must come back zeroed before the chain runs.
        let response = tracker.handle_announce(&mut sample_announce(6882)).await.unwrap();

        assert_eq!(response.ipv4_peers.len(), 1, "stale peers must not leak between requests");
    }

    #[tokio::test]
    async fn it_should_scrape_one_entry_per_requested_info_hash_in_request_order() {
        let tracker = public_tracker();

        let mut announce = sample_announce(6881);
        announce.left = 0;
        tracker
            .return_announce_response(tracker.handle_announce(&mut announce).await.unwrap());

        let response = tracker
            .handle_scrape(&ScrapeRequest {
                info_hashes: vec![InfoHash([7u8; 20]), InfoHash([9u8; 20])],
            })
            .await
            .unwrap();

        assert_eq!(response.files.len(), 2);
        assert_eq!(response.files[0].complete, 1);
        assert_eq!(response.files[1].complete, 0);
    }
}
