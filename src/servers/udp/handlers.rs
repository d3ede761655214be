//! Handlers for the UDP server.
//!
//! [`handle_packet`] is the per-datagram entry point. It parses the header,
//! gates every non-`connect` action on a valid connection ID, and delegates
//! to the handler for the requested action. Whatever goes wrong after the
//! header parsed, the client gets an error frame echoing its transaction ID;
//! only packets too short to carry a header are dropped without an answer,
//! so the tracker never amplifies unverifiable traffic.
use std::net::SocketAddr;

use tracing::{debug, instrument};
use torrust_udp_tracker_configuration::UdpTracker;

use super::request::{self, RequestHeader};
use super::response::Writer;
use super::{connection_cookie, Action, RawRequest, PROTOCOL_ID, UDP_TRACKER_LOG_TARGET};
use crate::core::error::{ClientError, Error};
use crate::core::statistics::{Event, RequestKind};
use crate::core::Tracker;
use crate::shared::clock;

/// The outcome of one datagram: the bytes to send back (none for silent
/// drops) and the labels for the response-time histogram.
#[derive(Debug)]
pub struct Handled {
    pub response: Option<Vec<u8>>,
    pub kind: Option<RequestKind>,
    pub error: Option<String>,
}

/// It handles one incoming UDP packet and produces the response frame.
#[instrument(skip(request, config, tracker), fields(from = %request.from))]
pub async fn handle_packet(request: &RawRequest, config: &UdpTracker, tracker: &Tracker) -> Handled {
    let packet = &request.payload[..];

    let Ok(header) = request::parse_header(packet) else {
        // No client packet is shorter than 16 bytes. Responding to one
        // would make this a reflector for whoever forged the source
        // address, so we explicitly return nothing.
        debug!(target: UDP_TRACKER_LOG_TARGET, from = %request.from, len = packet.len(), "dropping under-length packet");
        return Handled {
            response: None,
            kind: None,
            error: Some(ClientError::MalformedPacket.to_string()),
        };
    };

    let action = Action::from_request_id(header.action);
    let kind = request_kind(action);

    // Every action except `connect` must present a connection ID minted for
    // the address the packet claims to come from.
    if action != Some(Action::Connect) {
        if let Err(e) = connection_cookie::check(
            &header.connection_id.0,
            &request.from.ip(),
            clock::now(),
            connection_cookie::signing_key(&config.private_key),
            std::time::Duration::from_secs(u64::from(config.max_clock_skew_secs)),
        ) {
            debug!(target: UDP_TRACKER_LOG_TARGET, from = %request.from, %e, "rejecting connection id");
            return error_frame(&header, kind, &Error::from(ClientError::BadConnectionId));
        }
    }

    let result = match action {
        Some(Action::Connect) => handle_connect(&header, request.from, config, tracker).await,
        Some(Action::Announce) => handle_announce(packet, &header, request.from, config, tracker).await,
        Some(Action::Scrape) => handle_scrape(packet, &header, request.from, config, tracker).await,
        _ => Err(Error::from(ClientError::UnknownActionId)),
    };

    match result {
        Ok(response) => Handled {
            response: Some(response),
            kind,
            error: None,
        },
        Err(e) => error_frame(&header, kind, &e),
    }
}

/// It handles the `connect` request. The incoming connection ID must be the
/// magic initial value fixed by BEP 15; the response carries a cookie the
/// client uses for the next two minutes.
async fn handle_connect(
    header: &RequestHeader,
    from: SocketAddr,
    config: &UdpTracker,
    tracker: &Tracker,
) -> Result<Vec<u8>, Error> {
    if header.connection_id != PROTOCOL_ID {
        return Err(Error::from(ClientError::MalformedPacket));
    }

    let connection_id = connection_cookie::make(&from.ip(), clock::now(), connection_cookie::signing_key(&config.private_key));

    debug!(target: UDP_TRACKER_LOG_TARGET, %from, ?connection_id, "connect");

    let mut writer = Writer::new(header.transaction_id);
    writer.write_connection_id(connection_id);

    tracker.send_stats_event(Event::udp_request(RequestKind::Connect, &from)).await;

    Ok(writer.into_bytes())
}

/// It handles the `announce` request: decode, run the middleware chain,
/// encode. The response format follows the content (BEP 15 or BEP 45).
async fn handle_announce(
    packet: &[u8],
    header: &RequestHeader,
    from: SocketAddr,
    config: &UdpTracker,
    tracker: &Tracker,
) -> Result<Vec<u8>, Error> {
    let mut announce_request = request::parse_announce(packet, from.ip(), config.allow_ip_spoofing)?;

    debug!(target: UDP_TRACKER_LOG_TARGET, %from, info_hash = %announce_request.info_hash, "announce");

    let announce_response = tracker.handle_announce(&mut announce_request).await?;

    let mut writer = Writer::new(header.transaction_id);
    writer.write_announce(&announce_response);

    tracker.return_announce_response(announce_response);

    tracker.send_stats_event(Event::udp_request(RequestKind::Announce, &from)).await;

    Ok(writer.into_bytes())
}

/// It handles the `scrape` request: decode, run the middleware chain,
/// encode.
async fn handle_scrape(
    packet: &[u8],
    header: &RequestHeader,
    from: SocketAddr,
    config: &UdpTracker,
    tracker: &Tracker,
) -> Result<Vec<u8>, Error> {
    let scrape_request = request::parse_scrape(packet, config.max_scrape_torrents)?;

    debug!(target: UDP_TRACKER_LOG_TARGET, %from, hashes = scrape_request.info_hashes.len(), "scrape");

    let scrape_response = tracker.handle_scrape(&scrape_request).await?;

    let mut writer = Writer::new(header.transaction_id);
    writer.write_scrape(&scrape_response);

    tracker.send_stats_event(Event::udp_request(RequestKind::Scrape, &from)).await;

    Ok(writer.into_bytes())
}

fn request_kind(action: Option<Action>) -> Option<RequestKind> {
    match action? {
        Action::Connect => Some(RequestKind::Connect),
        Action::Announce => Some(RequestKind::Announce),
        Action::Scrape => Some(RequestKind::Scrape),
        Action::Error | Action::AnnounceDualStack => None,
    }
}

fn error_frame(header: &RequestHeader, kind: Option<RequestKind>, error: &Error) -> Handled {
    if error.client_reason().is_none() {
        tracing::error!(target: UDP_TRACKER_LOG_TARGET, %error, "request failed");
    }

    let mut writer = Writer::new(header.transaction_id);
    writer.write_error(error);

    // Keep internal reasons out of the histogram labels; the log line above
    // carries the detail.
    let label = error.client_reason().unwrap_or_else(|| "internal server error".to_owned());

    Handled {
        response: Some(writer.into_bytes()),
        kind,
        error: Some(label),
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use torrust_udp_tracker_configuration::{Configuration, Middleware as MiddlewareConfig, UdpTracker};

    use super::{handle_packet, Handled};
    use crate::core::error::Error;
    use crate::core::middleware::{
        AnnounceMiddleware, AnnounceNext, Registry, ScrapeMiddleware, ScrapeNext,
    };
    use crate::core::peer_store::MemoryPeerStore;
    use crate::core::statistics::RequestKind;
    use crate::core::{AnnounceRequest, AnnounceResponse, Policy, ScrapeRequest, ScrapeResponse, Tracker};
    use crate::servers::udp::connection_cookie;
    use crate::servers::udp::{RawRequest, PROTOCOL_ID};
    use crate::shared::clock;

    const PRIVATE_KEY: &str = "MyAccessTokenForTheTracker";

    fn sample_config() -> UdpTracker {
        UdpTracker {
            private_key: PRIVATE_KEY.to_owned(),
            ..UdpTracker::default()
        }
    }

    fn public_tracker() -> Tracker {
        Tracker::new(
            &Configuration::default(),
            &Registry::default(),
            Arc::new(MemoryPeerStore::new()),
            None,
        )
        .expect("a tracker with no middleware should always build")
    }

    fn sample_ipv4_remote_addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080)
    }

    fn raw_request(payload: Vec<u8>, from: SocketAddr) -> RawRequest {
        RawRequest { payload, from }
    }

    fn valid_cookie_for(from: &SocketAddr) -> [u8; 8] {
        connection_cookie::make(&from.ip(), clock::now(), PRIVATE_KEY.as_bytes())
    }

    /// A 98-byte announce frame with the given connection ID, from the
    /// given source.
    fn announce_packet(connection_id: [u8; 8]) -> Vec<u8> {
        let mut packet = Vec::new();
        packet.extend_from_slice(&connection_id);
        packet.extend_from_slice(&1u32.to_be_bytes());
        packet.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        packet.extend_from_slice(&[0xAA; 20]); // info hash
        packet.extend_from_slice(b"-qB00000000000000000"); // peer id
        packet.extend_from_slice(&0u64.to_be_bytes()); // downloaded
        packet.extend_from_slice(&512u64.to_be_bytes()); // left
        packet.extend_from_slice(&0u64.to_be_bytes()); // uploaded
        packet.extend_from_slice(&2u32.to_be_bytes()); // event: started
        packet.extend_from_slice(&[0u8; 4]); // ip
        packet.extend_from_slice(&0u32.to_be_bytes()); // key
        packet.extend_from_slice(&0i32.to_be_bytes()); // num want
        packet.extend_from_slice(&6881u16.to_be_bytes()); // port
        packet
    }

    async fn handle(payload: Vec<u8>, from: SocketAddr, tracker: &Tracker) -> Handled {
        handle_packet(&raw_request(payload, from), &sample_config(), tracker).await
    }

    fn connect_packet(connection_id: [u8; 8]) -> Vec<u8> {
        let mut packet = Vec::new();
        packet.extend_from_slice(&connection_id);
        packet.extend_from_slice(&0u32.to_be_bytes());
        packet.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        packet
    }

    mod for_connect_requests {
        use super::*;

        #[tokio::test]
        async fn it_should_answer_with_a_connection_id_that_verifies_for_the_source_address() {
            let from = sample_ipv4_remote_addr();

            let handled = handle(connect_packet(PROTOCOL_ID.0), from, &public_tracker()).await;

            let response = handled.response.expect("a connect request should get a response");
            assert_eq!(response.len(), 16);
            assert_eq!(&response[..8], &[0x00, 0x00, 0x00, 0x00, 0xDE, 0xAD, 0xBE, 0xEF]);

            let connection_id: [u8; 8] = response[8..16].try_into().unwrap();
            assert!(connection_cookie::check(
                &connection_id,
                &from.ip(),
                clock::now(),
                PRIVATE_KEY.as_bytes(),
                Duration::from_secs(10),
            )
            .is_ok());

            assert_eq!(handled.kind, Some(RequestKind::Connect));
            assert_eq!(handled.error, None);
        }

        #[tokio::test]
        async fn it_should_reject_a_connect_request_without_the_magic_connection_id() {
            let handled = handle(connect_packet([0u8; 8]), sample_ipv4_remote_addr(), &public_tracker()).await;

            let response = handled.response.expect("the transaction id must be echoed");
            assert_eq!(&response[..4], &[0x00, 0x00, 0x00, 0x03]);
            assert_eq!(&response[4..8], &[0xDE, 0xAD, 0xBE, 0xEF]);
            assert_eq!(&response[8..], b"malformed packet\0");
        }
    }

    mod for_announce_requests {
        use super::*;

        #[tokio::test]
        async fn it_should_reject_an_announce_whose_connection_id_was_never_minted() {
            let handled = handle(
                announce_packet([0x42; 8]),
                sample_ipv4_remote_addr(),
                &public_tracker(),
            )
            .await;

            let response = handled.response.expect("the transaction id must be echoed");
            assert_eq!(&response[..4], &[0x00, 0x00, 0x00, 0x03]);
            assert_eq!(&response[8..], b"bad connection ID\0");
            assert_eq!(handled.error.as_deref(), Some("bad connection ID"));
        }

        #[tokio::test]
        async fn it_should_reject_a_connection_id_minted_for_another_address() {
            let from = sample_ipv4_remote_addr();
            let elsewhere = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(126, 0, 0, 1)), 8080);

            let handled = handle(announce_packet(valid_cookie_for(&elsewhere)), from, &public_tracker()).await;

            let response = handled.response.unwrap();
            assert_eq!(&response[8..], b"bad connection ID\0");
        }

        #[tokio::test]
        async fn it_should_answer_an_announce_with_the_swarm_peers() {
            let tracker = public_tracker();

            // Another peer joins the swarm first.
            let other = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(126, 0, 0, 2)), 6882);
            let mut other_announce = announce_packet(valid_cookie_for(&other));
            other_announce[96..98].copy_from_slice(&6882u16.to_be_bytes());
            assert!(handle(other_announce, other, &tracker).await.error.is_none());

            let from = sample_ipv4_remote_addr();
            let handled = handle(announce_packet(valid_cookie_for(&from)), from, &tracker).await;

            let response = handled.response.unwrap();
            // action 1, txid, interval, leechers = 2, seeders = 0, one peer.
            assert_eq!(&response[..4], &[0x00, 0x00, 0x00, 0x01]);
            assert_eq!(&response[4..8], &[0xDE, 0xAD, 0xBE, 0xEF]);
            assert_eq!(&response[12..16], &2u32.to_be_bytes());
            assert_eq!(&response[16..20], &0u32.to_be_bytes());
            assert_eq!(&response[20..24], &[126, 0, 0, 2]);
            assert_eq!(&response[24..26], &6882u16.to_be_bytes());
            assert_eq!(response.len(), 26);
            assert_eq!(handled.kind, Some(RequestKind::Announce));
        }

        #[tokio::test]
        async fn it_should_reject_an_under_length_announce_with_a_valid_connection_id() {
            let from = sample_ipv4_remote_addr();
            let mut packet = announce_packet(valid_cookie_for(&from));
            packet.truncate(97);

            let handled = handle(packet, from, &public_tracker()).await;

            let response = handled.response.unwrap();
            assert_eq!(&response[8..], b"malformed packet\0");
        }

        #[tokio::test]
        async fn it_should_reject_an_announce_with_a_malformed_event() {
            let from = sample_ipv4_remote_addr();
            let mut packet = announce_packet(valid_cookie_for(&from));
            packet[83] = 4;

            let handled = handle(packet, from, &public_tracker()).await;

            let response = handled.response.unwrap();
            assert_eq!(&response[..4], &[0x00, 0x00, 0x00, 0x03]);
            assert_eq!(&response[4..8], &[0xDE, 0xAD, 0xBE, 0xEF]);
            assert_eq!(&response[8..], b"malformed event ID\0");
        }
    }

    mod for_dual_stack_announces {
        use super::*;

        /// Short-circuits the chain with a canned peer list: one IPv4 peer
        /// and two IPv6 peers.
        struct CannedPeers;

        #[async_trait]
        impl AnnounceMiddleware for CannedPeers {
            async fn handle_announce(
                &self,
                _policy: &Policy,
                _request: &mut AnnounceRequest,
                response: &mut AnnounceResponse,
                _next: AnnounceNext<'_>,
            ) -> Result<(), Error> {
                response.interval = Duration::from_secs(120);
                response.ipv4_peers.push(SocketAddrV4::new(Ipv4Addr::new(126, 0, 0, 1), 6881));
                response
                    .ipv6_peers
                    .push(SocketAddrV6::new(Ipv6Addr::new(0x6969, 0, 0, 0, 0, 0, 0, 1), 6882, 0, 0));
                response
                    .ipv6_peers
                    .push(SocketAddrV6::new(Ipv6Addr::new(0x6969, 0, 0, 0, 0, 0, 0, 2), 6883, 0, 0));
                Ok(())
            }
        }

        #[tokio::test]
        async fn it_should_use_the_dual_stack_format_when_the_response_has_ipv6_peers() {
            let mut registry = Registry::default();
            registry.register_announce("canned_peers", |_config| Ok(Box::new(CannedPeers)));

            let configuration = Configuration {
                announce_middleware: vec![MiddlewareConfig::from_name("canned_peers")],
                ..Configuration::default()
            };

            let tracker = Tracker::new(
                &configuration,
                &registry,
                Arc::new(MemoryPeerStore::new()),
                None,
            )
            .unwrap();

            let from = sample_ipv4_remote_addr();
            let handled = handle(announce_packet(valid_cookie_for(&from)), from, &tracker).await;

            let response = handled.response.unwrap();
            assert_eq!(&response[..4], &[0x00, 0x00, 0x00, 0x04]);
            assert_eq!(&response[20..24], &1u32.to_be_bytes(), "ipv4 peer count");
            assert_eq!(&response[24..28], &2u32.to_be_bytes(), "ipv6 peer count");
            assert_eq!(response.len(), 28 + 6 + 36);
        }
    }

    mod for_scrape_requests {
        use super::*;

        fn scrape_packet(connection_id: [u8; 8], hash_count: usize) -> Vec<u8> {
            let mut packet = Vec::new();
            packet.extend_from_slice(&connection_id);
            packet.extend_from_slice(&2u32.to_be_bytes());
            packet.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
            for i in 0..hash_count {
                #[allow(clippy::cast_possible_truncation)]
                packet.extend_from_slice(&[i as u8; 20]);
            }
            packet
        }

        /// Short-circuits the chain with canned swarm statistics.
        struct CannedStats;

        #[async_trait]
        impl ScrapeMiddleware for CannedStats {
            async fn handle_scrape(
                &self,
                _policy: &Policy,
                request: &ScrapeRequest,
                response: &mut ScrapeResponse,
                _next: ScrapeNext<'_>,
            ) -> Result<(), Error> {
                use torrust_udp_tracker_primitives::swarm_metadata::SwarmMetadata;

                assert_eq!(request.info_hashes.len(), 3);
                for (complete, incomplete) in [(5u32, 10u32), (0, 1), (100, 100)] {
                    response.files.push(SwarmMetadata {
                        downloaded: 0,
                        complete,
                        incomplete,
                    });
                }
                Ok(())
            }
        }

        #[tokio::test]
        async fn it_should_answer_a_scrape_with_one_stats_triple_per_requested_hash() {
            let mut registry = Registry::default();
            registry.register_scrape("canned_stats", |_config| Ok(Box::new(CannedStats)));

            let configuration = Configuration {
                scrape_middleware: vec![MiddlewareConfig::from_name("canned_stats")],
                ..Configuration::default()
            };

            let tracker = Tracker::new(
                &configuration,
                &registry,
                Arc::new(MemoryPeerStore::new()),
                None,
            )
            .unwrap();

            let from = sample_ipv4_remote_addr();
            let handled = handle(scrape_packet(valid_cookie_for(&from), 3), from, &tracker).await;

            let response = handled.response.unwrap();
            assert_eq!(response.len(), 8 + 36);
            assert_eq!(&response[..4], &[0x00, 0x00, 0x00, 0x02]);
            assert_eq!(&response[8..12], &5u32.to_be_bytes());
            assert_eq!(&response[12..16], &0u32.to_be_bytes());
            assert_eq!(&response[16..20], &10u32.to_be_bytes());
            assert_eq!(&response[32..36], &100u32.to_be_bytes());
        }

        #[tokio::test]
        async fn it_should_scrape_against_the_peer_store_by_default() {
            let from = sample_ipv4_remote_addr();

            let handled = handle(scrape_packet(valid_cookie_for(&from), 1), from, &public_tracker()).await;

            let response = handled.response.unwrap();
            assert_eq!(response.len(), 8 + 12);
            // Unknown torrent: all three counters zero.
            assert_eq!(&response[8..20], &[0u8; 12]);
        }
    }

    mod for_statistics {
        use futures::future;
        use mockall::predicate::eq;

        use super::*;
        use crate::core::statistics::{Event, IpFamily, MockEventSender};

        #[tokio::test]
        async fn it_should_send_the_ipv4_connect_event_when_an_ipv4_client_connects() {
            let mut stats_event_sender_mock = MockEventSender::new();
            stats_event_sender_mock
                .expect_send_event()
                .with(eq(Event::UdpRequest {
                    kind: RequestKind::Connect,
                    family: IpFamily::V4,
                }))
                .times(1)
                .returning(|_| Box::pin(future::ready(Some(Ok(())))));

            let tracker = Tracker::new(
                &Configuration::default(),
                &Registry::default(),
                Arc::new(MemoryPeerStore::new()),
                Some(Box::new(stats_event_sender_mock)),
            )
            .unwrap();

            handle(connect_packet(PROTOCOL_ID.0), sample_ipv4_remote_addr(), &tracker).await;
        }

        #[tokio::test]
        async fn it_should_send_the_ipv6_announce_event_when_an_ipv6_client_announces() {
            let mut stats_event_sender_mock = MockEventSender::new();
            stats_event_sender_mock
                .expect_send_event()
                .with(eq(Event::UdpRequest {
                    kind: RequestKind::Announce,
                    family: IpFamily::V6,
                }))
                .times(1)
                .returning(|_| Box::pin(future::ready(Some(Ok(())))));

            let tracker = Tracker::new(
                &Configuration::default(),
                &Registry::default(),
                Arc::new(MemoryPeerStore::new()),
                Some(Box::new(stats_event_sender_mock)),
            )
            .unwrap();

            let from = SocketAddr::new(IpAddr::V6(Ipv6Addr::new(0x6969, 0, 0, 0, 0, 0, 0, 1)), 8080);
            let handled = handle(announce_packet(valid_cookie_for(&from)), from, &tracker).await;

            assert!(handled.error.is_none());
        }
    }

    mod for_invalid_packets {
        use super::*;

        #[tokio::test]
        async fn it_should_stay_silent_for_packets_shorter_than_the_header() {
            let handled = handle(vec![0x42; 8], sample_ipv4_remote_addr(), &public_tracker()).await;

            assert!(handled.response.is_none());
            assert_eq!(handled.kind, None);
        }

        #[tokio::test]
        async fn it_should_reject_an_unknown_action_with_an_error_frame() {
            let from = sample_ipv4_remote_addr();

            let mut packet = Vec::new();
            packet.extend_from_slice(&valid_cookie_for(&from));
            packet.extend_from_slice(&9u32.to_be_bytes());
            packet.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

            let handled = handle(packet, from, &public_tracker()).await;

            let response = handled.response.unwrap();
            assert_eq!(&response[..4], &[0x00, 0x00, 0x00, 0x03]);
            assert_eq!(&response[4..8], &[0xDE, 0xAD, 0xBE, 0xEF]);
            assert_eq!(&response[8..], b"unknown action ID\0");
            assert_eq!(handled.kind, None);
        }

        #[tokio::test]
        async fn it_should_turn_a_middleware_crash_into_a_generic_internal_error() {
            struct Faulty;

            #[async_trait]
            impl AnnounceMiddleware for Faulty {
                async fn handle_announce(
                    &self,
                    _policy: &Policy,
                    _request: &mut AnnounceRequest,
                    _response: &mut AnnounceResponse,
                    _next: AnnounceNext<'_>,
                ) -> Result<(), Error> {
                    Err(Error::internal("the peer store is on fire"))
                }
            }

            let mut registry = Registry::default();
            registry.register_announce("faulty", |_config| Ok(Box::new(Faulty)));

            let configuration = Configuration {
                announce_middleware: vec![MiddlewareConfig::from_name("faulty")],
                ..Configuration::default()
            };

            let tracker = Tracker::new(&configuration, &registry, Arc::new(MemoryPeerStore::new()), None).unwrap();

            let from = sample_ipv4_remote_addr();
            let handled = handle(announce_packet(valid_cookie_for(&from)), from, &tracker).await;

            let response = handled.response.unwrap();
            let reason = std::str::from_utf8(&response[8..response.len() - 1]).unwrap();
            assert!(reason.starts_with("internal error occurred: "));
            assert_eq!(handled.error.as_deref(), Some("internal server error"));
        }
    }
}
