//! Encoding of UDP tracker responses (BEP 15 and 45).
//!
//! A [`Writer`] is created per packet with the transaction ID to echo, and
//! the handler calls exactly one of the `write_*` methods. Announce
//! responses pick their wire format by content: the BEP 45 dual-stack frame
//! (action 4) is used iff the response carries any IPv6 peer, the plain
//! BEP 15 frame (action 1) otherwise.
//!
//! Peer entries are fixed-width compact records: 6 bytes (4-byte IP, 2-byte
//! port) for IPv4, 18 bytes for IPv6.
use byteorder::{NetworkEndian, WriteBytesExt};

use super::connection_cookie::Cookie;
use super::{Action, TransactionId};
use crate::core::error::Error;
use crate::core::{AnnounceResponse, ScrapeResponse};

/// Builds one response frame.
pub struct Writer {
    buffer: Vec<u8>,
    transaction_id: TransactionId,
}

impl Writer {
    #[must_use]
    pub fn new(transaction_id: TransactionId) -> Self {
        Self {
            buffer: Vec::with_capacity(200),
            transaction_id,
        }
    }

    /// Encodes a `connect` response carrying a freshly minted connection ID.
    pub fn write_connection_id(&mut self, connection_id: Cookie) {
        self.write_header(Action::Connect);
        self.buffer.extend_from_slice(&connection_id);
    }

    /// Encodes an announce response, selecting the proper wire format for
    /// its peer lists.
    pub fn write_announce(&mut self, response: &AnnounceResponse) {
        if response.ipv6_peers.is_empty() {
            self.write_announce_ipv4(response);
        } else {
            self.write_announce_dual_stack(response);
        }
    }

    /// Encodes an announce response according to BEP 15.
    fn write_announce_ipv4(&mut self, response: &AnnounceResponse) {
        self.write_header(Action::Announce);
        self.write_announce_stats(response);

        for peer in &response.ipv4_peers {
            self.buffer.extend_from_slice(&peer.ip().octets());
            self.write_u16(peer.port());
        }
    }

    /// Encodes an announce response according to BEP 45: both peer lists,
    /// prefixed with their entry counts.
    fn write_announce_dual_stack(&mut self, response: &AnnounceResponse) {
        self.write_header(Action::AnnounceDualStack);
        self.write_announce_stats(response);

        #[allow(clippy::cast_possible_truncation)]
        self.write_u32(response.ipv4_peers.len() as u32);
        #[allow(clippy::cast_possible_truncation)]
        self.write_u32(response.ipv6_peers.len() as u32);

        for peer in &response.ipv4_peers {
            self.buffer.extend_from_slice(&peer.ip().octets());
            self.write_u16(peer.port());
        }

        for peer in &response.ipv6_peers {
            self.buffer.extend_from_slice(&peer.ip().octets());
            self.write_u16(peer.port());
        }
    }

    fn write_announce_stats(&mut self, response: &AnnounceResponse) {
        #[allow(clippy::cast_possible_truncation)]
        self.write_u32(response.interval.as_secs() as u32);
        self.write_u32(response.incomplete);
        self.write_u32(response.complete);
    }

    /// Encodes a scrape response according to BEP 15: one
    /// seeders/completed/leechers triple per requested info-hash.
    pub fn write_scrape(&mut self, response: &ScrapeResponse) {
        self.write_header(Action::Scrape);

        for file in &response.files {
            self.write_u32(file.complete);
            self.write_u32(file.downloaded);
            self.write_u32(file.incomplete);
        }
    }

    /// Encodes an error response: a UTF-8 reason terminated by a NUL byte.
    ///
    /// Client errors are echoed verbatim. Anything else is acknowledged
    /// without exposing tracker internals as a protocol failure, so clients
    /// know to retry later.
    pub fn write_error(&mut self, error: &Error) {
        let reason = match error {
            Error::Client(client_error) => client_error.to_string(),
            Error::Internal { message, .. } => format!("internal error occurred: {message}"),
        };

        self.write_header(Action::Error);
        self.buffer.extend_from_slice(reason.as_bytes());
        self.buffer.push(0);
    }

    /// All the bytes written so far.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Every response begins with the action and the echoed transaction ID.
    fn write_header(&mut self, action: Action) {
        let transaction_id = self.transaction_id;
        self.write_u32(action.id());
        self.buffer.extend_from_slice(&transaction_id.0);
    }

    fn write_u32(&mut self, value: u32) {
        self.buffer
            .write_u32::<NetworkEndian>(value)
            .expect("writing to a Vec never fails");
    }

    fn write_u16(&mut self, value: u16) {
        self.buffer
            .write_u16::<NetworkEndian>(value)
            .expect("writing to a Vec never fails");
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr, SocketAddrV4, SocketAddrV6};
    use std::time::Duration;

    use torrust_udp_tracker_primitives::swarm_metadata::SwarmMetadata;

    use super::Writer;
    use crate::core::error::{ClientError, Error};
    use crate::core::{AnnounceResponse, ScrapeResponse};
    use crate::servers::udp::TransactionId;

    const TRANSACTION_ID: TransactionId = TransactionId([0xDE, 0xAD, 0xBE, 0xEF]);

    fn sample_announce_response() -> AnnounceResponse {
        AnnounceResponse {
            interval: Duration::from_secs(120),
            min_interval: Duration::from_secs(120),
            complete: 3,
            incomplete: 5,
            compact: true,
            ipv4_peers: vec![SocketAddrV4::new(Ipv4Addr::new(126, 0, 0, 1), 6881)],
            ipv6_peers: vec![],
        }
    }

    #[test]
    fn a_connect_response_should_be_16_bytes_echoing_the_transaction_id() {
        let mut writer = Writer::new(TRANSACTION_ID);

        writer.write_connection_id([1, 2, 3, 4, 5, 6, 7, 8]);
        let bytes = writer.into_bytes();

        assert_eq!(
            bytes,
            vec![
                0x00, 0x00, 0x00, 0x00, // action: connect
                0xDE, 0xAD, 0xBE, 0xEF, // transaction id
                1, 2, 3, 4, 5, 6, 7, 8, // connection id
            ]
        );
    }

    #[test]
    fn an_ipv4_announce_response_should_use_action_1_and_6_byte_peer_records() {
        let mut writer = Writer::new(TRANSACTION_ID);

        writer.write_announce(&sample_announce_response());
        let bytes = writer.into_bytes();

        assert_eq!(
            bytes,
            vec![
                0x00, 0x00, 0x00, 0x01, // action: announce
                0xDE, 0xAD, 0xBE, 0xEF, // transaction id
                0x00, 0x00, 0x00, 0x78, // interval: 120
                0x00, 0x00, 0x00, 0x05, // leechers
                0x00, 0x00, 0x00, 0x03, // seeders
                126, 0, 0, 1, 0x1A, 0xE1, // the one peer
            ]
        );
    }

    #[test]
    fn an_announce_response_with_ipv6_peers_should_use_the_dual_stack_format() {
        let mut response = sample_announce_response();
        response.ipv6_peers = vec![
            SocketAddrV6::new(Ipv6Addr::new(0x6969, 0, 0, 0, 0, 0, 0, 1), 6882, 0, 0),
            SocketAddrV6::new(Ipv6Addr::new(0x6969, 0, 0, 0, 0, 0, 0, 2), 6883, 0, 0),
        ];

        let mut writer = Writer::new(TRANSACTION_ID);
        writer.write_announce(&response);
        let bytes = writer.into_bytes();

        // action 4, then the shared stats, then both peer counts.
        assert_eq!(bytes[..4], [0x00, 0x00, 0x00, 0x04]);
        assert_eq!(bytes[20..24], [0x00, 0x00, 0x00, 0x01]); // ipv4 count
        assert_eq!(bytes[24..28], [0x00, 0x00, 0x00, 0x02]); // ipv6 count

        // 28-byte preamble, one 6-byte IPv4 record, two 18-byte IPv6 records.
        assert_eq!(bytes.len(), 28 + 6 + 36);
    }

    #[test]
    fn a_scrape_response_should_carry_12_bytes_per_requested_info_hash() {
        let response = ScrapeResponse {
            files: vec![
                SwarmMetadata {
                    downloaded: 0,
                    complete: 5,
                    incomplete: 10,
                },
                SwarmMetadata {
                    downloaded: 0,
                    complete: 0,
                    incomplete: 1,
                },
                SwarmMetadata {
                    downloaded: 0,
                    complete: 100,
                    incomplete: 100,
                },
            ],
        };

        let mut writer = Writer::new(TRANSACTION_ID);
        writer.write_scrape(&response);
        let bytes = writer.into_bytes();

        assert_eq!(bytes.len(), 8 + 12 * 3);
        assert_eq!(bytes[..4], [0x00, 0x00, 0x00, 0x02]);
        assert_eq!(
            bytes[8..20],
            [
                0x00, 0x00, 0x00, 0x05, // seeders
                0x00, 0x00, 0x00, 0x00, // completed (zeroed when untracked)
                0x00, 0x00, 0x00, 0x0A, // leechers
            ]
        );
    }

    #[test]
    fn a_client_error_should_be_echoed_verbatim_nul_terminated() {
        let mut writer = Writer::new(TRANSACTION_ID);

        writer.write_error(&Error::from(ClientError::BadConnectionId));
        let bytes = writer.into_bytes();

        assert_eq!(bytes[..4], [0x00, 0x00, 0x00, 0x03]);
        assert_eq!(bytes[4..8], TRANSACTION_ID.0);
        assert_eq!(&bytes[8..], b"bad connection ID\0");
    }

    #[test]
    fn an_internal_error_should_be_reworded_before_reaching_the_client() {
        let mut writer = Writer::new(TRANSACTION_ID);

        writer.write_error(&Error::internal("the peer store is on fire"));
        let bytes = writer.into_bytes();

        let reason = std::str::from_utf8(&bytes[8..bytes.len() - 1]).unwrap();

        assert!(reason.starts_with("internal error occurred: "));
        assert!(reason.contains("the peer store is on fire"));
        assert_eq!(bytes[bytes.len() - 1], 0);
    }
}
