//! Decoding of UDP tracker requests (BEP 15, 41 and 45).
//!
//! Every parse failure maps to a [`ClientError`] whose reason the caller
//! echoes back inside an error frame. The one exception is the 16-byte
//! header check: packets too short to carry a transaction ID are dropped
//! without a response (see
//! [`handlers`](crate::servers::udp::handlers)).
//!
//! Announce packets have this layout (all integers big-endian):
//!
//! ```text
//! offset  0  connection_id   8 bytes
//! offset  8  action          4 bytes (1)
//! offset 12  transaction_id  4 bytes
//! offset 16  info_hash      20 bytes
//! offset 36  peer_id        20 bytes
//! offset 56  downloaded      8 bytes
//! offset 64  left            8 bytes
//! offset 72  uploaded        8 bytes
//! offset 80  event           4 bytes (only the low byte is used)
//! offset 84  ip address      4 bytes (0 = use the source address)
//! offset 88  key             4 bytes (ignored)
//! offset 92  num_want        4 bytes (signed; <= 0 = server decides)
//! offset 96  port            2 bytes
//! offset 98  options         BEP 41 TLV entries, optional
//! ```
use std::io::{Cursor, Read};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use byteorder::{NetworkEndian, ReadBytesExt};
use torrust_udp_tracker_primitives::announce_event::AnnounceEvent;
use torrust_udp_tracker_primitives::info_hash::InfoHash;
use torrust_udp_tracker_primitives::peer_id::PeerId;

use super::{ConnectionId, TransactionId};
use crate::core::error::ClientError;
use crate::core::{AnnounceRequest, ScrapeRequest};

/// Option types described in BEP 41 and BEP 45.
const OPTION_END_OF_OPTIONS: u8 = 0x0;
const OPTION_NOP: u8 = 0x1;
const OPTION_URL_DATA: u8 = 0x2;
const OPTION_IPV6: u8 = 0x3;

/// Offset where the BEP 41 options start in an announce packet.
const ANNOUNCE_OPTIONS_OFFSET: usize = 98;

const EMPTY_IPV4: [u8; 4] = [0; 4];
const EMPTY_IPV6: [u8; 16] = [0; 16];

/// The first 16 bytes of every client packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    /// Opaque at this layer; validated against the source address for every
    /// action except `connect`.
    pub connection_id: ConnectionId,
    /// Raw action identifier; the dispatcher decides what it means (unknown
    /// values must survive decoding to be answered with an error).
    pub action: u32,
    /// Echoed byte-for-byte in the response.
    pub transaction_id: TransactionId,
}

/// Parses the common 16-byte header.
///
/// # Errors
///
/// Will return a `ClientError` if the packet is shorter than 16 bytes. No
/// client packet is that short, so the caller treats this case as noise and
/// stays silent.
pub fn parse_header(packet: &[u8]) -> Result<RequestHeader, ClientError> {
    if packet.len() < 16 {
        return Err(ClientError::MalformedPacket);
    }

    Ok(RequestHeader {
        connection_id: ConnectionId(packet[0..8].try_into().expect("an 8-byte slice fits an 8-byte array")),
        action: u32::from_be_bytes(packet[8..12].try_into().expect("a 4-byte slice fits a 4-byte array")),
        transaction_id: TransactionId(packet[12..16].try_into().expect("a 4-byte slice fits a 4-byte array")),
    })
}

/// Parses an announce request body.
///
/// The peer addresses are resolved here: the IPv4 field of the packet and
/// the BEP 45 IPv6 option are only honoured when `allow_ip_spoofing` is set
/// and they are non-zero; otherwise the source address wins. An IPv4-mapped
/// IPv6 source is normalised to its 4-byte form.
///
/// # Errors
///
/// Will return a `ClientError` if the packet is shorter than 98 bytes, the
/// event identifier is unknown, or an option entry runs past the end of the
/// packet.
pub fn parse_announce(packet: &[u8], source_ip: IpAddr, allow_ip_spoofing: bool) -> Result<AnnounceRequest, ClientError> {
    if packet.len() < ANNOUNCE_OPTIONS_OFFSET {
        return Err(ClientError::MalformedPacket);
    }

    let mut cursor = Cursor::new(packet);
    cursor.set_position(16);

    let mut info_hash = [0u8; 20];
    read(&mut cursor, &mut info_hash)?;
    let mut peer_id = [0u8; 20];
    read(&mut cursor, &mut peer_id)?;

    let downloaded = cursor.read_u64::<NetworkEndian>().map_err(|_| ClientError::MalformedPacket)?;
    let left = cursor.read_u64::<NetworkEndian>().map_err(|_| ClientError::MalformedPacket)?;
    let uploaded = cursor.read_u64::<NetworkEndian>().map_err(|_| ClientError::MalformedPacket)?;

    // Only the low byte of the 4-byte event field carries the event.
    let event_raw = cursor.read_u32::<NetworkEndian>().map_err(|_| ClientError::MalformedPacket)?;
    #[allow(clippy::cast_possible_truncation)]
    let event_id = (event_raw & 0xff) as u8;
    if event_id > 3 {
        return Err(ClientError::MalformedEventId);
    }

    let mut ipv4_bytes = [0u8; 4];
    read(&mut cursor, &mut ipv4_bytes)?;

    // The key field identifies a peer across address changes; this tracker
    // does not use it.
    let _key = cursor.read_u32::<NetworkEndian>().map_err(|_| ClientError::MalformedPacket)?;

    let num_want = cursor.read_i32::<NetworkEndian>().map_err(|_| ClientError::MalformedPacket)?;
    let num_want = num_want.max(0);

    let port = cursor.read_u16::<NetworkEndian>().map_err(|_| ClientError::MalformedPacket)?;

    let (mut ip_v4, mut ip_v6) = resolve_source_ip(source_ip);

    if allow_ip_spoofing && ipv4_bytes != EMPTY_IPV4 {
        ip_v4 = Some(Ipv4Addr::from(ipv4_bytes));
    }

    let options = parse_optional_parameters(&packet[ANNOUNCE_OPTIONS_OFFSET..])?;

    if allow_ip_spoofing {
        if let Some(spoofed_v6) = options.ipv6 {
            ip_v6 = Some(spoofed_v6);
        }
    }

    Ok(AnnounceRequest {
        info_hash: InfoHash(info_hash),
        peer_id: PeerId(peer_id),
        downloaded,
        left,
        uploaded,
        event: AnnounceEvent::from_event_id(event_id),
        ip_v4,
        ip_v6,
        port,
        num_want,
        url_data: options.url_data,
    })
}

/// Parses a scrape request body: a list of 1 to `max_scrape_torrents`
/// info-hashes.
///
/// # Errors
///
/// Will return a `ClientError` if the packet is shorter than 36 bytes, the
/// body is not a whole number of 20-byte hashes, or the list exceeds the
/// configured limit.
pub fn parse_scrape(packet: &[u8], max_scrape_torrents: u8) -> Result<ScrapeRequest, ClientError> {
    // A scrape carries at least one info-hash.
    if packet.len() < 36 {
        return Err(ClientError::MalformedPacket);
    }

    let body = &packet[16..];
    if body.len() % 20 != 0 {
        return Err(ClientError::MalformedPacket);
    }

    if body.len() / 20 > usize::from(max_scrape_torrents) {
        return Err(ClientError::ExceededInfoHashLimit);
    }

    let info_hashes = body.chunks_exact(20).map(InfoHash::from_bytes).collect();

    Ok(ScrapeRequest { info_hashes })
}

/// The peer addresses implied by the source address alone.
fn resolve_source_ip(source_ip: IpAddr) -> (Option<Ipv4Addr>, Option<Ipv6Addr>) {
    match source_ip {
        IpAddr::V4(ip) => (Some(ip), None),
        IpAddr::V6(ip) => match ip.to_ipv4_mapped() {
            Some(mapped) => (Some(mapped), None),
            None => (None, Some(ip)),
        },
    }
}

#[derive(Default)]
struct OptionalParameters {
    ipv6: Option<Ipv6Addr>,
    url_data: Option<Vec<u8>>,
}

/// Walks the BEP 41 option entries that follow the fixed announce section.
///
/// URL-data segments are concatenated and kept as opaque bytes. An unknown
/// option type ends the walk silently, since its length is unknowable. Every
/// read is bounds-checked; running past the packet is a client error.
fn parse_optional_parameters(options: &[u8]) -> Result<OptionalParameters, ClientError> {
    let mut parsed = OptionalParameters::default();
    let mut i = 0;

    while i < options.len() {
        match options[i] {
            OPTION_END_OF_OPTIONS => break,

            OPTION_NOP => i += 1,

            OPTION_URL_DATA => {
                let Some(&length) = options.get(i + 1) else {
                    return Err(ClientError::MalformedPacket);
                };

                let start = i + 2;
                let end = start + usize::from(length);
                let Some(segment) = options.get(start..end) else {
                    return Err(ClientError::MalformedPacket);
                };

                parsed.url_data.get_or_insert_with(Vec::new).extend_from_slice(segment);

                i = end;
            }

            OPTION_IPV6 => {
                let Some(segment) = options.get(i + 1..i + 17) else {
                    return Err(ClientError::MalformedPacket);
                };

                let octets: [u8; 16] = segment.try_into().expect("a 16-byte slice fits a 16-byte array");
                if octets != EMPTY_IPV6 {
                    parsed.ipv6 = Some(Ipv6Addr::from(octets));
                }

                i += 17;
            }

            _ => break,
        }
    }

    Ok(parsed)
}

fn read(cursor: &mut Cursor<&[u8]>, buffer: &mut [u8]) -> Result<(), ClientError> {
    cursor.read_exact(buffer).map_err(|_| ClientError::MalformedPacket)
}
