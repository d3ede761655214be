//! Logic for generating and verifying connection IDs.
//!
//! The UDP tracker requires the client to connect before it can announce or
//! scrape. The server responds to a `connect` request with an 8-byte
//! connection ID that the client must echo in every follow-up request, for
//! as long as the ID stays valid (two minutes, per BEP 15).
//!
//! The simplest implementation would mint a random number per client and
//! remember it, but then every half-open "connection" costs server memory
//! and a flood of `connect` packets becomes a memory exhaustion attack.
//! Instead the ID is derived from the client address and the mint time, so
//! the server can verify it without storing anything:
//!
//! ```text
//! connection ID = timestamp (4 bytes) ‖ HMAC-SHA256(key, timestamp ‖ client IP)[0..4]
//! ```
//!
//! The timestamp gives the ID its lifetime: it is rejected two minutes after
//! minting, or when it claims to come from further in the future than the
//! configured clock skew allows. The truncated MAC binds the ID to the
//! source address: a client that spoofs its address never sees the response
//! carrying the ID, and forging one blind is a 1-in-2³² shot per attempt. A
//! hit only buys a two-minute window to speak for the spoofed address.
//!
//! The key comes from the `private_key` configuration option, so a pool of
//! tracker instances behind one name can validate each other's IDs. When no
//! key is configured, [`signing_key`] falls back to the random
//! [instance seed](crate::shared::crypto::instance_seed) of this process.
use std::net::IpAddr;
use std::panic::Location;
use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use torrust_udp_tracker_primitives::DurationSinceUnixEpoch;

use crate::shared::crypto;

type HmacSha256 = Hmac<Sha256>;

/// An 8-byte connection ID on the wire.
pub type Cookie = [u8; 8];

/// How long a minted cookie stays valid (BEP 15 recommends two minutes).
pub const COOKIE_LIFETIME: Duration = Duration::from_secs(120);

/// Why a cookie failed verification. All variants reach the client as the
/// same `bad connection ID` reason; the distinction is for logs.
#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("connection cookie expired, {location}")]
    Expired { location: &'static Location<'static> },

    #[error("connection cookie is dated too far in the future, {location}")]
    FutureDated { location: &'static Location<'static> },

    #[error("connection cookie does not match the source address, {location}")]
    InvalidMac { location: &'static Location<'static> },
}

/// The key cookies are minted and checked with: the configured private key,
/// or the ephemeral instance seed when none is set.
#[must_use]
pub fn signing_key(private_key: &str) -> &[u8] {
    if private_key.is_empty() {
        crypto::instance_seed()
    } else {
        private_key.as_bytes()
    }
}

/// Generates a new connection cookie for the given source address.
#[must_use]
pub fn make(remote_ip: &IpAddr, now: DurationSinceUnixEpoch, key: &[u8]) -> Cookie {
    let mut cookie: Cookie = [0u8; 8];

    #[allow(clippy::cast_possible_truncation)]
    let timestamp = now.as_secs() as u32;
    cookie[..4].copy_from_slice(&timestamp.to_be_bytes());

    let tag = keyed_mac(&cookie[..4], remote_ip, key).finalize().into_bytes();
    cookie[4..].copy_from_slice(&tag[..4]);

    cookie
}

/// Checks that the supplied cookie was minted by us, for this source
/// address, within its lifetime.
///
/// # Errors
///
/// Will return a `ValidationError` if the cookie expired, claims a mint time
/// beyond `max_clock_skew` in the future, or carries a MAC that does not
/// match the source address.
pub fn check(
    cookie: &Cookie,
    remote_ip: &IpAddr,
    now: DurationSinceUnixEpoch,
    key: &[u8],
    max_clock_skew: Duration,
) -> Result<(), ValidationError> {
    let timestamp_bytes: [u8; 4] = cookie[..4].try_into().expect("a cookie always holds 4 timestamp bytes");
    let minted_at = Duration::from_secs(u64::from(u32::from_be_bytes(timestamp_bytes)));

    if now > minted_at + COOKIE_LIFETIME {
        return Err(ValidationError::Expired {
            location: Location::caller(),
        });
    }

    if minted_at > now + max_clock_skew {
        return Err(ValidationError::FutureDated {
            location: Location::caller(),
        });
    }

    // Constant-time comparison of the truncated MAC.
    keyed_mac(&cookie[..4], remote_ip, key)
        .verify_truncated_left(&cookie[4..])
        .map_err(|_| ValidationError::InvalidMac {
            location: Location::caller(),
        })
}

/// The MAC over the timestamp and the canonical encoding of the IP: 4 bytes
/// for IPv4 (including IPv4-mapped IPv6 sources), 16 bytes otherwise.
fn keyed_mac(timestamp_bytes: &[u8], remote_ip: &IpAddr, key: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any size");

    mac.update(timestamp_bytes);

    match remote_ip {
        IpAddr::V4(ip) => mac.update(&ip.octets()),
        IpAddr::V6(ip) => match ip.to_ipv4_mapped() {
            Some(mapped) => mac.update(&mapped.octets()),
            None => mac.update(&ip.octets()),
        },
    }

    mac
}
