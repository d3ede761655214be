//! Configuration for the UDP tracker service.
//!
//! The `private_key` deserves a note: connection IDs are minted by keying an
//! HMAC with it, so every instance behind the same anycast/DNS name must
//! share the same key or clients bouncing between instances will be asked to
//! reconnect constantly.
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Configuration for the UDP tracker service.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct UdpTracker {
    /// The address the tracker will bind to, in `ip:port` form. Use port `0`
    /// to let the operating system choose a random port.
    #[serde(default = "UdpTracker::default_bind_address")]
    pub bind_address: String,

    /// Secret key for minting connection IDs. When left empty the tracker
    /// derives an ephemeral instance key at startup: fine for a single
    /// instance, but connection IDs then die with the process, so a pool of
    /// instances must configure a shared key.
    #[serde(default)]
    pub private_key: String,

    /// Kernel receive buffer size for the socket, in bytes. `0` keeps the
    /// kernel default.
    #[serde(default)]
    pub read_buffer_size: usize,

    /// Weather to honour client-supplied IP addresses in announce requests.
    /// Off by default: a spoofed address turns the tracker into a traffic
    /// reflector.
    #[serde(default)]
    pub allow_ip_spoofing: bool,

    /// Accepted future clock skew, in seconds, when validating connection-ID
    /// timestamps.
    #[serde(default = "UdpTracker::default_max_clock_skew_secs")]
    pub max_clock_skew_secs: u32,

    /// Maximum number of info-hashes accepted in a single scrape request.
    #[serde(default = "UdpTracker::default_max_scrape_torrents")]
    pub max_scrape_torrents: u8,
}

impl Default for UdpTracker {
    fn default() -> Self {
        Self {
            bind_address: Self::default_bind_address(),
            private_key: String::new(),
            read_buffer_size: 0,
            allow_ip_spoofing: false,
            max_clock_skew_secs: Self::default_max_clock_skew_secs(),
            max_scrape_torrents: Self::default_max_scrape_torrents(),
        }
    }
}

impl UdpTracker {
    fn default_bind_address() -> String {
        "0.0.0.0:6969".to_owned()
    }

    fn default_max_clock_skew_secs() -> u32 {
        10
    }

    /// 74 is the maximum number of 20-byte hashes that fit in a 1496-byte
    /// scrape packet (BEP 15).
    fn default_max_scrape_torrents() -> u8 {
        74
    }

    /// Static validation: the bind address must parse.
    ///
    /// # Errors
    ///
    /// Will return a `ValidationError` describing the first invalid field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.bind_address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidBindAddress {
                bind_address: self.bind_address.clone(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::UdpTracker;
    use crate::ValidationError;

    fn valid_config() -> UdpTracker {
        UdpTracker {
            private_key: "HaveYouHeardOfPeerToPeerNetworks".to_owned(),
            ..UdpTracker::default()
        }
    }

    #[test]
    fn it_should_accept_a_well_formed_configuration() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn it_should_accept_an_empty_private_key() {
        // The tracker falls back to an ephemeral instance key.
        let config = UdpTracker {
            private_key: String::new(),
            ..valid_config()
        };

        assert!(config.validate().is_ok());
    }

    #[test]
    fn it_should_reject_a_bind_address_that_is_not_a_socket_address() {
        let config = UdpTracker {
            bind_address: "300.300.300.300:7070".to_owned(),
            ..valid_config()
        };

        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidBindAddress {
                bind_address: "300.300.300.300:7070".to_owned()
            })
        );
    }
}
