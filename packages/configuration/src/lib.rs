//! Configuration data structures for the
//! [Torrust UDP Tracker](https://github.com/torrust/torrust-udp-tracker).
//!
//! This crate only defines the typed configuration the tracker consumes,
//! with defaults and a first level of validation that can be performed
//! statically, without running any service. How the TOML gets to the
//! process (file, env var, orchestration layer) is the caller's business;
//! the only loader provided reads a whole TOML document from an
//! environment variable.
use std::env;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod core;
pub mod middleware;
pub mod udp_tracker;

pub use crate::core::Core;
pub use crate::middleware::Middleware;
pub use crate::udp_tracker::UdpTracker;

/// The whole tracker configuration.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Default)]
pub struct Configuration {
    /// Core tracker policy.
    #[serde(default)]
    pub core: Core,

    /// The UDP tracker service.
    #[serde(default)]
    pub udp_tracker: UdpTracker,

    /// Ordered announce middleware. The first entry sees the request first.
    #[serde(default)]
    pub announce_middleware: Vec<Middleware>,

    /// Ordered scrape middleware. The first entry sees the request first.
    #[serde(default)]
    pub scrape_middleware: Vec<Middleware>,
}

/// Errors raised when building or checking a configuration.
#[derive(Error, Debug)]
pub enum Error {
    #[error("missing env var {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("invalid toml in configuration: {source}")]
    InvalidToml {
        #[from]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {source}")]
    Invalid {
        #[from]
        source: ValidationError,
    },
}

/// Errors raised by the static validation pass.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// The UDP bind address must be a valid socket address.
    #[error("invalid bind address, got: {bind_address}")]
    InvalidBindAddress { bind_address: String },
}

impl Configuration {
    /// Builds the configuration from a TOML document stored in an
    /// environment variable.
    ///
    /// # Errors
    ///
    /// Will return an error if the variable is missing, the TOML does not
    /// parse, or validation fails.
    pub fn load_from_env_var(env_var_name: &str) -> Result<Configuration, Error> {
        let config_toml = env::var(env_var_name).map_err(|_| Error::MissingEnvVar {
            env_var: env_var_name.to_owned(),
        })?;

        let config: Configuration = toml::from_str(&config_toml)?;
        config.validate()?;

        Ok(config)
    }

    /// Static validation of the configuration.
    ///
    /// # Errors
    ///
    /// Will return a `ValidationError` if any section is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.udp_tracker.validate()
    }
}

#[cfg(test)]
mod tests {
    use crate::Configuration;

    #[test]
    fn configuration_should_have_default_values() {
        let configuration = Configuration::default();

        assert_eq!(configuration.core.announce_interval_secs, 120);
        assert_eq!(configuration.udp_tracker.bind_address, "0.0.0.0:6969");
        assert!(configuration.announce_middleware.is_empty());
    }

    #[test]
    fn the_default_configuration_should_be_valid() {
        // No private key is set; the tracker covers that with an ephemeral
        // instance key.
        assert!(Configuration::default().validate().is_ok());
    }

    #[test]
    fn configuration_should_be_parsed_from_a_toml_document() {
        let config_toml = r#"
            [core]
            announce_interval_secs = 300

            [udp_tracker]
            bind_address = "127.0.0.1:6969"
            private_key = "MyAccessTokenForTheTracker"
            allow_ip_spoofing = true

            [[announce_middleware]]
            name = "rate_limit"

            [announce_middleware.options]
            window_secs = 60
        "#;

        let configuration: Configuration = toml::from_str(config_toml).expect("valid toml document");

        assert_eq!(configuration.core.announce_interval_secs, 300);
        assert!(configuration.udp_tracker.allow_ip_spoofing);
        assert_eq!(configuration.announce_middleware[0].name, "rate_limit");
        assert!(configuration.announce_middleware[0].options.contains_key("window_secs"));
        assert!(configuration.validate().is_ok());
    }
}
