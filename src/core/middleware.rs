//! Middleware chains for announce and scrape requests.
//!
//! A chain is an ordered list of middleware built once, at tracker
//! construction time, from the `[[announce_middleware]]` /
//! `[[scrape_middleware]]` configuration lists. Each middleware may inspect
//! and mutate the request, short-circuit with an error or a finished
//! response, or delegate to the rest of the chain through [`AnnounceNext`] /
//! [`ScrapeNext`]. The terminal handler, appended by the tracker itself,
//! performs the peer-store interaction.
//!
//! Chains are immutable after construction and invoked concurrently from
//! many worker tasks, so middleware must be `Send + Sync`.
//!
//! Constructors are looked up by name in a [`Registry`] at tracker build
//! time only. Register the constructors for the middleware your deployment
//! names in its configuration:
//!
//! ```rust
//! use torrust_udp_tracker::core::middleware::Registry;
//!
//! let mut registry = Registry::default();
//! // registry.register_announce("geo_filter", |options| { … });
//! ```
use std::collections::HashMap;

use async_trait::async_trait;
use torrust_udp_tracker_configuration::Middleware as MiddlewareConfig;

use super::error::{BuildError, Error};
use super::{AnnounceRequest, AnnounceResponse, Policy, ScrapeRequest, ScrapeResponse};

/// Error type middleware constructors can fail with.
pub type ConstructionError = Box<dyn std::error::Error + Send + Sync>;

/// Builds an announce middleware from its configuration entry.
pub type AnnounceConstructor = Box<dyn Fn(&MiddlewareConfig) -> Result<Box<dyn AnnounceMiddleware>, ConstructionError> + Send + Sync>;

/// Builds a scrape middleware from its configuration entry.
pub type ScrapeConstructor = Box<dyn Fn(&MiddlewareConfig) -> Result<Box<dyn ScrapeMiddleware>, ConstructionError> + Send + Sync>;

/// A stage in the announce chain.
#[async_trait]
pub trait AnnounceMiddleware: Send + Sync {
    /// Handle the announce, delegating to `next` for the rest of the chain.
    async fn handle_announce(
        &self,
        policy: &Policy,
        request: &mut AnnounceRequest,
        response: &mut AnnounceResponse,
        next: AnnounceNext<'_>,
    ) -> Result<(), Error>;
}

/// A stage in the scrape chain.
#[async_trait]
pub trait ScrapeMiddleware: Send + Sync {
    /// Handle the scrape, delegating to `next` for the rest of the chain.
    async fn handle_scrape(
        &self,
        policy: &Policy,
        request: &ScrapeRequest,
        response: &mut ScrapeResponse,
        next: ScrapeNext<'_>,
    ) -> Result<(), Error>;
}

/// The continuation of an announce chain: the middleware that come after the
/// current one. Calling [`AnnounceNext::run`] hands the request downward;
/// not calling it short-circuits the chain.
pub struct AnnounceNext<'a> {
    remaining: &'a [Box<dyn AnnounceMiddleware>],
}

impl AnnounceNext<'_> {
    /// Runs the rest of the chain.
    ///
    /// # Errors
    ///
    /// Returns whatever error a downstream middleware raises.
    pub async fn run(
        self,
        policy: &Policy,
        request: &mut AnnounceRequest,
        response: &mut AnnounceResponse,
    ) -> Result<(), Error> {
        match self.remaining.split_first() {
            Some((middleware, rest)) => {
                middleware
                    .handle_announce(policy, request, response, AnnounceNext { remaining: rest })
                    .await
            }
            None => Ok(()),
        }
    }
}

/// The continuation of a scrape chain. See [`AnnounceNext`].
pub struct ScrapeNext<'a> {
    remaining: &'a [Box<dyn ScrapeMiddleware>],
}

impl ScrapeNext<'_> {
    /// Runs the rest of the chain.
    ///
    /// # Errors
    ///
    /// Returns whatever error a downstream middleware raises.
    pub async fn run(self, policy: &Policy, request: &ScrapeRequest, response: &mut ScrapeResponse) -> Result<(), Error> {
        match self.remaining.split_first() {
            Some((middleware, rest)) => {
                middleware
                    .handle_scrape(policy, request, response, ScrapeNext { remaining: rest })
                    .await
            }
            None => Ok(()),
        }
    }
}

/// An immutable, composed announce chain.
#[derive(Default)]
pub struct AnnounceChain {
    middleware: Vec<Box<dyn AnnounceMiddleware>>,
}

impl AnnounceChain {
    pub fn append(&mut self, middleware: Box<dyn AnnounceMiddleware>) {
        self.middleware.push(middleware);
    }

    /// Runs the request through the whole chain.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by any stage.
    pub async fn handle(&self, policy: &Policy, request: &mut AnnounceRequest, response: &mut AnnounceResponse) -> Result<(), Error> {
        AnnounceNext {
            remaining: &self.middleware,
        }
        .run(policy, request, response)
        .await
    }
}

/// An immutable, composed scrape chain.
#[derive(Default)]
pub struct ScrapeChain {
    middleware: Vec<Box<dyn ScrapeMiddleware>>,
}

impl ScrapeChain {
    pub fn append(&mut self, middleware: Box<dyn ScrapeMiddleware>) {
        self.middleware.push(middleware);
    }

    /// Runs the request through the whole chain.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by any stage.
    pub async fn handle(&self, policy: &Policy, request: &ScrapeRequest, response: &mut ScrapeResponse) -> Result<(), Error> {
        ScrapeNext {
            remaining: &self.middleware,
        }
        .run(policy, request, response)
        .await
    }
}

/// Named middleware constructors, consulted once while building a tracker.
#[derive(Default)]
pub struct Registry {
    announce: HashMap<String, AnnounceConstructor>,
    scrape: HashMap<String, ScrapeConstructor>,
}

impl Registry {
    pub fn register_announce<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&MiddlewareConfig) -> Result<Box<dyn AnnounceMiddleware>, ConstructionError> + Send + Sync + 'static,
    {
        self.announce.insert(name.to_owned(), Box::new(constructor));
    }

    pub fn register_scrape<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&MiddlewareConfig) -> Result<Box<dyn ScrapeMiddleware>, ConstructionError> + Send + Sync + 'static,
    {
        self.scrape.insert(name.to_owned(), Box::new(constructor));
    }

    /// Builds the announce chain for the given configuration entries,
    /// appending `terminal` as the last stage.
    ///
    /// # Errors
    ///
    /// Will return a `BuildError` if an entry names an unregistered
    /// middleware or its constructor fails.
    pub(crate) fn build_announce_chain(
        &self,
        configs: &[MiddlewareConfig],
        terminal: Box<dyn AnnounceMiddleware>,
    ) -> Result<AnnounceChain, BuildError> {
        let mut chain = AnnounceChain::default();

        for config in configs {
            let constructor = self
                .announce
                .get(&config.name)
                .ok_or_else(|| BuildError::UnknownAnnounceMiddleware {
                    name: config.name.clone(),
                })?;

            let middleware = constructor(config).map_err(|source| BuildError::MiddlewareConstruction {
                name: config.name.clone(),
                source,
            })?;

            chain.append(middleware);
        }

        chain.append(terminal);

        Ok(chain)
    }

    /// Builds the scrape chain for the given configuration entries,
    /// appending `terminal` as the last stage.
    ///
    /// # Errors
    ///
    /// Will return a `BuildError` if an entry names an unregistered
    /// middleware or its constructor fails.
    pub(crate) fn build_scrape_chain(
        &self,
        configs: &[MiddlewareConfig],
        terminal: Box<dyn ScrapeMiddleware>,
    ) -> Result<ScrapeChain, BuildError> {
        let mut chain = ScrapeChain::default();

        for config in configs {
            let constructor = self
                .scrape
                .get(&config.name)
                .ok_or_else(|| BuildError::UnknownScrapeMiddleware {
                    name: config.name.clone(),
                })?;

            let middleware = constructor(config).map_err(|source| BuildError::MiddlewareConstruction {
                name: config.name.clone(),
                source,
            })?;

            chain.append(middleware);
        }

        chain.append(terminal);

        Ok(chain)
    }
}
