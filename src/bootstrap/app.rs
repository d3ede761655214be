//! Setup for the tracker application.
//!
//! Wiring order matters: statistics first (the tracker needs the event
//! sender), then the tracker itself (composing the middleware chains), then
//! tracing.
use std::sync::Arc;

use torrust_udp_tracker_configuration::Configuration;

use crate::bootstrap;
use crate::core::error::BuildError;
use crate::core::middleware::Registry;
use crate::core::peer_store::PeerStore;
use crate::core::{statistics, Tracker};

/// Builds the tracker application from its configuration and collaborators:
/// the middleware [`Registry`] of the deployment and the [`PeerStore`]
/// backing the swarms.
///
/// Returns the shared configuration, the tracker, and the statistics
/// repository (when statistics are enabled).
///
/// # Errors
///
/// Will return a `BuildError` if the configured middleware cannot be
/// composed.
pub fn setup(
    configuration: Configuration,
    registry: &Registry,
    store: Arc<dyn PeerStore>,
) -> Result<(Arc<Configuration>, Arc<Tracker>, Option<statistics::Repo>), BuildError> {
    let configuration = Arc::new(configuration);

    // Initialize statistics
    let (stats_event_sender, stats_repository) = if configuration.core.tracker_usage_statistics {
        let (sender, repository) = statistics::Keeper::new_active_instance();
        (Some(sender), Some(repository))
    } else {
        (None, None)
    };

    // Initialize the tracker
    let tracker = Arc::new(Tracker::new(&configuration, registry, store, stats_event_sender)?);

    // Initialize tracing
    bootstrap::tracing::setup(&configuration);

    Ok((configuration, tracker, stats_repository))
}
