//! UDP tracker job starter.
//!
//! The [`start_job`](crate::bootstrap::jobs::udp_tracker::start_job)
//! function starts the UDP tracker server for one `udp_tracker`
//! configuration section and hands back the supervising join handle.
use std::sync::Arc;

use tokio::task::JoinHandle;
use torrust_udp_tracker_configuration::UdpTracker;
use tracing::debug;

use crate::core;
use crate::servers::udp::server::Server;
use crate::servers::udp::UDP_TRACKER_LOG_TARGET;

/// It starts a new UDP server with the provided configuration and spawns a
/// supervising task that waits for it. The service halts on its own when
/// the process receives the global shutdown signal.
///
/// # Panics
///
/// It will panic if the UDP tracker binding address is not a valid socket
/// address, or if the UDP service cannot be started.
#[must_use]
pub async fn start_job(config: &UdpTracker, tracker: Arc<core::Tracker>) -> JoinHandle<()> {
    let bind_to = config
        .bind_address
        .parse::<std::net::SocketAddr>()
        .expect("it should have a valid udp tracker bind address");

    let server = Server::bound_to(bind_to)
        .start(tracker, Arc::new(config.clone()))
        .await
        .expect("it should be able to start the udp tracker");

    debug!(target: UDP_TRACKER_LOG_TARGET, "UDP tracker bound to: udp://{}", server.state.binding);

    tokio::spawn(async move {
        if let Err(e) = server.wait().await {
            tracing::error!(target: UDP_TRACKER_LOG_TARGET, err = %e, "UDP tracker service failed");
        }
    })
}
