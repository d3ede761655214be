//! The service that actually runs the UDP tracker: it binds the socket,
//! signals readiness, runs the receive loop, and joins in-flight workers on
//! shutdown.
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use futures::FutureExt;
use futures_util::StreamExt;
use tokio::select;
use tokio::sync::oneshot;
use tracing::instrument;
use torrust_udp_tracker_configuration::UdpTracker;

use super::bound_socket::BoundSocket;
use super::processor::Processor;
use super::receiver::Receiver;
use super::request_buffer::ActiveRequests;
use crate::bootstrap::jobs::Started;
use crate::core::Tracker;
use crate::servers::signals::{shutdown_signal, Halted};
use crate::servers::udp::{MAX_PACKET_SIZE, UDP_TRACKER_LOG_TARGET};
use crate::shared::pool;

/// A UDP server instance launcher.
pub struct Launcher;

impl Launcher {
    /// It runs the UDP server instance with graceful shutdown.
    ///
    /// When the socket cannot be bound, the boot channel is dropped without
    /// a `Started` message and the service returns; the controller reports
    /// that as a boot failure.
    #[instrument(skip(tracker, config, bind_to, tx_start, rx_halt))]
    pub async fn run_with_graceful_shutdown(
        tracker: Arc<Tracker>,
        config: Arc<UdpTracker>,
        bind_to: SocketAddr,
        tx_start: oneshot::Sender<Started>,
        rx_halt: oneshot::Receiver<Halted>,
    ) {
        tracing::info!(target: UDP_TRACKER_LOG_TARGET, "Starting on: udp://{bind_to}");

        let bound_socket = match BoundSocket::new(bind_to, config.read_buffer_size) {
            Ok(socket) => Arc::new(socket),
            Err(e) => {
                tracing::error!(target: UDP_TRACKER_LOG_TARGET, addr = %bind_to, err = %e, "could not bind to socket");
                return;
            }
        };

        let address = bound_socket.address();
        let local_udp_url = bound_socket.url().to_string();

        tracing::info!(target: UDP_TRACKER_LOG_TARGET, "Started on: {local_udp_url}");

        // Unblocks whoever is waiting for the boot to complete.
        if tx_start.send(Started { address }).is_err() {
            tracing::warn!(target: UDP_TRACKER_LOG_TARGET, local_udp_url, "nobody is waiting for the boot signal, shutting down");
            return;
        }

        let halt = {
            let local_udp_url = local_udp_url.clone();
            async move {
                shutdown_signal(rx_halt).await;
                tracing::info!(target: UDP_TRACKER_LOG_TARGET, local_udp_url, "halt signal received");
            }
        }
        .boxed();

        Self::run_udp_server_main(bound_socket, tracker, config, halt).await;

        tracing::info!(target: UDP_TRACKER_LOG_TARGET, "{local_udp_url} shut down cleanly");
    }

    #[instrument(skip(bound_socket, tracker, config, halt))]
    async fn run_udp_server_main(
        bound_socket: Arc<BoundSocket>,
        tracker: Arc<Tracker>,
        config: Arc<UdpTracker>,
        mut halt: BoxFuture<'_, ()>,
    ) {
        let pool = Arc::new(pool::byte_buffer_pool(MAX_PACKET_SIZE));

        let mut receiver = Receiver::new(bound_socket.clone(), pool.clone());
        let active_requests = &mut ActiveRequests::default();

        let local_addr = format!("udp://{}", receiver.bound_socket_address());

        loop {
            let next = select! {
                () = &mut halt => break,
                next = receiver.next() => next,
            };

            let start = Instant::now();

            let Some(result) = next else {
                tracing::error!(target: UDP_TRACKER_LOG_TARGET, local_addr, "receiver ran dry, should not happen");
                break;
            };

            let request = match result {
                Ok(request) => request,
                Err(e) if is_transient(&e) => {
                    tracing::debug!(target: UDP_TRACKER_LOG_TARGET, local_addr, err = %e, "transient read error");
                    continue;
                }
                Err(e) => {
                    tracing::error!(target: UDP_TRACKER_LOG_TARGET, local_addr, err = %e, "fatal read error, stopping");
                    break;
                }
            };

            // An empty read carries nothing to answer.
            if request.payload.is_empty() {
                pool.release(request.payload);
                continue;
            }

            let processor = Processor::new(bound_socket.clone(), tracker.clone(), config.clone(), pool.clone());
            let worker = tokio::task::spawn(processor.process_request(request, start));

            active_requests.register(worker).await;
        }

        // Requests we accepted get their response before the socket goes
        // away.
        active_requests.join_all().await;
    }
}

fn is_transient(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted | std::io::ErrorKind::TimedOut
    )
}
