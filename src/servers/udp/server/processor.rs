//! The per-datagram worker.
//!
//! One `Processor` runs per received datagram, on its own task: it drives
//! the packet through the handlers, writes the response back to the source
//! address, records the response time, and returns the read buffer to the
//! pool. Write failures are logged and swallowed; a datagram that cannot be
//! delivered is the network's problem, not a reason to take a worker down.
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tracing::instrument;
use torrust_udp_tracker_configuration::UdpTracker;

use super::bound_socket::BoundSocket;
use crate::core::statistics::Event;
use crate::core::Tracker;
use crate::servers::udp::{handlers, RawRequest, UDP_TRACKER_LOG_TARGET};
use crate::shared::pool::Pool;

pub struct Processor {
    socket: Arc<BoundSocket>,
    tracker: Arc<Tracker>,
    config: Arc<UdpTracker>,
    pool: Arc<Pool<Vec<u8>>>,
}

impl Processor {
    pub fn new(socket: Arc<BoundSocket>, tracker: Arc<Tracker>, config: Arc<UdpTracker>, pool: Arc<Pool<Vec<u8>>>) -> Self {
        Self {
            socket,
            tracker,
            config,
            pool,
        }
    }

    /// Handles one datagram end to end. `start` is the instant the datagram
    /// was read, so the recorded latency covers the whole
    /// receive-to-respond path.
    #[instrument(skip(self, request, start))]
    pub async fn process_request(self, request: RawRequest, start: Instant) {
        let from = request.from;

        let handled = handlers::handle_packet(&request, &self.config, &self.tracker).await;

        if let Some(payload) = &handled.response {
            if !payload.is_empty() {
                self.send_response(&from, payload).await;
            }
        }

        self.tracker
            .send_stats_event(Event::UdpResponseTime {
                kind: handled.kind,
                error: handled.error,
                latency: start.elapsed(),
            })
            .await;

        self.pool.release(request.payload);
    }

    async fn send_response(&self, to: &SocketAddr, payload: &[u8]) {
        let bytes_count = payload.len();

        // It does not matter whether the datagram arrives.
        match self.socket.send_to(payload, to).await {
            Ok(sent_bytes) => {
                tracing::debug!(target: UDP_TRACKER_LOG_TARGET, %to, %bytes_count, %sent_bytes, "sent response");
            }
            Err(error) => {
                tracing::warn!(target: UDP_TRACKER_LOG_TARGET, %to, %bytes_count, %error, "failed to send response");
            }
        }
    }
}
