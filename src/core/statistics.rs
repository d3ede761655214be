//! Structs to collect and keep tracker metrics.
//!
//! The tracker collects two kinds of metrics:
//!
//! - Request counters, labelled with the request type (`connect`,
//!   `announce`, `scrape`) and the IP version the peer used.
//! - A response-time histogram, labelled with the request type and the error
//!   reason (empty on success), covering the whole receive-to-send path.
//!
//! The data is collected with an `event-sender -> event listener` model: the
//! request handlers send [`Event`]s through an [`EventSender`], and the
//! [`Keeper`] folds them into the [`Repo`] as they arrive.
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::{automock, predicate::str};
use tokio::sync::mpsc::error::SendError;
use tokio::sync::{mpsc, RwLock, RwLockReadGuard};
use tracing::debug;

const CHANNEL_BUFFER_SIZE: usize = 65_535;

/// Number of response-time buckets.
pub const HISTOGRAM_BUCKETS: usize = 10;

/// Upper bound of the first response-time bucket, in milliseconds. With the
/// doubling that follows, the ten buckets cover roughly 9 ms to 5 s.
pub const HISTOGRAM_START_MILLIS: f64 = 9.375;

/// The kind of request a response answers, for metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Connect,
    Announce,
    Scrape,
}

impl RequestKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Connect => "connect",
            RequestKind::Announce => "announce",
            RequestKind::Scrape => "scrape",
        }
    }
}

/// The IP version a peer used, for metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    #[must_use]
    pub fn of(addr: &SocketAddr) -> Self {
        if addr.is_ipv4() {
            IpFamily::V4
        } else {
            IpFamily::V6
        }
    }
}

/// A statistics event. It is used to collect tracker metrics.
#[derive(Debug, PartialEq)]
pub enum Event {
    /// One handled request, counted per request type and IP family.
    UdpRequest { kind: RequestKind, family: IpFamily },
    /// One response cycle, sent after the response (if any) was written
    /// back. `kind` is `None` when the header never parsed; `error` is
    /// `None` on success.
    UdpResponseTime {
        kind: Option<RequestKind>,
        error: Option<String>,
        latency: Duration,
    },
}

impl Event {
    /// The counter event for a request of the given kind from this address.
    #[must_use]
    pub fn udp_request(kind: RequestKind, from: &SocketAddr) -> Self {
        Event::UdpRequest {
            kind,
            family: IpFamily::of(from),
        }
    }
}

/// One exponential-bucket latency histogram.
///
/// Bucket `i` counts observations `≤ 9.375 ms × 2^i`; slower observations
/// land in `overflow`.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Histogram {
    pub buckets: [u64; HISTOGRAM_BUCKETS],
    pub overflow: u64,
    pub count: u64,
    pub sum_millis: f64,
}

impl Histogram {
    pub fn observe(&mut self, millis: f64) {
        self.count += 1;
        self.sum_millis += millis;

        for (i, bucket) in self.buckets.iter_mut().enumerate() {
            let upper_bound = HISTOGRAM_START_MILLIS * f64::from(1u32 << i);
            if millis <= upper_bound {
                *bucket += 1;
                return;
            }
        }

        self.overflow += 1;
    }
}

/// Metrics collected by the tracker.
#[derive(Debug, PartialEq, Default)]
pub struct Metrics {
    /// Total number of UDP `connect` requests from IPv4 peers.
    pub udp4_connections_handled: u64,
    /// Total number of UDP `announce` requests from IPv4 peers.
    pub udp4_announces_handled: u64,
    /// Total number of UDP `scrape` requests from IPv4 peers.
    pub udp4_scrapes_handled: u64,
    /// Total number of UDP `connect` requests from IPv6 peers.
    pub udp6_connections_handled: u64,
    /// Total number of UDP `announce` requests from IPv6 peers.
    pub udp6_announces_handled: u64,
    /// Total number of UDP `scrape` requests from IPv6 peers.
    pub udp6_scrapes_handled: u64,
    /// Response times, keyed by `(action, error)`. The action is one of
    /// `connect`, `announce`, `scrape` or `""` (header never parsed); the
    /// error is `""` on success.
    pub udp_response_time_millis: HashMap<(String, String), Histogram>,
}

/// The service responsible for keeping tracker metrics: it listens to
/// statistics events and folds them into the repository.
pub struct Keeper {
    pub repository: Repo,
}

impl Default for Keeper {
    fn default() -> Self {
        Self::new()
    }
}

impl Keeper {
    #[must_use]
    pub fn new() -> Self {
        Self { repository: Repo::new() }
    }

    #[must_use]
    pub fn new_active_instance() -> (Box<dyn EventSender>, Repo) {
        let mut stats_tracker = Self::new();

        let stats_event_sender = stats_tracker.run_event_listener();

        (stats_event_sender, stats_tracker.repository)
    }

    pub fn run_event_listener(&mut self) -> Box<dyn EventSender> {
        let (sender, mut receiver) = mpsc::channel::<Event>(CHANNEL_BUFFER_SIZE);

        let repository = self.repository.clone();

        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                repository.fold_event(event).await;
            }
        });

        Box::new(Sender { sender })
    }
}

/// A trait to allow sending statistics events.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait EventSender: Sync + Send {
    async fn send_event(&self, event: Event) -> Option<Result<(), SendError<Event>>>;
}

/// An [`EventSender`] implementation backed by the channel the [`Keeper`]
/// listens on.
pub struct Sender {
    sender: mpsc::Sender<Event>,
}

#[async_trait]
impl EventSender for Sender {
    async fn send_event(&self, event: Event) -> Option<Result<(), SendError<Event>>> {
        Some(self.sender.send(event).await)
    }
}

/// A repository for the tracker metrics.
#[derive(Clone)]
pub struct Repo {
    pub stats: Arc<RwLock<Metrics>>,
}

impl Default for Repo {
    fn default() -> Self {
        Self::new()
    }
}

impl Repo {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stats: Arc::new(RwLock::new(Metrics::default())),
        }
    }

    pub async fn get_stats(&self) -> RwLockReadGuard<'_, Metrics> {
        self.stats.read().await
    }

    /// Folds one event into the metrics.
    pub async fn fold_event(&self, event: Event) {
        match event {
            Event::UdpRequest { kind, family } => self.increase_udp_requests(kind, family).await,
            Event::UdpResponseTime { kind, error, latency } => self.record_udp_response_time(kind, error, latency).await,
        }

        debug!("stats: {:?}", self.get_stats().await);
    }

    pub async fn increase_udp_requests(&self, kind: RequestKind, family: IpFamily) {
        let mut stats = self.stats.write().await;

        let counter = match (kind, family) {
            (RequestKind::Connect, IpFamily::V4) => &mut stats.udp4_connections_handled,
            (RequestKind::Announce, IpFamily::V4) => &mut stats.udp4_announces_handled,
            (RequestKind::Scrape, IpFamily::V4) => &mut stats.udp4_scrapes_handled,
            (RequestKind::Connect, IpFamily::V6) => &mut stats.udp6_connections_handled,
            (RequestKind::Announce, IpFamily::V6) => &mut stats.udp6_announces_handled,
            (RequestKind::Scrape, IpFamily::V6) => &mut stats.udp6_scrapes_handled,
        };
        *counter += 1;

        drop(stats);
    }

    pub async fn record_udp_response_time(&self, kind: Option<RequestKind>, error: Option<String>, latency: Duration) {
        let action = kind.map_or("", RequestKind::as_str).to_owned();
        let error = error.unwrap_or_default();

        let mut stats = self.stats.write().await;
        stats
            .udp_response_time_millis
            .entry((action, error))
            .or_default()
            .observe(latency.as_secs_f64() * 1_000.0);
        drop(stats);
    }
}
