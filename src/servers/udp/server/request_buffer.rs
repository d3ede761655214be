//! Bookkeeping for the in-flight request workers.
use std::collections::VecDeque;

use tokio::task::JoinHandle;

use crate::servers::udp::UDP_TRACKER_LOG_TARGET;

/// The worker tasks currently processing datagrams.
///
/// The receive loop registers every processor task it spawns. The set is
/// bounded: once `limit` workers are in flight, registering the next one
/// first waits for the oldest worker, so a datagram flood turns into
/// backpressure on the socket instead of an unbounded pile of tasks.
/// Workers are joined, never aborted, so a request that was accepted always
/// gets its response out.
pub struct ActiveRequests {
    workers: VecDeque<JoinHandle<()>>,
    limit: usize,
}

impl Default for ActiveRequests {
    fn default() -> Self {
        // The number of datagrams processed simultaneously.
        Self::with_limit(50)
    }
}

impl ActiveRequests {
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            workers: VecDeque::with_capacity(limit),
            limit,
        }
    }

    /// Number of workers currently tracked. Finished workers linger until
    /// the next [`ActiveRequests::register`] call sweeps them out.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Registers a freshly spawned worker.
    ///
    /// Finished workers are swept out first. If the set is still at its
    /// limit, this waits for the oldest worker to complete before
    /// accepting the new one.
    pub async fn register(&mut self, worker: JoinHandle<()>) {
        self.workers.retain(|running| !running.is_finished());

        while self.workers.len() >= self.limit {
            if let Some(oldest) = self.workers.pop_front() {
                join(oldest).await;
            }
        }

        self.workers.push_back(worker);
    }

    /// Joins every remaining worker, oldest first. Called on shutdown so
    /// the responses already in flight still go out before the socket goes
    /// away.
    pub async fn join_all(&mut self) {
        while let Some(worker) = self.workers.pop_front() {
            join(worker).await;
        }
    }
}

async fn join(worker: JoinHandle<()>) {
    if let Err(e) = worker.await {
        if !e.is_cancelled() {
            tracing::warn!(target: UDP_TRACKER_LOG_TARGET, err = %e, "request worker failed");
        }
    }
}
