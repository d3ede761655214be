//! Application jobs launchers.
//!
//! The main application runs a job per long-running service. Jobs wrap the
//! service controllers so the application can treat every service the same
//! way: start it, keep its join handle, wait for it.
pub mod udp_tracker;

use std::net::SocketAddr;

/// This is the message the "launcher" spawned task sends to the main
/// application process to notify that the service was successfully started.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Started {
    pub address: SocketAddr,
}
