//! Module to handle the UDP server instances.
//!
//! The server is a little state machine:
//!
//! ```text
//! new ──▶ Server<Stopped> ──start()──▶ Server<Running> ──stop()──▶ Server<Stopped>
//!                                │                          │
//!                                ▼                          ▼
//!                     booting (binds, signals)     closing (halt signal,
//!                     then the receive loop        join in-flight workers)
//! ```
//!
//! `start()` resolves once the socket is bound and the service signalled it
//! is listening; `stop()` resolves once the receive loop exited and every
//! in-flight worker was joined, so no accepted request loses its response.
use thiserror::Error;

pub mod bound_socket;
pub mod launcher;
pub mod processor;
pub mod receiver;
pub mod request_buffer;
pub mod states;

/// Error that can occur when starting or stopping the UDP server.
#[derive(Debug, Error)]
pub enum UdpError {
    /// The service died before signalling that it was listening. The
    /// launcher logs the cause (usually a failed bind).
    #[error("the UDP service failed while booting")]
    FailedToBoot,

    /// The running service could not be stopped or supervised cleanly.
    #[error("failed to shut the UDP service down: {reason}")]
    FailedToShutDown { reason: String },
}

/// A UDP server.
///
/// It's a state machine. Configurations cannot be changed. This struct
/// represents a concrete configuration and state. It allows starting and
/// stopping the server but always keeping the same configuration.
#[allow(clippy::module_name_repetitions)]
pub struct Server<S> {
    /// The state of the server: `running` or `stopped`.
    pub state: S,
}
