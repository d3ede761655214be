//! Errors returned by the core `Tracker`.
//!
//! There are two families, and the split decides what the client gets to
//! see. `ClientError` reasons travel back to the peer verbatim inside an
//! error frame. Everything else is an internal error: it is logged with its
//! call-site location, and the peer only receives a generic
//! `internal error occurred: …` reason so it knows to retry instead of
//! treating the failure as a protocol violation.
use std::panic::Location;

use thiserror::Error;

/// An error whose reason is safe to echo to the client over the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("malformed packet")]
    MalformedPacket,

    #[error("malformed IP address")]
    MalformedIpAddress,

    #[error("malformed event ID")]
    MalformedEventId,

    #[error("unknown action ID")]
    UnknownActionId,

    #[error("bad connection ID")]
    BadConnectionId,

    #[error("exceeded info_hash limit")]
    ExceededInfoHashLimit,

    /// A middleware rejected the request. The reason is echoed verbatim.
    #[error("{reason}")]
    Rejected { reason: String },
}

/// Error returned by the tracker request pipeline.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The client is at fault and gets told why.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The tracker is at fault. The message is logged; the client sees a
    /// generic acknowledgement.
    #[error("internal server error: {message}, {location}")]
    Internal {
        location: &'static Location<'static>,
        message: String,
    },
}

impl Error {
    /// An internal error annotated with the caller's location.
    #[track_caller]
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            location: Location::caller(),
            message: message.into(),
        }
    }

    /// The reason to echo to the client, if this is a client error.
    #[must_use]
    pub fn client_reason(&self) -> Option<String> {
        match self {
            Error::Client(client_error) => Some(client_error.to_string()),
            Error::Internal { .. } => None,
        }
    }
}

/// Errors raised while composing a `Tracker` from its middleware
/// configuration.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("failed to find announce middleware: {name}")]
    UnknownAnnounceMiddleware { name: String },

    #[error("failed to find scrape middleware: {name}")]
    UnknownScrapeMiddleware { name: String },

    #[error("failed to load middleware {name}: {source}")]
    MiddlewareConstruction {
        name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
