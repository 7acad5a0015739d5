//! # Error Taxonomy
//!
//! Purpose: One error type for every layer of the client, from duration
//! validation up to server error replies.
//!
//! ## Design Principles
//! 1. **Fail Before I/O**: Caller mistakes (`PrecisionLoss`, `Argument`) are
//!    detected locally and never reach the wire.
//! 2. **Verbatim Surfacing**: Transport and server failures are returned as-is;
//!    nothing is retried or swallowed.
//! 3. **Broadcastable**: `RtError` is `Clone` so one failure can be handed to
//!    every caller coalesced onto the same request.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::duration::Granularity;

/// Result type shared by all RemoteTypes crates.
pub type RtResult<T> = Result<T, RtError>;

/// Errors surfaced by handles, the connection, and the call coordinator.
#[derive(Debug, Clone, Error)]
pub enum RtError {
    /// Duration has precision below the granularity the command accepts.
    #[error("duration {duration:?} is not a whole number of {granularity}")]
    PrecisionLoss {
        duration: Duration,
        granularity: Granularity,
    },

    /// Caller supplied arguments the command cannot accept.
    #[error("invalid argument: {0}")]
    Argument(&'static str),

    /// Network or IO failure while connecting, reading, or writing.
    #[error("io error: {0}")]
    Io(#[source] Arc<io::Error>),

    /// RESP2 framing or parse error.
    #[error("protocol error: {0}")]
    Protocol(&'static str),

    /// Client configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Address could not be resolved into a socket address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// An earlier transport failure left the stream mid-frame.
    #[error("connection is broken by an earlier transport failure")]
    ConnectionBroken,

    /// Server returned an error reply.
    #[error("server error: {0}")]
    Remote(String),

    /// Reply type did not match the expected command reply.
    #[error("unexpected response: expected {0}")]
    UnexpectedResponse(&'static str),

    /// The caller leading a coalesced request panicked before publishing.
    #[error("coalesced call abandoned before completion")]
    CallAbandoned,
}

impl RtError {
    /// True for failures of the connection itself (dial, IO, framing).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RtError::Io(_)
                | RtError::Protocol(_)
                | RtError::InvalidAddress(_)
                | RtError::ConnectionBroken
        )
    }

    /// True when the server answered, but not with what the command wants.
    pub fn is_remote(&self) -> bool {
        matches!(self, RtError::Remote(_) | RtError::UnexpectedResponse(_))
    }
}

impl From<io::Error> for RtError {
    fn from(err: io::Error) -> Self {
        RtError::Io(Arc::new(err))
    }
}
