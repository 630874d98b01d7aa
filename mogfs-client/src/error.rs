//! Client error types

use mogfs_net::{ProtocolError, TrackerError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("No tracker hosts configured")]
    NoHostsConfigured,

    #[error("Invalid tracker host {host:?}: {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("No tracker host reachable ({attempted} tried)")]
    NoHostReachable { attempted: usize },

    #[error("Socket error: {0}")]
    Socket(String),

    #[error("Timed out during {0}")]
    Timeout(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bad tracker response: {0:?}")]
    BadServerResponse(String),

    #[error("Unexpected EOF after non-idempotent request: {0}")]
    TruncatedRequest(String),

    #[error("Tracker kept closing the connection after {0} resends")]
    RetriesExhausted(u32),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Tracker error: {0}")]
    Tracker(TrackerError),

    #[error("No paths registered for key {0}")]
    NoPaths(String),

    #[error("Invalid storage path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Storage node returned {status} for {path}")]
    HttpStatus { status: u16, path: String },

    #[error("Core error: {0}")]
    Core(#[from] mogfs_core::MogError),
}

impl ClientError {
    /// Host unreachable, dial failure, deadline or socket I/O failure
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            ClientError::NoHostReachable { .. }
                | ClientError::Socket(_)
                | ClientError::Timeout(_)
                | ClientError::Io(_)
                | ClientError::RetriesExhausted(_)
        )
    }

    /// The tracker said something outside the protocol, or the exchange
    /// ended in a state that cannot be interpreted safely
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            ClientError::Protocol(_)
                | ClientError::BadServerResponse(_)
                | ClientError::TruncatedRequest(_)
        )
    }

    /// Error code of a well-formed `ERR` reply
    pub fn tracker_code(&self) -> Option<&str> {
        match self {
            ClientError::Tracker(err) => Some(&err.code),
            _ => None,
        }
    }
}

impl From<TrackerError> for ClientError {
    fn from(err: TrackerError) -> Self {
        ClientError::Tracker(err)
    }
}
