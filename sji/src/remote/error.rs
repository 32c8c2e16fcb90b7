//! Remote call error types

use thiserror::Error;

use super::transport::Method;

/// Transport-level failures (connection, body read, local file I/O)
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal outcomes of the request executor
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Forbidden (403) on {method} {url}")]
    Forbidden { method: Method, url: String },

    #[error("Server error {status} on {method} {url}: {body}")]
    Server {
        status: u16,
        method: Method,
        url: String,
        body: String,
    },

    #[error("Gave up on {method} {url} after {attempts} attempts, last: {last}")]
    RetriesExhausted {
        method: Method,
        url: String,
        attempts: u32,
        last: String,
    },
}

impl RemoteError {
    /// HTTP status behind this error, if there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Forbidden { .. } => Some(403),
            RemoteError::Server { status, .. } => Some(*status),
            RemoteError::RetriesExhausted { .. } => None,
        }
    }
}
