//! Error taxonomy for the client.
//!
//! Transport errors cover everything between this process and the server
//! socket; they are the only errors the reconnect machinery acts on.
//! `ClientError` wraps the remaining local failure modes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("not connected")]
    NotConnected,

    #[error("connection closed: {reason}")]
    ConnectionClosed { reason: String },

    #[error("invocation rejected by server: {reason}")]
    Rejected { reason: String },

    #[error("websocket error: {reason}")]
    WebSocket { reason: String },
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("login store error: {0}")]
    Store(#[from] std::io::Error),
}
