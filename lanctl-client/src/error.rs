//! Client error types.

use thiserror::Error;

/// Errors from the discovery exchange.
///
/// These are all recoverable: the discovery socket stays usable and the
/// caller may retry or prompt again. Only the initial socket bind is fatal,
/// and that surfaces as an `std::io::Error` from [`DiscoveryClient::bind`].
///
/// [`DiscoveryClient::bind`]: crate::discovery::DiscoveryClient::bind
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no reply within the discovery window")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] lanctl_protocol::ProtocolError),

    #[error("malformed broadcast address: {0:?}")]
    MalformedAddress(String),
}

/// Errors from a persistent service session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] lanctl_protocol::ProtocolError),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("connect timeout")]
    ConnectTimeout,

    #[error("a command side effect is still pending")]
    CommandInFlight,
}
