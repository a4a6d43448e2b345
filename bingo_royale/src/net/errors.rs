//! Network error types for sessions and framing.

use std::{io, net::SocketAddr, time::Duration};
use thiserror::Error;

/// Errors surfaced by the session server and client.
#[derive(Debug, Error)]
pub enum NetError {
    /// A listener or discovery socket could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The TCP connect itself failed
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The TCP connect did not finish in time
    #[error("Timed out connecting to {addr} after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An outbound record exceeded the framing limit
    #[error("Message size {actual} exceeds maximum {max}")]
    MessageTooLarge { actual: usize, max: usize },

    #[error("Not connected to a server")]
    NotConnected,

    /// The client was released and can no longer be used
    #[error("Client has been released")]
    Released,

    #[error("Server is already running")]
    AlreadyRunning,
}

/// Result type for network operations
pub type NetResult<T> = Result<T, NetError>;
