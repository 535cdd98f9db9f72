use std::net::SocketAddr;
use std::time::Duration;

/// Errors that can occur in datagram transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind the local socket.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to associate the socket with its remote peer.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The peer address could not be resolved.
    #[error("failed to resolve {target}: {reason}")]
    Resolve { target: String, reason: String },

    /// An I/O error occurred on the socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No datagram arrived within the receive timeout.
    #[error("receive timed out after {0:?}")]
    Timeout(Duration),

    /// A received datagram did not fit in the receive buffer.
    #[error("datagram too large ({size} bytes, max {max})")]
    DatagramTooLarge { size: usize, max: usize },
}

impl TransportError {
    /// Returns true if this error is a receive timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
