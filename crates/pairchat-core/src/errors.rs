//! Error types for the pairchat link
//!
//! Transport implementations report [`TransportError`]; the link manager
//! surface reports [`LinkError`], which wraps transport failures where they
//! cross the boundary.

use thiserror::Error;

// ----------------------------------------------------------------------------
// Transport Errors
// ----------------------------------------------------------------------------

/// Failures at the transport boundary
#[derive(Debug, Error)]
pub enum TransportError {
    /// The socket or listening endpoint was closed, locally or by the peer.
    /// End-of-stream on read is reported this way as well.
    #[error("socket closed")]
    Closed,

    #[error("connect to {address} failed: {reason}")]
    ConnectFailed { address: String, reason: String },

    #[error("listen failed: {reason}")]
    ListenFailed { reason: String },

    #[error("peer not reachable: {address}")]
    PeerUnreachable { address: String },

    #[error("service mismatch: expected {expected}, got {actual}")]
    ServiceMismatch { expected: String, actual: String },

    #[error("handshake timed out")]
    HandshakeTimeout,

    #[error("network I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ----------------------------------------------------------------------------
// Link Errors
// ----------------------------------------------------------------------------

/// Errors surfaced by the link manager to its caller
#[derive(Debug, Error)]
pub enum LinkError {
    /// A send was attempted while no session is established. Reported to the
    /// caller only; no state change and no event is produced.
    #[error("not connected to a peer")]
    NotConnected,

    /// The listening endpoint could not be created. Fatal to that listener
    /// attempt; the next `start()` retries.
    #[error("listen setup failed: {0}")]
    ListenSetup(#[source] TransportError),

    /// An outbound write failed. Non-fatal: the session stays up.
    #[error("write failed: {0}")]
    Write(#[source] TransportError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Result alias for link operations
pub type LinkResult<T> = std::result::Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LinkError::NotConnected;
        assert_eq!(err.to_string(), "not connected to a peer");

        let err = LinkError::Write(TransportError::Closed);
        assert_eq!(err.to_string(), "write failed: socket closed");
    }
}
