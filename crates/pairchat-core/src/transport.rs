//! Transport boundary for the pairchat link
//!
//! The link manager is transport-agnostic: it drives these traits and nothing
//! else. A transport supplies duplex byte-stream sockets bound to a remote
//! device, obtained either by accepting on a listening endpoint or by
//! initiating an outbound connection to a known address.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ServiceProfile;
use crate::errors::TransportError;
use crate::types::{PeerAddress, PeerIdentity};

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// Factory for listening endpoints and outbound connections
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Register the service and start listening for inbound connections
    async fn listen(
        &self,
        service: &ServiceProfile,
    ) -> Result<Arc<dyn ListeningEndpoint>, TransportError>;

    /// Initiate an outbound connection to a peer offering the service.
    /// Blocks until the socket is established or the attempt fails.
    async fn connect(
        &self,
        peer: &PeerAddress,
        service: &ServiceProfile,
    ) -> Result<Arc<dyn LinkSocket>, TransportError>;

    /// Pause any ongoing device discovery. Called before an outbound attempt;
    /// an active inquiry slows connection establishment on radio transports.
    async fn pause_discovery(&self) {}
}

// ----------------------------------------------------------------------------
// Listening Endpoint
// ----------------------------------------------------------------------------

/// A bound, service-registered endpoint accepting inbound connections
#[async_trait]
pub trait ListeningEndpoint: Send + Sync {
    /// Block until an inbound connection is established.
    ///
    /// Fails with [`TransportError::Closed`] once the endpoint is closed;
    /// that is the only way to unblock a pending accept.
    async fn accept(&self) -> Result<Arc<dyn LinkSocket>, TransportError>;

    /// Close the endpoint. Idempotent; unblocks a pending accept.
    fn close(&self);
}

// ----------------------------------------------------------------------------
// Link Socket
// ----------------------------------------------------------------------------

/// An established duplex byte stream bound to a remote device
///
/// Reads and writes are independently serialized by the implementation, so a
/// shared handle may be read from one task and written from another.
#[async_trait]
pub trait LinkSocket: Send + Sync {
    /// Block until at least one byte is available, filling `buf` and
    /// returning the byte count.
    ///
    /// End-of-stream and closure (local or remote) are reported as
    /// [`TransportError::Closed`]; `read` never returns `Ok(0)`.
    async fn read(&self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write the whole buffer to the peer
    async fn write_all(&self, buf: &[u8]) -> Result<(), TransportError>;

    /// Close the socket. Idempotent; unblocks a pending read.
    fn close(&self);

    /// Identity of the remote end
    fn remote_peer(&self) -> PeerIdentity;
}
