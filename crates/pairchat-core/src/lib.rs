//! Core types and transport boundary for the pairchat point-to-point link
//!
//! This crate holds everything shared between the link manager and transport
//! implementations: the connection state and event schema, the error types,
//! the configuration, and the transport traits. It also ships an in-process
//! transport used by the test suites.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod errors;
pub mod event;
pub mod memory;
pub mod shutdown;
pub mod transport;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{LinkConfig, ServiceProfile, DEFAULT_SERVICE_ID, DEFAULT_SERVICE_NAME};
pub use errors::{LinkError, LinkResult, TransportError};
pub use event::{
    link_event_channel, ConnectionState, LinkEvent, LinkEventReceiver, LinkEventSender,
};
pub use shutdown::CloseSignal;
pub use transport::{LinkSocket, ListeningEndpoint, Transport};
pub use types::{PeerAddress, PeerIdentity};
