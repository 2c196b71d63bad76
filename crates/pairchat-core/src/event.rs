//! Link state and the typed event stream toward the UI layer
//!
//! All observable output of the link manager flows through [`LinkEvent`]
//! values on a single ordered channel. The consumer sees state transitions in
//! exactly the order the manager performed them.

use core::fmt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::PeerIdentity;

// ----------------------------------------------------------------------------
// Connection State
// ----------------------------------------------------------------------------

/// Which role of the link is currently live
///
/// Exactly one value at any instant; mutated only under the link manager's
/// lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Nothing running
    Idle,
    /// Accepting inbound connections
    Listening,
    /// Attempting an outbound connection
    Connecting,
    /// A session with a remote peer is established
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "idle"),
            ConnectionState::Listening => write!(f, "listening"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

// ----------------------------------------------------------------------------
// Link Events: Manager → UI
// ----------------------------------------------------------------------------

/// Events emitted by the link manager toward the consuming UI layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LinkEvent {
    /// The connection state changed; emitted once per transition
    StateChanged(ConnectionState),
    /// A chunk of bytes arrived from the connected peer
    BytesReceived {
        peer: PeerIdentity,
        payload: Vec<u8>,
    },
    /// An outbound write completed
    BytesSent { payload: Vec<u8> },
    /// The connected peer's display name became known
    PeerNamed { name: String },
    /// A recoverable failure worth showing to the user
    TransientError { message: String },
}

// ----------------------------------------------------------------------------
// Event Channel
// ----------------------------------------------------------------------------

pub type LinkEventSender = mpsc::UnboundedSender<LinkEvent>;
pub type LinkEventReceiver = mpsc::UnboundedReceiver<LinkEvent>;

/// Create the manager→UI event channel.
///
/// Unbounded so that emission never blocks inside the manager's critical
/// section and no transition notification can be dropped.
pub fn link_event_channel() -> (LinkEventSender, LinkEventReceiver) {
    mpsc::unbounded_channel()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(format!("{}", ConnectionState::Idle), "idle");
        assert_eq!(format!("{}", ConnectionState::Connected), "connected");
    }

    #[tokio::test]
    async fn test_event_channel_preserves_order() {
        let (tx, mut rx) = link_event_channel();

        tx.send(LinkEvent::StateChanged(ConnectionState::Listening))
            .unwrap();
        tx.send(LinkEvent::StateChanged(ConnectionState::Connected))
            .unwrap();

        assert!(matches!(
            rx.recv().await,
            Some(LinkEvent::StateChanged(ConnectionState::Listening))
        ));
        assert!(matches!(
            rx.recv().await,
            Some(LinkEvent::StateChanged(ConnectionState::Connected))
        ));
    }
}
