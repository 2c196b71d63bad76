//! Link manager
//!
//! The manager owns the connection lifecycle across three concurrent roles:
//! a listener accepting inbound connections, an initiator attempting one
//! outbound connection, and a session pumping data once a connection exists.
//! At most one role of each kind is live at a time; all role handles and the
//! connection state live behind a single lock, and every observable event is
//! emitted from inside the critical section that performed the transition.
//!
//! Role workers are spawned as independent tasks. Cancelling a role closes
//! the resource it is blocked on and does not wait for the task to unwind;
//! a superseded worker's terminal report is recognized by its role id and
//! discarded, so it can no longer drive state it does not own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use pairchat_core::{
    link_event_channel, CloseSignal, ConnectionState, LinkConfig, LinkError, LinkEvent,
    LinkEventReceiver, LinkEventSender, LinkResult, LinkSocket, ListeningEndpoint, PeerAddress,
    Transport,
};

use crate::{initiator, listener, session};

// ----------------------------------------------------------------------------
// Role Handles
// ----------------------------------------------------------------------------

/// Identifies one spawned role instance; reports carrying a stale id are
/// dropped at the manager boundary.
pub(crate) type RoleId = u64;

/// Which role a worker report originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RoleKind {
    Listener,
    Initiator,
    Session,
}

struct ListenerHandle {
    id: RoleId,
    endpoint: Arc<dyn ListeningEndpoint>,
}

struct InitiatorHandle {
    id: RoleId,
    cancel: CloseSignal,
}

struct SessionHandle {
    id: RoleId,
    socket: Arc<dyn LinkSocket>,
}

// ----------------------------------------------------------------------------
// Shared State
// ----------------------------------------------------------------------------

struct Shared {
    state: ConnectionState,
    listener: Option<ListenerHandle>,
    initiator: Option<InitiatorHandle>,
    session: Option<SessionHandle>,
}

pub(crate) struct ManagerInner {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) config: LinkConfig,
    events: LinkEventSender,
    shared: Mutex<Shared>,
    next_role_id: AtomicU64,
}

impl ManagerInner {
    fn allocate_role_id(&self) -> RoleId {
        self.next_role_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn emit(&self, event: LinkEvent) {
        if self.events.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }

    /// Record a transition and notify the consumer. Emits nothing when the
    /// state is unchanged, so every transition is observed exactly once.
    fn set_state(&self, shared: &mut Shared, next: ConnectionState) {
        if shared.state != next {
            debug!("state {} -> {}", shared.state, next);
            shared.state = next;
            self.emit(LinkEvent::StateChanged(next));
        }
    }

    pub(crate) fn current_state(&self) -> ConnectionState {
        self.shared.lock().expect("state lock poisoned").state
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Cancel any outbound attempt or live session and make sure a listener
    /// is running.
    pub(crate) async fn start(self: &Arc<Self>) -> LinkResult<()> {
        debug!("start");
        {
            let mut shared = self.shared.lock().expect("state lock poisoned");
            if let Some(initiator) = shared.initiator.take() {
                initiator.cancel.close();
            }
            if let Some(session) = shared.session.take() {
                session.socket.close();
            }
            if shared.listener.is_some() {
                self.set_state(&mut shared, ConnectionState::Listening);
                return Ok(());
            }
        }

        let endpoint = match self.transport.listen(&self.config.service).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!("listen setup failed: {}", e);
                self.emit(LinkEvent::TransientError {
                    message: format!("unable to listen: {e}"),
                });
                let mut shared = self.shared.lock().expect("state lock poisoned");
                self.set_state(&mut shared, ConnectionState::Idle);
                return Err(LinkError::ListenSetup(e));
            }
        };

        let mut shared = self.shared.lock().expect("state lock poisoned");
        if shared.listener.is_some() || shared.state == ConnectionState::Connected {
            // A concurrent start or an inbound promotion won the race.
            endpoint.close();
            return Ok(());
        }

        let id = self.allocate_role_id();
        shared.listener = Some(ListenerHandle {
            id,
            endpoint: Arc::clone(&endpoint),
        });
        listener::spawn(Arc::clone(self), endpoint, id);
        if shared.initiator.is_none() {
            self.set_state(&mut shared, ConnectionState::Listening);
        }
        Ok(())
    }

    /// Cancel any outbound attempt or live session and start a fresh
    /// initiator for `peer`. A running listener stays up; it is only
    /// cancelled when a connection is actually established.
    pub(crate) fn connect_to(self: &Arc<Self>, peer: PeerAddress) {
        debug!("connect to {}", peer);
        let mut shared = self.shared.lock().expect("state lock poisoned");
        if let Some(initiator) = shared.initiator.take() {
            initiator.cancel.close();
        }
        if let Some(session) = shared.session.take() {
            session.socket.close();
        }

        let id = self.allocate_role_id();
        let cancel = CloseSignal::new();
        shared.initiator = Some(InitiatorHandle {
            id,
            cancel: cancel.clone(),
        });
        initiator::spawn(Arc::clone(self), peer, cancel, id);
        self.set_state(&mut shared, ConnectionState::Connecting);
    }

    /// A listener or initiator produced an established socket: cancel the
    /// other pre-connection roles and hand the socket to a new session.
    ///
    /// A worker that has been superseded, or that raced against a transition
    /// already past `Connecting`, loses here: its socket is closed and
    /// discarded without a state change.
    pub(crate) fn promote(self: &Arc<Self>, socket: Arc<dyn LinkSocket>, origin: RoleKind, id: RoleId) {
        let mut shared = self.shared.lock().expect("state lock poisoned");

        let still_live = match origin {
            RoleKind::Listener => shared.listener.as_ref().map(|h| h.id) == Some(id),
            RoleKind::Initiator => shared.initiator.as_ref().map(|h| h.id) == Some(id),
            RoleKind::Session => false,
        };
        let accepting = matches!(
            shared.state,
            ConnectionState::Listening | ConnectionState::Connecting
        );
        if !still_live || !accepting {
            debug!(
                "discarding connection from superseded {:?} (state {})",
                origin, shared.state
            );
            socket.close();
            return;
        }

        if let Some(listener) = shared.listener.take() {
            listener.endpoint.close();
        }
        if let Some(initiator) = shared.initiator.take() {
            initiator.cancel.close();
        }

        let peer = socket.remote_peer();
        let session_id = self.allocate_role_id();
        shared.session = Some(SessionHandle {
            id: session_id,
            socket: Arc::clone(&socket),
        });
        session::spawn(Arc::clone(self), socket, peer.clone(), session_id);

        tracing::info!("connected to {}", peer);
        self.emit(LinkEvent::PeerNamed {
            name: peer.display_name().to_string(),
        });
        self.set_state(&mut shared, ConnectionState::Connected);
    }

    /// An initiator failed to connect, or a session lost its stream: drop
    /// back to idle, surface the failure, and resume listening.
    ///
    /// Reports from workers that no longer own their role (cancelled by
    /// `stop`, replaced by a newer attempt, or outlived by a promotion) are
    /// discarded; their socket was already closed by whoever cancelled them.
    pub(crate) async fn demote(self: &Arc<Self>, reason: &str, origin: RoleKind, id: RoleId) {
        {
            let mut shared = self.shared.lock().expect("state lock poisoned");

            let still_live = match origin {
                RoleKind::Initiator => shared.initiator.as_ref().map(|h| h.id) == Some(id),
                RoleKind::Session => shared.session.as_ref().map(|h| h.id) == Some(id),
                RoleKind::Listener => false,
            };
            if !still_live {
                debug!("ignoring stale failure report from {:?}", origin);
                return;
            }

            match origin {
                RoleKind::Initiator => {
                    shared.initiator = None;
                }
                RoleKind::Session => {
                    if let Some(session) = shared.session.take() {
                        session.socket.close();
                    }
                }
                RoleKind::Listener => {}
            }

            self.emit(LinkEvent::TransientError {
                message: reason.to_string(),
            });
            self.set_state(&mut shared, ConnectionState::Idle);
        }

        // Resume listening so the peer can reach us again.
        if let Err(e) = self.start().await {
            debug!("restart after failure did not take: {}", e);
        }
    }

    /// Take a consistent snapshot of the live session and perform the write
    /// outside the state lock.
    pub(crate) async fn send(&self, payload: Vec<u8>) -> LinkResult<()> {
        let socket = {
            let shared = self.shared.lock().expect("state lock poisoned");
            if shared.state != ConnectionState::Connected {
                return Err(LinkError::NotConnected);
            }
            match shared.session.as_ref() {
                Some(session) => Arc::clone(&session.socket),
                None => return Err(LinkError::NotConnected),
            }
        };

        if let Err(e) = socket.write_all(&payload).await {
            // A failed write is reported but does not tear the session down;
            // only the read loop decides that the connection is gone.
            warn!("write failed: {}", e);
            return Err(LinkError::Write(e));
        }

        debug!("sent {} bytes", payload.len());
        self.emit(LinkEvent::BytesSent { payload });
        Ok(())
    }

    /// Cancel every live role and go quiescent. No auto-restart follows.
    pub(crate) fn stop(&self) {
        debug!("stop");
        let mut shared = self.shared.lock().expect("state lock poisoned");
        if let Some(initiator) = shared.initiator.take() {
            initiator.cancel.close();
        }
        if let Some(session) = shared.session.take() {
            session.socket.close();
        }
        if let Some(listener) = shared.listener.take() {
            listener.endpoint.close();
        }
        self.set_state(&mut shared, ConnectionState::Idle);
    }
}

// ----------------------------------------------------------------------------
// Link Manager
// ----------------------------------------------------------------------------

/// Handle to the connection-role manager
///
/// Cheap to clone; every clone drives the same link. All methods are safe to
/// call concurrently from any task. Must be used from within a tokio runtime,
/// since role workers are spawned as tasks.
#[derive(Clone)]
pub struct LinkManager {
    inner: Arc<ManagerInner>,
}

impl LinkManager {
    /// Create a manager over a transport. Returns the manager and the
    /// receiving end of its event stream; the link starts out idle.
    pub fn new(transport: Arc<dyn Transport>, config: LinkConfig) -> (Self, LinkEventReceiver) {
        let (events, receiver) = link_event_channel();
        let inner = Arc::new(ManagerInner {
            transport,
            config,
            events,
            shared: Mutex::new(Shared {
                state: ConnectionState::Idle,
                listener: None,
                initiator: None,
                session: None,
            }),
            next_role_id: AtomicU64::new(1),
        });
        (Self { inner }, receiver)
    }

    /// Begin listening for an inbound connection. Cancels any outbound
    /// attempt or live session first. Idempotent while already listening.
    pub async fn start(&self) -> LinkResult<()> {
        self.inner.start().await
    }

    /// Attempt an outbound connection to `peer`. Cancels any previous
    /// attempt or live session; a running listener stays up.
    pub fn connect_to(&self, peer: impl Into<PeerAddress>) {
        self.inner.connect_to(peer.into());
    }

    /// Send `payload` to the connected peer. Fails with
    /// [`LinkError::NotConnected`] when no session is established.
    pub async fn send(&self, payload: Vec<u8>) -> LinkResult<()> {
        self.inner.send(payload).await
    }

    /// Tear everything down and go idle. The manager stays usable; a later
    /// `start` or `connect_to` revives it.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Snapshot of the current connection state
    pub fn current_state(&self) -> ConnectionState {
        self.inner.current_state()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pairchat_core::memory::MemoryNetwork;

    #[tokio::test]
    async fn test_manager_starts_idle() {
        let network = MemoryNetwork::new();
        let (manager, _events) =
            LinkManager::new(Arc::new(network.transport("a", "A")), LinkConfig::default());
        assert_eq!(manager.current_state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_send_while_idle_is_rejected() {
        let network = MemoryNetwork::new();
        let (manager, mut events) =
            LinkManager::new(Arc::new(network.transport("a", "A")), LinkConfig::default());

        let err = manager.send(b"hey".to_vec()).await.unwrap_err();
        assert!(matches!(err, LinkError::NotConnected));
        assert!(events.try_recv().is_err());
        assert_eq!(manager.current_state(), ConnectionState::Idle);
    }
}
