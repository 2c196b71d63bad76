//! In-process transport
//!
//! A [`MemoryNetwork`] is a registry of listening peers keyed by address;
//! connecting hands one side of an in-memory socket pair to the listener's
//! accept queue. Used by the test suites and by simulator-style demos that
//! run both ends of a link inside one process.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::config::ServiceProfile;
use crate::errors::TransportError;
use crate::shutdown::CloseSignal;
use crate::transport::{LinkSocket, ListeningEndpoint, Transport};
use crate::types::{PeerAddress, PeerIdentity};

// ----------------------------------------------------------------------------
// Network Registry
// ----------------------------------------------------------------------------

enum Registration {
    Listener {
        token: u64,
        service_id: Uuid,
        identity: PeerIdentity,
        incoming: mpsc::UnboundedSender<Arc<MemorySocket>>,
    },
    /// An address whose connect attempts never complete; lets tests hold an
    /// outbound attempt open indefinitely.
    Unresponsive,
}

/// Shared registry connecting [`MemoryTransport`] instances to each other
pub struct MemoryNetwork {
    registrations: Mutex<HashMap<PeerAddress, Registration>>,
    next_token: AtomicU64,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            registrations: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        })
    }

    /// Create a transport for a peer living on this network
    pub fn transport(
        self: &Arc<Self>,
        address: impl Into<PeerAddress>,
        name: impl Into<String>,
    ) -> MemoryTransport {
        MemoryTransport {
            network: Arc::clone(self),
            identity: PeerIdentity::named(address.into(), name),
        }
    }

    /// Register an address whose connect attempts hang until cancelled
    pub fn add_unresponsive(&self, address: impl Into<PeerAddress>) {
        self.registrations
            .lock()
            .expect("registry lock poisoned")
            .insert(address.into(), Registration::Unresponsive);
    }

    fn deregister(&self, address: &PeerAddress, token: u64) {
        let mut regs = self.registrations.lock().expect("registry lock poisoned");
        if let Some(Registration::Listener { token: t, .. }) = regs.get(address) {
            if *t == token {
                regs.remove(address);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Memory Transport
// ----------------------------------------------------------------------------

/// One peer's handle onto a [`MemoryNetwork`]
pub struct MemoryTransport {
    network: Arc<MemoryNetwork>,
    identity: PeerIdentity,
}

impl MemoryTransport {
    /// Address this transport listens under and connects from
    pub fn local_address(&self) -> &PeerAddress {
        &self.identity.address
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn listen(
        &self,
        service: &ServiceProfile,
    ) -> Result<Arc<dyn ListeningEndpoint>, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = self.network.next_token.fetch_add(1, Ordering::Relaxed);

        self.network
            .registrations
            .lock()
            .expect("registry lock poisoned")
            .insert(
                self.identity.address.clone(),
                Registration::Listener {
                    token,
                    service_id: service.id,
                    identity: self.identity.clone(),
                    incoming: tx,
                },
            );

        debug!("{} listening for service {}", self.identity.address, service.name);
        Ok(Arc::new(MemoryEndpoint {
            network: Arc::clone(&self.network),
            address: self.identity.address.clone(),
            token,
            incoming: tokio::sync::Mutex::new(rx),
            close: CloseSignal::new(),
        }))
    }

    async fn connect(
        &self,
        peer: &PeerAddress,
        service: &ServiceProfile,
    ) -> Result<Arc<dyn LinkSocket>, TransportError> {
        enum Route {
            Deliver(PeerIdentity, mpsc::UnboundedSender<Arc<MemorySocket>>),
            Hang,
        }

        let route = {
            let regs = self
                .network
                .registrations
                .lock()
                .expect("registry lock poisoned");

            match regs.get(peer) {
                Some(Registration::Listener {
                    service_id,
                    identity,
                    incoming,
                    ..
                }) => {
                    if *service_id != service.id {
                        return Err(TransportError::ServiceMismatch {
                            expected: service.id.to_string(),
                            actual: service_id.to_string(),
                        });
                    }
                    Route::Deliver(identity.clone(), incoming.clone())
                }
                Some(Registration::Unresponsive) => Route::Hang,
                None => {
                    return Err(TransportError::PeerUnreachable {
                        address: peer.to_string(),
                    });
                }
            }
        };

        let (remote_identity, incoming) = match route {
            Route::Deliver(identity, incoming) => (identity, incoming),
            Route::Hang => {
                // Held open until the caller abandons the attempt.
                std::future::pending::<()>().await;
                unreachable!("pending future resolved");
            }
        };

        let (local, remote) = socket_pair(self.identity.clone(), remote_identity);
        incoming
            .send(remote)
            .map_err(|_| TransportError::PeerUnreachable {
                address: peer.to_string(),
            })?;

        debug!("{} connected to {}", self.identity.address, peer);
        Ok(local)
    }
}

// ----------------------------------------------------------------------------
// Listening Endpoint
// ----------------------------------------------------------------------------

struct MemoryEndpoint {
    network: Arc<MemoryNetwork>,
    address: PeerAddress,
    token: u64,
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<Arc<MemorySocket>>>,
    close: CloseSignal,
}

#[async_trait]
impl ListeningEndpoint for MemoryEndpoint {
    async fn accept(&self) -> Result<Arc<dyn LinkSocket>, TransportError> {
        let mut incoming = self.incoming.lock().await;
        tokio::select! {
            _ = self.close.closed() => Err(TransportError::Closed),
            conn = incoming.recv() => match conn {
                Some(socket) => {
                    let socket: Arc<dyn LinkSocket> = socket;
                    Ok(socket)
                }
                None => Err(TransportError::Closed),
            }
        }
    }

    fn close(&self) {
        self.close.close();
        self.network.deregister(&self.address, self.token);
    }
}

// ----------------------------------------------------------------------------
// Memory Socket
// ----------------------------------------------------------------------------

struct RecvState {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    pending: VecDeque<u8>,
}

/// One side of an in-memory socket pair
struct MemorySocket {
    peer: PeerIdentity,
    tx: mpsc::UnboundedSender<Vec<u8>>,
    recv: tokio::sync::Mutex<RecvState>,
    close: CloseSignal,
    remote_close: CloseSignal,
}

fn socket_pair(a: PeerIdentity, b: PeerIdentity) -> (Arc<MemorySocket>, Arc<MemorySocket>) {
    let (tx_ab, rx_ab) = mpsc::unbounded_channel();
    let (tx_ba, rx_ba) = mpsc::unbounded_channel();
    let close_a = CloseSignal::new();
    let close_b = CloseSignal::new();

    let side_a = Arc::new(MemorySocket {
        peer: b.clone(),
        tx: tx_ab,
        recv: tokio::sync::Mutex::new(RecvState {
            rx: rx_ba,
            pending: VecDeque::new(),
        }),
        close: close_a.clone(),
        remote_close: close_b.clone(),
    });
    let side_b = Arc::new(MemorySocket {
        peer: a,
        tx: tx_ba,
        recv: tokio::sync::Mutex::new(RecvState {
            rx: rx_ab,
            pending: VecDeque::new(),
        }),
        close: close_b,
        remote_close: close_a,
    });

    (side_a, side_b)
}

#[async_trait]
impl LinkSocket for MemorySocket {
    async fn read(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        loop {
            if self.close.is_closed() {
                return Err(TransportError::Closed);
            }

            let mut state = self.recv.lock().await;
            if !state.pending.is_empty() {
                let n = buf.len().min(state.pending.len());
                for (slot, byte) in buf.iter_mut().zip(state.pending.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }

            tokio::select! {
                _ = self.close.closed() => return Err(TransportError::Closed),
                _ = self.remote_close.closed() => return Err(TransportError::Closed),
                chunk = state.rx.recv() => match chunk {
                    Some(bytes) => state.pending.extend(bytes),
                    None => return Err(TransportError::Closed),
                }
            }
        }
    }

    async fn write_all(&self, buf: &[u8]) -> Result<(), TransportError> {
        if self.close.is_closed() || self.remote_close.is_closed() {
            return Err(TransportError::Closed);
        }
        self.tx
            .send(buf.to_vec())
            .map_err(|_| TransportError::Closed)
    }

    fn close(&self) {
        self.close.close();
    }

    fn remote_peer(&self) -> PeerIdentity {
        self.peer.clone()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
