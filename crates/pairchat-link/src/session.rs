//! Session role
//!
//! Owns an established socket for the lifetime of the connection. The task
//! is the sole reader of the socket and forwards every inbound chunk as an
//! event; writes go through the manager, which snapshots the socket handle
//! and writes outside the state lock.

use std::sync::Arc;

use tracing::{debug, trace};

use pairchat_core::{ConnectionState, LinkEvent, LinkSocket, PeerIdentity};

use crate::manager::{ManagerInner, RoleId, RoleKind};

pub(crate) fn spawn(
    inner: Arc<ManagerInner>,
    socket: Arc<dyn LinkSocket>,
    peer: PeerIdentity,
    id: RoleId,
) {
    tokio::spawn(run(inner, socket, peer, id));
}

async fn run(inner: Arc<ManagerInner>, socket: Arc<dyn LinkSocket>, peer: PeerIdentity, id: RoleId) {
    debug!("session up with {}", peer);

    // Reused across reads; each event carries its own copy of the bytes.
    let mut buf = vec![0u8; inner.config.read_buffer_size];

    while inner.current_state() == ConnectionState::Connected {
        match socket.read(&mut buf).await {
            Ok(n) if n > 0 => {
                trace!("received {} bytes: {}", n, hex::encode(&buf[..n]));
                inner.emit(LinkEvent::BytesReceived {
                    peer: peer.clone(),
                    payload: buf[..n].to_vec(),
                });
            }
            Ok(_) => {
                debug!("end of stream from {}", peer);
                inner.demote("connection was lost", RoleKind::Session, id).await;
                break;
            }
            Err(e) => {
                debug!("read from {} failed: {}", peer, e);
                inner.demote("connection was lost", RoleKind::Session, id).await;
                break;
            }
        }
    }

    debug!("session down");
}
