//! Initiator role
//!
//! Attempts exactly one outbound connection and reports a single terminal
//! outcome. Cancellation closes the in-flight attempt and surfaces through
//! the failure branch, so promote/demote is invoked exactly once per
//! instance either way.

use std::sync::Arc;

use tracing::{debug, info};

use pairchat_core::{CloseSignal, PeerAddress};

use crate::manager::{ManagerInner, RoleId, RoleKind};

pub(crate) fn spawn(inner: Arc<ManagerInner>, peer: PeerAddress, cancel: CloseSignal, id: RoleId) {
    tokio::spawn(run(inner, peer, cancel, id));
}

async fn run(inner: Arc<ManagerInner>, peer: PeerAddress, cancel: CloseSignal, id: RoleId) {
    debug!("initiator up for {}", peer);

    // An active inquiry slows down connection establishment.
    inner.transport.pause_discovery().await;

    tokio::select! {
        _ = cancel.closed() => {
            debug!("connect to {} cancelled", peer);
            inner.demote("unable to connect device", RoleKind::Initiator, id).await;
        }
        result = inner.transport.connect(&peer, &inner.config.service) => match result {
            Ok(socket) => inner.promote(socket, RoleKind::Initiator, id),
            Err(e) => {
                info!("connect to {} failed: {}", peer, e);
                inner.demote("unable to connect device", RoleKind::Initiator, id).await;
            }
        }
    }
}
