//! Listener role
//!
//! Accepts inbound connections while no session is established. Runs until a
//! connection is promoted or the endpoint is closed by cancellation.

use std::sync::Arc;

use tracing::debug;

use pairchat_core::{ConnectionState, ListeningEndpoint};

use crate::manager::{ManagerInner, RoleId, RoleKind};

pub(crate) fn spawn(inner: Arc<ManagerInner>, endpoint: Arc<dyn ListeningEndpoint>, id: RoleId) {
    tokio::spawn(run(inner, endpoint, id));
}

async fn run(inner: Arc<ManagerInner>, endpoint: Arc<dyn ListeningEndpoint>, id: RoleId) {
    debug!("listener up");

    while inner.current_state() != ConnectionState::Connected {
        match endpoint.accept().await {
            Ok(socket) => {
                // The manager decides under its lock whether this connection
                // wins or gets reclaimed and discarded.
                inner.promote(socket, RoleKind::Listener, id);
            }
            Err(e) => {
                // Endpoint closed by cancellation; the expected way out.
                debug!("accept ended: {}", e);
                break;
            }
        }
    }

    debug!("listener down");
}
