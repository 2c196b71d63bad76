//! TCP transport implementation for the pairchat link
//!
//! Implements the transport boundary over `tokio::net`. On establishment
//! both ends exchange a short hello (the 16-byte service id followed by a
//! length-prefixed display name) and the connection is rejected unless the
//! service ids match. The remote name learned from the hello is what the
//! link manager reports to the UI once a session starts.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use pairchat_core::{
    CloseSignal, LinkSocket, ListeningEndpoint, PeerAddress, PeerIdentity, ServiceProfile,
    Transport, TransportError,
};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the TCP transport
#[derive(Debug, Clone)]
pub struct TcpTransportConfig {
    /// Local address listening endpoints bind to
    pub bind_addr: SocketAddr,
    /// Display name announced in the hello exchange
    pub node_name: String,
    /// Deadline for the hello exchange on a new connection
    pub handshake_timeout: Duration,
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            node_name: "anonymous".to_string(),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

impl TcpTransportConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the announced display name
    pub fn with_node_name(mut self, name: impl Into<String>) -> Self {
        self.node_name = name.into();
        self
    }

    /// Set the hello exchange deadline
    pub fn with_handshake_timeout(mut self, deadline: Duration) -> Self {
        self.handshake_timeout = deadline;
        self
    }
}

// ----------------------------------------------------------------------------
// TCP Transport
// ----------------------------------------------------------------------------

/// Transport over plain TCP sockets
pub struct TcpTransport {
    config: TcpTransportConfig,
    bound: Mutex<Option<SocketAddr>>,
}

impl TcpTransport {
    pub fn new(config: TcpTransportConfig) -> Self {
        Self {
            config,
            bound: Mutex::new(None),
        }
    }

    /// Address the most recent listening endpoint is bound to. Useful when
    /// binding to port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.bound.lock().expect("bound lock poisoned")
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn listen(
        &self,
        service: &ServiceProfile,
    ) -> Result<Arc<dyn ListeningEndpoint>, TransportError> {
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| TransportError::ListenFailed {
                reason: e.to_string(),
            })?;
        let local = listener
            .local_addr()
            .map_err(|e| TransportError::ListenFailed {
                reason: e.to_string(),
            })?;
        *self.bound.lock().expect("bound lock poisoned") = Some(local);
        info!("listening on {} for service {}", local, service.name);

        Ok(Arc::new(TcpEndpoint {
            listener,
            service_id: service.id,
            node_name: self.config.node_name.clone(),
            handshake_timeout: self.config.handshake_timeout,
            close: CloseSignal::new(),
        }))
    }

    async fn connect(
        &self,
        peer: &PeerAddress,
        service: &ServiceProfile,
    ) -> Result<Arc<dyn LinkSocket>, TransportError> {
        let addr: SocketAddr =
            peer.as_str()
                .parse()
                .map_err(|_| TransportError::ConnectFailed {
                    address: peer.to_string(),
                    reason: "not a socket address".to_string(),
                })?;

        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::ConnectFailed {
                address: peer.to_string(),
                reason: e.to_string(),
            })?;

        establish(
            stream,
            service.id,
            &self.config.node_name,
            self.config.handshake_timeout,
        )
        .await
    }
}

// ----------------------------------------------------------------------------
// Listening Endpoint
// ----------------------------------------------------------------------------

struct TcpEndpoint {
    listener: TcpListener,
    service_id: Uuid,
    node_name: String,
    handshake_timeout: Duration,
    close: CloseSignal,
}

#[async_trait]
impl ListeningEndpoint for TcpEndpoint {
    async fn accept(&self) -> Result<Arc<dyn LinkSocket>, TransportError> {
        loop {
            let (stream, remote) = tokio::select! {
                _ = self.close.closed() => return Err(TransportError::Closed),
                result = self.listener.accept() => result.map_err(TransportError::Io)?,
            };

            // A bad hello rejects the connection, not the endpoint; the
            // accept call only fails once the endpoint itself is closed.
            match establish(stream, self.service_id, &self.node_name, self.handshake_timeout).await
            {
                Ok(socket) => return Ok(socket),
                Err(e) => {
                    warn!("rejected inbound connection from {}: {}", remote, e);
                }
            }
        }
    }

    fn close(&self) {
        self.close.close();
    }
}

// ----------------------------------------------------------------------------
// Hello Exchange
// ----------------------------------------------------------------------------

/// Run the hello exchange on a fresh stream and wrap it as a link socket
async fn establish(
    mut stream: TcpStream,
    service_id: Uuid,
    node_name: &str,
    deadline: Duration,
) -> Result<Arc<dyn LinkSocket>, TransportError> {
    let remote = stream.peer_addr().map_err(TransportError::Io)?;

    let exchange = async {
        let mut hello = Vec::with_capacity(17 + node_name.len());
        hello.extend_from_slice(service_id.as_bytes());
        let name = node_name.as_bytes();
        let name = &name[..name.len().min(u8::MAX as usize)];
        hello.push(name.len() as u8);
        hello.extend_from_slice(name);
        stream.write_all(&hello).await?;

        let mut id_buf = [0u8; 16];
        stream.read_exact(&mut id_buf).await?;
        let mut len_buf = [0u8; 1];
        stream.read_exact(&mut len_buf).await?;
        let mut name_buf = vec![0u8; len_buf[0] as usize];
        stream.read_exact(&mut name_buf).await?;

        Ok::<_, std::io::Error>((Uuid::from_bytes(id_buf), name_buf))
    };

    let (remote_id, name_buf) = timeout(deadline, exchange)
        .await
        .map_err(|_| TransportError::HandshakeTimeout)?
        .map_err(TransportError::Io)?;

    if remote_id != service_id {
        return Err(TransportError::ServiceMismatch {
            expected: service_id.to_string(),
            actual: remote_id.to_string(),
        });
    }

    let name = String::from_utf8_lossy(&name_buf).into_owned();
    debug!("established link with {} ({})", name, remote);

    let (read_half, write_half) = stream.into_split();
    Ok(Arc::new(TcpLinkSocket {
        reader: tokio::sync::Mutex::new(read_half),
        writer: tokio::sync::Mutex::new(write_half),
        close: CloseSignal::new(),
        peer: PeerIdentity {
            address: PeerAddress::from(remote.to_string()),
            name: Some(name),
        },
    }))
}

// ----------------------------------------------------------------------------
// TCP Link Socket
// ----------------------------------------------------------------------------

struct TcpLinkSocket {
    reader: tokio::sync::Mutex<OwnedReadHalf>,
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    close: CloseSignal,
    peer: PeerIdentity,
}

#[async_trait]
impl LinkSocket for TcpLinkSocket {
    async fn read(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut reader = self.reader.lock().await;
        tokio::select! {
            _ = self.close.closed() => Err(TransportError::Closed),
            result = reader.read(buf) => match result {
                Ok(0) => Err(TransportError::Closed),
                Ok(n) => Ok(n),
                Err(e) => Err(TransportError::Io(e)),
            }
        }
    }

    async fn write_all(&self, buf: &[u8]) -> Result<(), TransportError> {
        if self.close.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut writer = self.writer.lock().await;
        writer.write_all(buf).await.map_err(TransportError::Io)
    }

    fn close(&self) {
        self.close.close();
    }

    fn remote_peer(&self) -> PeerIdentity {
        self.peer.clone()
    }
}
