//! Interactive chat session
//!
//! Bridges the link manager's event stream and stdin: plain lines are sent
//! to the peer, slash-prefixed lines are commands, and every link event is
//! rendered as a line of terminal output.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use pairchat_core::{LinkConfig, LinkError, LinkEvent, LinkEventReceiver};
use pairchat_link::LinkManager;
use pairchat_tcp::{TcpTransport, TcpTransportConfig};

use crate::config::AppConfig;
use crate::error::Result;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// The running chat application
pub struct ChatApp {
    manager: LinkManager,
    events: LinkEventReceiver,
    transport: Arc<TcpTransport>,
    peer_name: Option<String>,
}

impl ChatApp {
    /// Build the transport and link manager from configuration
    pub fn new(config: AppConfig) -> Self {
        let transport = Arc::new(TcpTransport::new(
            TcpTransportConfig::new()
                .with_bind_addr(config.bind)
                .with_node_name(config.name.clone())
                .with_handshake_timeout(HANDSHAKE_TIMEOUT),
        ));
        let link_config = LinkConfig::default().with_service(config.service.clone());
        let (manager, events) = LinkManager::new(transport.clone(), link_config);

        Self {
            manager,
            events,
            transport,
            peer_name: None,
        }
    }

    /// Run the chat session until stdin closes or the user quits
    pub async fn run(mut self, dial: Option<SocketAddr>) -> Result<()> {
        self.manager.start().await?;
        if let Some(addr) = self.transport.local_addr() {
            info!("reachable on {}", addr);
        }
        if let Some(addr) = dial {
            self.manager.connect_to(addr.to_string());
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.render_event(event),
                    None => break,
                },
                line = lines.next_line() => match line? {
                    Some(line) => {
                        if !self.handle_line(&line).await {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        self.manager.stop();
        Ok(())
    }

    fn render_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::StateChanged(state) => println!("[link {}]", state),
            LinkEvent::PeerNamed { name } => {
                println!("[connected to {}]", name);
                self.peer_name = Some(name);
            }
            LinkEvent::BytesReceived { peer, payload } => {
                let name = self
                    .peer_name
                    .clone()
                    .unwrap_or_else(|| peer.display_name().to_string());
                println!("{}: {}", name, String::from_utf8_lossy(&payload));
            }
            LinkEvent::BytesSent { payload } => {
                println!("me: {}", String::from_utf8_lossy(&payload));
            }
            LinkEvent::TransientError { message } => println!("[{}]", message),
        }
    }

    /// Handle one line of input; returns false when the session should end
    async fn handle_line(&mut self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return true;
        }

        if let Some(command) = line.strip_prefix('/') {
            return self.handle_command(command).await;
        }

        match self.manager.send(line.as_bytes().to_vec()).await {
            Ok(()) => {}
            Err(LinkError::NotConnected) => println!("[you are not connected to a device]"),
            Err(e) => println!("[send failed: {}]", e),
        }
        true
    }

    async fn handle_command(&mut self, command: &str) -> bool {
        let mut parts = command.split_whitespace();
        match parts.next() {
            Some("connect") => match parts.next() {
                Some(address) => self.manager.connect_to(address),
                None => println!("usage: /connect <address>"),
            },
            Some("start") => {
                if let Err(e) = self.manager.start().await {
                    println!("[{}]", e);
                }
            }
            Some("stop") => self.manager.stop(),
            Some("state") => println!("[link {}]", self.manager.current_state()),
            Some("quit") => return false,
            _ => println!("commands: /connect <address>, /start, /stop, /state, /quit"),
        }
        true
    }
}
