//! Command-line interface definitions and parsing

use std::net::SocketAddr;

use clap::Parser;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Display name announced to the peer
    #[arg(short, long)]
    pub name: Option<String>,

    /// Local address to listen on
    #[arg(short, long)]
    pub bind: Option<SocketAddr>,

    /// Peer address to dial on startup
    #[arg(long)]
    pub connect: Option<SocketAddr>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
