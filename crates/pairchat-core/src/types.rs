//! Core types for the pairchat link
//!
//! This module defines the fundamental types shared across the link manager
//! and transport implementations, using newtype patterns for type safety.

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Peer Address
// ----------------------------------------------------------------------------

/// Opaque device address of a remote peer
///
/// The address format is owned by the transport (a radio hardware address, a
/// socket address, an in-process registry key). The link manager only ever
/// passes it through and compares it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddress(String);

impl PeerAddress {
    /// Create a new address from its string form
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Get the string form of the address
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PeerAddress {
    type Err = core::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for PeerAddress {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PeerAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ----------------------------------------------------------------------------
// Peer Identity
// ----------------------------------------------------------------------------

/// Identity of the remote end of an established socket
///
/// The display name is only known once a socket exists; transports that have
/// no name concept leave it unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerIdentity {
    /// Device address the socket is bound to
    pub address: PeerAddress,
    /// Human-readable name reported by the transport, if any
    pub name: Option<String>,
}

impl PeerIdentity {
    /// Create an identity with a known display name
    pub fn named(address: impl Into<PeerAddress>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: Some(name.into()),
        }
    }

    /// Create an identity with no display name
    pub fn anonymous(address: impl Into<PeerAddress>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    /// Name to show in a UI: the reported name, or the address as fallback
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.address.as_str())
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", name, self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
