//! Link configuration

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Service UUID announced by default, shared by both ends of a link
pub const DEFAULT_SERVICE_ID: Uuid = Uuid::from_u128(0xba9ccfa6_65af_4f35_8ee1_1453c8869a93);

/// Service record name announced by default
pub const DEFAULT_SERVICE_NAME: &str = "PairChatSecure";

// ----------------------------------------------------------------------------
// Service Profile
// ----------------------------------------------------------------------------

/// Identifies the service a listening endpoint registers and an outbound
/// connection asks for. Both ends must agree on the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProfile {
    /// Service record name
    pub name: String,
    /// Service identifier checked on connection establishment
    pub id: Uuid,
}

impl Default for ServiceProfile {
    fn default() -> Self {
        Self {
            name: DEFAULT_SERVICE_NAME.to_string(),
            id: DEFAULT_SERVICE_ID,
        }
    }
}

// ----------------------------------------------------------------------------
// Link Configuration
// ----------------------------------------------------------------------------

/// Configuration for the link manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Service announced and requested on the transport
    pub service: ServiceProfile,
    /// Size of the session's reusable read buffer
    pub read_buffer_size: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            service: ServiceProfile::default(),
            read_buffer_size: 1024,
        }
    }
}

impl LinkConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service profile
    pub fn with_service(mut self, service: ServiceProfile) -> Self {
        self.service = service;
        self
    }

    /// Set the read buffer size
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LinkConfig::default();
        assert_eq!(config.read_buffer_size, 1024);
        assert_eq!(config.service.id, DEFAULT_SERVICE_ID);
    }

    #[test]
    fn test_builder() {
        let config = LinkConfig::new().with_read_buffer_size(4096);
        assert_eq!(config.read_buffer_size, 4096);
    }
}
