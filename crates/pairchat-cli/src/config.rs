//! Application configuration

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use pairchat_core::ServiceProfile;

use crate::error::{CliError, Result};

/// Port used when no bind address is configured
const DEFAULT_PORT: u16 = 6021;

/// Application configuration, loadable from a TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Display name announced to the peer
    pub name: String,
    /// Local address to listen on
    pub bind: SocketAddr,
    /// Service announced and requested on the link
    pub service: ServiceProfile,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Anonymous".to_string(),
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            service: ServiceProfile::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an explicit TOML file
    pub fn load_from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Default configuration file location, if a config directory exists
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pairchat").join("config.toml"))
    }

    /// Load from the given path, from the default location when present, or
    /// fall back to defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }
        if let Some(default) = Self::default_path() {
            if default.exists() {
                let path = default
                    .to_str()
                    .ok_or_else(|| CliError::Config("config path is not UTF-8".to_string()))?;
                return Self::load_from_file(path);
            }
        }
        Ok(Self::default())
    }
}
