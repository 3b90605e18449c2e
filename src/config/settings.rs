//! Service settings
//!
//! Loads settings from an optional TOML file; every field has a default
//! matching the built-in constants, so a missing file or empty document
//! yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default relay endpoint to dial out to
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8080/ws";

/// Default delay between reconnection attempts, in seconds
pub const DEFAULT_BACKOFF_SECS: u64 = 5;

/// Default HTTP bind address
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8000;

/// Errors that can occur during config operations
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Remote WebSocket endpoint the supervisor connects to
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Delay between reconnection attempts, in seconds
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
    /// HTTP bind address
    #[serde(default = "default_bind")]
    pub bind: String,
    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_backoff_secs() -> u64 {
    DEFAULT_BACKOFF_SECS
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            backoff_secs: default_backoff_secs(),
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Backoff interval as a [`Duration`]
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    /// HTTP socket address to bind to
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
