//! Configuration module
//!
//! This module handles relay configuration, including loading from
//! different sources (file, environment variables, command line arguments)
//! and validating the result.

mod defaults;
mod error;
mod loader;
mod merger;
mod validator;

pub use self::error::ConfigError;
pub use self::loader::ConfigLoader;
pub use self::merger::{ConfigMerger, ConfigOverrides};
pub use self::validator::ConfigValidator;
pub use self::defaults::{ENV_PREFIX, DEFAULT_CONFIG_FILE, LISTEN_PORT, LOG_LEVEL_STR};

use serde::{Deserialize, Deserializer, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::common::parse_socket_addr;

/// Custom deserializer for socket addresses
fn deserialize_socket_addr<'de, D>(deserializer: D) -> std::result::Result<SocketAddr, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_socket_addr(&s).map_err(serde::de::Error::custom)
}

/// Relay configuration
///
/// Contains all options needed by the relay server. Supports loading from
/// a JSON file, environment variables and command-line arguments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RelayConfig {
    // --- Network settings ---

    /// Listen address for the relay
    #[serde(deserialize_with = "deserialize_socket_addr")]
    pub listen: SocketAddr,

    /// Disable Nagle's algorithm on accepted connections
    pub tcp_nodelay: bool,

    /// TCP keepalive idle time in seconds (0 disables keepalive)
    pub keepalive_secs: u64,

    // --- General settings ---

    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,

    // --- Relay settings ---

    /// Buffer size for forwarding (in bytes)
    pub buffer_size: usize,

    /// Maximum length of a handshake token, newline included
    pub max_token_len: usize,

    /// Seconds a registered leg may wait for its peer (0 waits forever)
    pub pairing_timeout: u64,
}

impl Default for RelayConfig {
    /// Create a default configuration using centralized defaults
    #[inline]
    fn default() -> Self {
        Self {
            listen: defaults::listen(),
            tcp_nodelay: defaults::tcp_nodelay(),
            keepalive_secs: defaults::keepalive_secs(),
            log_level: defaults::log_level(),
            buffer_size: defaults::buffer_size(),
            max_token_len: defaults::max_token_len(),
            pairing_timeout: defaults::pairing_timeout(),
        }
    }
}

impl RelayConfig {
    /// Keepalive idle time, if enabled
    pub fn keepalive(&self) -> Option<Duration> {
        (self.keepalive_secs > 0).then(|| Duration::from_secs(self.keepalive_secs))
    }

    /// How long a leg may wait for its peer, if bounded
    pub fn pairing_timeout(&self) -> Option<Duration> {
        (self.pairing_timeout > 0).then(|| Duration::from_secs(self.pairing_timeout))
    }

    /// Render the configuration as pretty-printed JSON
    ///
    /// The output is a valid configuration file.
    pub fn to_json(&self) -> std::result::Result<String, ConfigError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Other(format!("Failed to serialize configuration: {}", e)))
    }
}

// Implement AsRef<RelayConfig> for RelayConfig to simplify merge operations
impl AsRef<RelayConfig> for RelayConfig {
    #[inline]
    fn as_ref(&self) -> &RelayConfig {
        self
    }
}

/// Log the configuration
pub fn log_config(config: &RelayConfig) {
    use log::info;

    if !log::log_enabled!(log::Level::Info) {
        return;
    }

    info!("=== Relay Configuration ===");
    info!("  Listen address: {}", config.listen);
    info!("  TCP_NODELAY: {}", config.tcp_nodelay);
    match config.keepalive() {
        Some(idle) => info!("  TCP keepalive: {}s", idle.as_secs()),
        None => info!("  TCP keepalive: disabled"),
    }
    info!("  Log level: {}", config.log_level);
    info!("  Buffer size: {} bytes", config.buffer_size);
    info!("  Max handshake token: {} bytes", config.max_token_len);
    match config.pairing_timeout() {
        Some(timeout) => info!("  Pairing timeout: {}s", timeout.as_secs()),
        None => info!("  Pairing timeout: none"),
    }
    info!("===========================");
}
