//! Default configuration values
//!
//! Single source of truth for defaults, shared by serde, the loader and the CLI.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Environment variable prefix for all configuration options
pub const ENV_PREFIX: &str = "RENDEZVOUS_RELAY";

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "relay.json";

/// Default listen port
pub const LISTEN_PORT: u16 = 2320;

/// Default log level as string
pub const LOG_LEVEL_STR: &str = "info";

/// Default listen address
pub fn listen() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), LISTEN_PORT)
}

/// Default log level
pub fn log_level() -> String {
    LOG_LEVEL_STR.to_string()
}

/// Default forwarding buffer size (4KB)
pub fn buffer_size() -> usize {
    4096
}

/// Default upper bound for a handshake token, delimiter included
pub fn max_token_len() -> usize {
    1024
}

/// Default pairing timeout in seconds (0 = wait forever)
pub fn pairing_timeout() -> u64 {
    0
}

/// Default TCP_NODELAY setting
pub fn tcp_nodelay() -> bool {
    true
}

/// Default TCP keepalive idle time in seconds (0 = disabled)
pub fn keepalive_secs() -> u64 {
    0
}
