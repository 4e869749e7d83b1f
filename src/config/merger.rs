//! Configuration merging functionality
//!
//! Command-line arguments are applied last, on top of whatever the file
//! and environment produced.

use std::net::SocketAddr;

use super::RelayConfig;

/// Values given explicitly on the command line
///
/// `None` means "not given", so the lower-priority value is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub listen: Option<SocketAddr>,
    pub log_level: Option<String>,
    pub buffer_size: Option<usize>,
    pub max_token_len: Option<usize>,
    pub pairing_timeout: Option<u64>,
    pub tcp_nodelay: Option<bool>,
    pub keepalive_secs: Option<u64>,
}

/// Trait for merging configurations
pub trait ConfigMerger {
    /// Merge explicit overrides into this configuration
    ///
    /// Values from `overrides` win over values in `self` whenever they are set.
    fn merge(&self, overrides: &ConfigOverrides) -> Self where Self: Sized;
}

impl ConfigMerger for RelayConfig {
    fn merge(&self, overrides: &ConfigOverrides) -> Self {
        fn pick<T: Clone>(current: &T, other: &Option<T>) -> T {
            other.clone().unwrap_or_else(|| current.clone())
        }

        Self {
            listen: pick(&self.listen, &overrides.listen),
            tcp_nodelay: pick(&self.tcp_nodelay, &overrides.tcp_nodelay),
            keepalive_secs: pick(&self.keepalive_secs, &overrides.keepalive_secs),
            log_level: pick(&self.log_level, &overrides.log_level),
            buffer_size: pick(&self.buffer_size, &overrides.buffer_size),
            max_token_len: pick(&self.max_token_len, &overrides.max_token_len),
            pairing_timeout: pick(&self.pairing_timeout, &overrides.pairing_timeout),
        }
    }
}
