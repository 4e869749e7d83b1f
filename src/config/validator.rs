//! Configuration validator
//!
//! This module provides functionality for validating configuration.

use log::warn;

use super::error::{ConfigError, Result};
use super::RelayConfig;

/// Configuration validator trait
pub trait ConfigValidator {
    /// Validate configuration, failing on values the relay cannot run with
    fn validate(&self) -> Result<()>;

    /// Check configuration for suspicious but usable values
    fn check_warnings(&self) -> Vec<String>;
}

impl ConfigValidator for RelayConfig {
    fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(ConfigError::InvalidValue(
                "buffer_size".to_string(),
                "Buffer size must be greater than 0".to_string()
            ));
        }

        // The token must at least fit its own delimiter plus one byte
        if self.max_token_len < 2 {
            return Err(ConfigError::InvalidValue(
                "max_token_len".to_string(),
                "Maximum token length must be at least 2".to_string()
            ));
        }

        for warning in self.check_warnings() {
            warn!("{}", warning);
        }

        Ok(())
    }

    fn check_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        match self.log_level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            level => warnings.push(format!("Unknown log level '{}', env_logger may ignore it", level)),
        }

        if self.buffer_size < 1024 {
            warnings.push(format!(
                "Buffer size of {} bytes is small and will cost extra syscalls per forwarded chunk",
                self.buffer_size
            ));
        }

        if self.max_token_len > 64 * 1024 {
            warnings.push(format!(
                "Maximum token length of {} bytes lets idle clients pin a lot of memory",
                self.max_token_len
            ));
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.check_warnings().is_empty());
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let config = RelayConfig {
            buffer_size: 0,
            ..RelayConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(name, _)) if name == "buffer_size"));
    }

    #[test]
    fn test_tiny_token_rejected() {
        let config = RelayConfig {
            max_token_len: 1,
            ..RelayConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_warnings() {
        let config = RelayConfig {
            log_level: "chatty".to_string(),
            buffer_size: 128,
            ..RelayConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.check_warnings().len(), 2);
    }
}
