//! Configuration errors
//!
//! This module defines error types for the configuration module.

use std::fmt;
use std::error::Error;
use std::path::PathBuf;

/// Configuration error type
#[derive(Debug)]
pub enum ConfigError {
    /// File not found
    FileNotFound(PathBuf),

    /// Error parsing configuration
    ParseError(String),

    /// Invalid value for configuration option
    InvalidValue(String, String),

    /// Other error
    Other(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) =>
                write!(f, "Configuration file not found: {}", path.display()),

            ConfigError::ParseError(msg) =>
                write!(f, "Error parsing configuration: {}", msg),

            ConfigError::InvalidValue(name, msg) =>
                write!(f, "Invalid value for '{}': {}", name, msg),

            ConfigError::Other(msg) =>
                write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for ConfigError {}

/// Result type alias for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<::config::ConfigError> for ConfigError {
    fn from(err: ::config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<std::net::AddrParseError> for ConfigError {
    fn from(err: std::net::AddrParseError) -> Self {
        ConfigError::ParseError(format!("Invalid socket address: {}", err))
    }
}

// Convert to crate's common error type
impl From<ConfigError> for crate::common::RelayError {
    fn from(err: ConfigError) -> Self {
        crate::common::RelayError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::RelayError;

    #[test]
    fn test_into_relay_error() {
        let err: RelayError = ConfigError::InvalidValue(
            "buffer_size".to_string(),
            "must be greater than 0".to_string(),
        ).into();

        match err {
            RelayError::Config(msg) => {
                assert!(msg.contains("buffer_size"));
                assert!(msg.contains("greater than 0"));
            }
            other => panic!("Unexpected error: {other}"),
        }
    }
}
