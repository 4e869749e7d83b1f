//! Configuration loading functionality
//!
//! Layers defaults, an optional JSON file and `RENDEZVOUS_RELAY_*`
//! environment variables using the `config` crate.

use std::path::{Path, PathBuf};
use log::{debug, info, warn};
use ::config::{Config, Environment, File, FileFormat};

use super::defaults::{DEFAULT_CONFIG_FILE, ENV_PREFIX};
use super::error::{ConfigError, Result};
use super::RelayConfig;

/// Trait for loading configuration from different sources
pub trait ConfigLoader {
    /// Load configuration from a file only (defaults fill the gaps)
    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> where Self: Sized;

    /// Load configuration from environment variables only
    fn from_env() -> Result<Self> where Self: Sized;

    /// Load configuration with priority defaults < file < environment
    ///
    /// When `path` is `None` the default file is used if it exists.
    fn load(path: Option<&Path>) -> Result<Self> where Self: Sized;
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .try_parsing(true)
}

/// Deserialize the layered sources
///
/// Values are not validated here: command-line overrides are merged later
/// and may still fix them.
fn build(builder: ::config::ConfigBuilder<::config::builder::DefaultState>) -> Result<RelayConfig> {
    Ok(builder.build()?.try_deserialize()?)
}

impl ConfigLoader for RelayConfig {
    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        debug!("Loading configuration from file: {}", path.display());
        build(Config::builder()
            .add_source(File::from(path).format(FileFormat::Json)))
    }

    fn from_env() -> Result<Self> {
        debug!("Loading configuration from environment with prefix {}", ENV_PREFIX);
        build(Config::builder().add_source(env_source()))
    }

    fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::FileNotFound(path.to_path_buf()));
                }
                info!("Loading configuration from {}", path.display());
                Some(path.to_path_buf())
            }
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    info!("Loading configuration from {}", default.display());
                    Some(default)
                } else {
                    debug!("No configuration file found, using defaults");
                    None
                }
            }
        };

        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Json));
        }
        let builder = builder.add_source(env_source());

        build(builder).map_err(|e| {
            warn!("Failed to load configuration: {}", e);
            e
        })
    }
}
