//! Rendezvous Relay: pair two TCP connections by a shared identifier
//!
//! Two clients connect independently, each sending an identifier line and a
//! role line (`source` or `destination`). Once both roles of an identifier
//! are present, every byte the source sends is forwarded to the destination
//! until either side disconnects, at which point both are closed.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rendezvous_relay::{Relay, Registry, Result};
//! use rendezvous_relay::config::RelayConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Arc::new(RelayConfig::default());
//!     let registry = Arc::new(Registry::new());
//!
//!     let relay = Relay::bind(config, registry).await?;
//!     relay.run().await
//! }
//! ```

// Public modules
pub mod common;
pub mod config;
pub mod relay;

// Re-export commonly used structures and functions for convenience
pub use common::{RelayError, Result, parse_socket_addr};
pub use relay::{ConnId, Registry, Relay, Role};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
