//! Rendezvous Relay command line tool
//!
//! This binary is the command-line interface for the rendezvous relay.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::info;

use rendezvous_relay::{Relay, Registry, VERSION, APP_NAME};
use rendezvous_relay::common::{Result, init_logger, parse_socket_addr};
use rendezvous_relay::config::{
    ConfigLoader, ConfigMerger, ConfigOverrides, ConfigValidator, RelayConfig, log_config,
};

/// Rendezvous Relay: pair source and destination connections by identifier
#[derive(Parser, Debug)]
#[clap(author, version = VERSION, about, long_about = None)]
struct Args {
    /// Configuration file (JSON). Defaults to relay.json when present
    #[clap(short, long, env = "RENDEZVOUS_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address
    #[clap(short, long)]
    listen: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[clap(long)]
    log_level: Option<String>,

    /// Forwarding buffer size in bytes
    #[clap(long)]
    buffer_size: Option<usize>,

    /// Maximum handshake token length in bytes, newline included
    #[clap(long)]
    max_token_len: Option<usize>,

    /// Seconds a leg may wait for its peer (0 waits forever)
    #[clap(long)]
    pairing_timeout: Option<u64>,

    /// Enable or disable TCP_NODELAY on accepted connections
    #[clap(long)]
    tcp_nodelay: Option<bool>,

    /// TCP keepalive idle time in seconds (0 disables keepalive)
    #[clap(long)]
    keepalive_secs: Option<u64>,

    /// Print the effective configuration as JSON and exit
    #[clap(long)]
    print_config: bool,
}

impl Args {
    fn overrides(&self) -> Result<ConfigOverrides> {
        Ok(ConfigOverrides {
            listen: self.listen.as_deref().map(parse_socket_addr).transpose()?,
            log_level: self.log_level.clone(),
            buffer_size: self.buffer_size,
            max_token_len: self.max_token_len,
            pairing_timeout: self.pairing_timeout,
            tcp_nodelay: self.tcp_nodelay,
            keepalive_secs: self.keepalive_secs,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Defaults < file < environment < command line
    let config = RelayConfig::load(args.config.as_deref())?.merge(&args.overrides()?);

    if args.print_config {
        println!("{}", config.to_json()?);
        return Ok(());
    }

    init_logger(&config.log_level);
    info!("Starting {} v{}", APP_NAME, VERSION);

    config.validate()?;
    log_config(&config);

    let relay = Relay::bind(Arc::new(config), Arc::new(Registry::new())).await?;

    info!("Relay ready, press Ctrl+C to stop");
    relay.run().await
}
