//! Network utility functions
//!
//! This module provides utility functions for network operations.

use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

use log::debug;
use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;

use super::error::{RelayError, Result};

/// Parse a socket address
///
/// # Arguments
///
/// * `addr` - The address string to parse
///
/// # Returns
///
/// The parsed `SocketAddr`
pub fn parse_socket_addr(addr: &str) -> Result<SocketAddr> {
    // Try direct parsing first
    if let Ok(socket_addr) = SocketAddr::from_str(addr) {
        return Ok(socket_addr);
    }

    // Try using ToSocketAddrs trait
    match addr.to_socket_addrs() {
        Ok(mut addrs) => {
            if let Some(addr) = addrs.next() {
                Ok(addr)
            } else {
                Err(RelayError::Config(format!("Failed to parse address: {}", addr)))
            }
        }
        Err(e) => Err(RelayError::Config(format!("Failed to parse address {}: {}", addr, e))),
    }
}

/// Apply socket options to an accepted connection
///
/// # Arguments
///
/// * `stream` - Accepted TCP stream
/// * `nodelay` - Whether to disable Nagle's algorithm
/// * `keepalive` - TCP keepalive idle time, `None` leaves keepalive off
pub fn tune_stream(stream: &TcpStream, nodelay: bool, keepalive: Option<Duration>) -> Result<()> {
    stream.set_nodelay(nodelay)?;

    if let Some(idle) = keepalive {
        let params = TcpKeepalive::new()
            .with_time(idle)
            .with_interval(idle);
        SockRef::from(stream).set_tcp_keepalive(&params)?;
        debug!("TCP keepalive enabled ({}s)", idle.as_secs());
    }

    Ok(())
}
