//! Connection handshake
//!
//! Drives the line-based protocol for one freshly accepted connection:
//!
//! ```text
//! client -> relay   <identifier>\n
//! client -> relay   source\n | destination\n
//! relay  -> client  ok
//! ```
//!
//! after which the connection is either parked until its peer arrives or,
//! if the peer is already there, handed to a forwarder and a monitor.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

use crate::common::{RelayError, Result};
use crate::config::RelayConfig;
use super::forwarder::{spawn_pairing, PairingTasks};
use super::registry::{Attached, Registry};
use super::types::{ConnId, Connection, LegId, Role};

/// Line delimiter of the handshake protocol
pub const DELIMITER: u8 = b'\n';

/// Acknowledgement sent after a successful role registration
pub const ACK: &[u8] = b"ok";

/// A connection after its handshake
///
/// The read buffer travels with the connection, so bytes a client sent
/// right behind its role line are forwarded rather than lost.
pub type Leg<S> = BufReader<S>;

/// What became of a connection whose handshake succeeded
#[derive(Debug)]
pub enum Outcome {
    /// Parked in the registry until the peer arrives
    Waiting {
        id: ConnId,
        role: Role,
        leg: LegId,
    },
    /// Completed a pairing; forwarder and monitor are running
    Paired {
        id: ConnId,
        tasks: PairingTasks,
    },
}

/// Handle a single accepted connection
///
/// Any error aborts the handshake; the connection is dropped, and with it
/// closed, before this function returns. Errors never affect other
/// connections or pairings.
///
/// # Parameters
///
/// * `stream` - Accepted connection
/// * `registry` - Registry shared by all connections
/// * `config` - Relay configuration
pub async fn handle_connection<S: Connection>(
    stream: S,
    registry: Arc<Registry<Leg<S>>>,
    config: Arc<RelayConfig>,
) -> Result<Outcome> {
    let mut conn = BufReader::with_capacity(config.buffer_size.max(config.max_token_len), stream);

    let id = ConnId::from(read_token(&mut conn, config.max_token_len, "identifier").await?);
    if id.is_empty() {
        return Err(RelayError::MalformedHandshake("empty identifier".to_string()));
    }

    if registry.ensure(&id) {
        debug!("Pairing {} already has both legs, registration will be refused", id);
    }

    let role = match read_role(&mut conn, config.max_token_len).await {
        Ok(role) => role,
        Err(e) => {
            registry.abandon(&id);
            return Err(e);
        }
    };

    let leg = match registry.register_role(&id, role) {
        Ok(leg) => leg,
        Err(e) => {
            warn!("Rejected {} registration for {}: {}", role, id, e);
            return Err(e);
        }
    };
    info!("Registered {} leg {} for {}", role, leg, id);

    // Best effort: the slot is claimed either way, a dead peer is noticed
    // by the forwarder or monitor later on.
    if let Err(e) = acknowledge(&mut conn).await {
        warn!("Failed to acknowledge {} leg of {}: {}", role, id, e);
    }

    match registry.attach(&id, role, leg, conn)? {
        Attached::Waiting => {
            debug!("{} leg of {} waiting for its peer", role, id);
            if let Some(timeout) = config.pairing_timeout() {
                spawn_pairing_timeout(Arc::clone(&registry), id.clone(), role, leg, timeout);
            }
            Ok(Outcome::Waiting { id, role, leg })
        }
        Attached::Paired(pairing) => {
            let tasks = spawn_pairing(registry, pairing, config.buffer_size);
            Ok(Outcome::Paired { id, tasks })
        }
    }
}

/// Read one delimiter-terminated token of at most `limit` bytes
///
/// The delimiter is counted against `limit` and stripped from the result.
pub async fn read_token<R>(reader: &mut R, limit: usize, what: &str) -> Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut token = Vec::new();
    let mut limited = (&mut *reader).take(limit as u64);
    let n = limited.read_until(DELIMITER, &mut token).await?;

    if token.last() == Some(&DELIMITER) {
        token.pop();
        return Ok(token);
    }

    let reason = if n == 0 {
        format!("connection closed before {}", what)
    } else if n >= limit {
        format!("{} longer than {} bytes", what, limit)
    } else {
        format!("connection closed in the middle of {}", what)
    };
    Err(RelayError::MalformedHandshake(reason))
}

async fn read_role<R>(reader: &mut R, limit: usize) -> Result<Role>
where
    R: AsyncBufRead + Unpin,
{
    let token = read_token(reader, limit, "role").await?;
    Role::from_token(&token).ok_or_else(|| {
        RelayError::MalformedHandshake(format!(
            "unrecognized role {:?}",
            String::from_utf8_lossy(&token)
        ))
    })
}

async fn acknowledge<W>(writer: &mut W) -> std::io::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    writer.write_all(ACK).await?;
    writer.flush().await
}

/// Close a leg that is still alone once `timeout` has passed
fn spawn_pairing_timeout<S: Connection>(
    registry: Arc<Registry<Leg<S>>>,
    id: ConnId,
    role: Role,
    leg: LegId,
    timeout: Duration,
) {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        if let Some(conn) = registry.evict(&id, role, leg) {
            info!("{} leg {} of {} gave up waiting after {}s", role, leg, id, timeout.as_secs());
            drop(conn);
        }
    });
}
