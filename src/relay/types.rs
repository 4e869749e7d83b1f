//! Shared relay types
//!
//! Identifiers, roles and the connection abstraction used by every stage
//! of a pairing.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::common::RelayError;

/// Any bidirectional byte stream the relay can pair
///
/// Implemented for everything that is readable, writable and can be shared
/// between tasks, so `TcpStream` and in-memory duplex streams both qualify.
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static {}

impl<T> Connection for T where T: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static {}

/// Client supplied pairing identifier
///
/// Opaque bytes compared exactly; never interpreted as text except for logging.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(Bytes);

impl ConnId {
    /// Create an identifier from raw bytes
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Raw identifier bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ConnId {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<Vec<u8>> for ConnId {
    fn from(v: Vec<u8>) -> Self {
        Self(Bytes::from(v))
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnId({:?})", String::from_utf8_lossy(&self.0))
    }
}

/// Which side of a pairing a connection plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Sends the bytes that get forwarded
    Source,
    /// Receives the forwarded bytes
    Destination,
}

impl Role {
    /// Canonical wire token
    pub const SOURCE_TOKEN: &'static [u8] = b"source";
    pub const DESTINATION_TOKEN: &'static [u8] = b"destination";

    /// Short forms accepted in place of the canonical tokens
    const SOURCE_ALIAS: &'static [u8] = b"src";
    const DESTINATION_ALIAS: &'static [u8] = b"dst";

    /// Parse a role token (delimiter already stripped)
    pub fn from_token(token: &[u8]) -> Option<Self> {
        match token {
            t if t == Self::SOURCE_TOKEN || t == Self::SOURCE_ALIAS => Some(Self::Source),
            t if t == Self::DESTINATION_TOKEN || t == Self::DESTINATION_ALIAS => Some(Self::Destination),
            _ => None,
        }
    }

    /// The other role of the pairing
    pub fn peer(self) -> Self {
        match self {
            Self::Source => Self::Destination,
            Self::Destination => Self::Source,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Destination => write!(f, "destination"),
        }
    }
}

impl FromStr for Role {
    type Err = RelayError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_token(s.as_bytes()).ok_or_else(|| RelayError::MalformedHandshake(format!(
            "Invalid role: {}. Valid values are: source, destination",
            s
        )))
    }
}

/// Registry-assigned ticket identifying one registered leg
///
/// Lets a task act on "its" slot without touching a later occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LegId(pub(crate) u64);

impl fmt::Display for LegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_tokens() {
        assert_eq!(Role::from_token(b"source"), Some(Role::Source));
        assert_eq!(Role::from_token(b"src"), Some(Role::Source));
        assert_eq!(Role::from_token(b"destination"), Some(Role::Destination));
        assert_eq!(Role::from_token(b"dst"), Some(Role::Destination));
        assert_eq!(Role::from_token(b"Source"), None);
        assert_eq!(Role::from_token(b"source\r"), None);
        assert_eq!(Role::from_token(b""), None);
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("destination".parse::<Role>().unwrap(), Role::Destination);
        assert!("sink".parse::<Role>().is_err());
        assert_eq!(Role::Source.peer(), Role::Destination);
    }

    #[test]
    fn test_conn_id_exact_bytes() {
        let a = ConnId::from("room1");
        let b = ConnId::from(b"room1".to_vec());
        let c = ConnId::from("room1 ");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "room1");

        let binary = ConnId::from(vec![0xff, 0x00, 0x41]);
        assert_eq!(binary.len(), 3);
        assert_eq!(binary.as_bytes(), &[0xff, 0x00, 0x41]);
    }
}
