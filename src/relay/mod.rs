//! Relay module
//!
//! Pairs connections that share an identifier and forwards bytes from the
//! source leg to the destination leg.
//!
//! Control flow per connection: the server accepts it, the handshake reads
//! identifier and role and registers it, and the handshake that completes
//! a pairing spawns one forwarder and one peer monitor for it. All pairing
//! state lives in the [`Registry`].

mod forwarder;
mod handshake;
mod monitor;
mod registry;
mod server;
mod types;

#[cfg(test)]
mod testing;

pub use forwarder::{spawn_pairing, ForwardReport, LegEnd, PairingTasks};
pub use handshake::{handle_connection, read_token, Leg, Outcome, ACK, DELIMITER};
pub use registry::{Attached, Pairing, Registry, SlotState, SlotView, Snapshot};
pub use server::{Relay, TcpRegistry};
pub use types::{ConnId, Connection, LegId, Role};
