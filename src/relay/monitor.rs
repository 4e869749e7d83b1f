//! Peer monitor
//!
//! The destination leg never carries traffic towards the relay, so nothing
//! would notice it closing. The monitor sits on a read of that leg and
//! retires the pairing when it ends.

use std::sync::Arc;

use log::{debug, info, trace, warn};
use tokio::io::{AsyncReadExt, ReadHalf};

use super::forwarder::{LegEnd, PairingLegs, Teardown};
use super::registry::Registry;
use super::types::Connection;

/// Scratch space for bytes the destination sends; they are discarded.
const DISCARD_BUFFER_SIZE: usize = 512;

/// Watch the destination leg until it closes or the forwarder tears down
pub(crate) async fn monitor_destination<H: Connection>(
    registry: Arc<Registry<H>>,
    legs: PairingLegs,
    mut destination: ReadHalf<H>,
    mut teardown: Teardown,
) -> LegEnd {
    let mut discard = [0u8; DISCARD_BUFFER_SIZE];

    let end = loop {
        tokio::select! {
            read = destination.read(&mut discard) => match read {
                Ok(0) => break LegEnd::PeerClosed,
                Ok(n) => trace!("Discarded {} bytes from destination of {}", n, legs.id),
                Err(e) => break LegEnd::ReadFailed(e),
            },
            _ = teardown.triggered() => break LegEnd::TornDown,
        }
    };

    match &end {
        LegEnd::PeerClosed => info!("Destination leg of {} closed cleanly", legs.id),
        LegEnd::ReadFailed(e) => warn!("Destination leg of {} closed with error: {}", legs.id, e),
        _ => debug!("Monitor for {} stopped by forwarder", legs.id),
    }

    legs.release(&*registry);
    teardown.trigger();

    // The forwarder shuts the write side down; dropping this half lets the
    // stream close once both halves are gone.
    drop(destination);
    end
}
