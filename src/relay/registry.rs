//! Pairing registry
//!
//! The registry is the single source of truth for pairing state. Every
//! lifecycle transition of a pairing record happens inside one of its
//! methods, while holding the map entry for the identifier.
//!
//! A slot goes through three states:
//!
//! - `Reserved`: `register_role` claimed it; the handshake still owns the
//!   connection (it is writing the acknowledgement).
//! - `Waiting`: `attach` parked the connection here until the peer arrives.
//! - `Active`: both connections were handed to a forwarder and a monitor;
//!   the slot stays occupied until one of those tasks releases it.
//!
//! A record is removed as soon as both slots are empty and no handshake
//! that called `ensure` is still pending on it.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use log::{debug, info};

use crate::common::{RelayError, Result};
use super::types::{ConnId, LegId, Role};

/// One role slot of a pairing record
enum Slot<H> {
    Reserved(LegId),
    Waiting(LegId, H),
    Active(LegId),
}

impl<H> Slot<H> {
    fn leg(&self) -> LegId {
        match self {
            Slot::Reserved(leg) | Slot::Waiting(leg, _) | Slot::Active(leg) => *leg,
        }
    }

    fn view(&self) -> SlotView {
        let state = match self {
            Slot::Reserved(_) => SlotState::Reserved,
            Slot::Waiting(..) => SlotState::Waiting,
            Slot::Active(_) => SlotState::Active,
        };
        SlotView { leg: self.leg(), state }
    }
}

struct PairingRecord<H> {
    source: Option<Slot<H>>,
    destination: Option<Slot<H>>,
    /// Handshakes that called `ensure` and have not registered or abandoned yet
    pending: usize,
}

impl<H> PairingRecord<H> {
    fn new() -> Self {
        Self { source: None, destination: None, pending: 0 }
    }

    fn slot_mut(&mut self, role: Role) -> &mut Option<Slot<H>> {
        match role {
            Role::Source => &mut self.source,
            Role::Destination => &mut self.destination,
        }
    }

    /// Empty the `role` slot if `leg` holds it
    fn take_leg(&mut self, role: Role, leg: LegId) -> Option<Slot<H>> {
        let slot = self.slot_mut(role);
        if slot.as_ref().map(Slot::leg) == Some(leg) {
            slot.take()
        } else {
            None
        }
    }

    fn is_complete(&self) -> bool {
        self.source.is_some() && self.destination.is_some()
    }

    fn is_idle(&self) -> bool {
        self.source.is_none() && self.destination.is_none() && self.pending == 0
    }
}

/// Lifecycle state of an occupied slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Claimed by a handshake that still owns its connection
    Reserved,
    /// Connection parked, waiting for the peer
    Waiting,
    /// Connection handed to a forwarder or monitor
    Active,
}

/// Point-in-time view of one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotView {
    pub leg: LegId,
    pub state: SlotState,
}

/// Consistent view of both slots of a record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub source: Option<SlotView>,
    pub destination: Option<SlotView>,
}

impl Snapshot {
    /// Both slots occupied
    pub fn is_complete(&self) -> bool {
        self.source.is_some() && self.destination.is_some()
    }

    /// Neither slot occupied
    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.destination.is_none()
    }

    pub fn get(&self, role: Role) -> Option<SlotView> {
        match role {
            Role::Source => self.source,
            Role::Destination => self.destination,
        }
    }
}

/// Both legs of a pairing that just became active
///
/// Produced exactly once per record lifetime, by the `attach` call that
/// parked the second connection.
pub struct Pairing<H> {
    pub id: ConnId,
    pub source: H,
    pub source_leg: LegId,
    pub destination: H,
    pub destination_leg: LegId,
}

impl<H> std::fmt::Debug for Pairing<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pairing")
            .field("id", &self.id)
            .field("source_leg", &self.source_leg)
            .field("destination_leg", &self.destination_leg)
            .finish()
    }
}

/// Outcome of parking a connection in its reserved slot
#[derive(Debug)]
pub enum Attached<H> {
    /// The peer has not arrived yet; the registry now owns the connection
    Waiting,
    /// Both legs are present and were handed back to the caller
    Paired(Pairing<H>),
}

/// Concurrency-safe store of pairing records
///
/// Generic over the connection handle type so it can be shared between
/// tasks behind an `Arc` and exercised without sockets.
pub struct Registry<H> {
    records: DashMap<ConnId, PairingRecord<H>>,
    next_leg: AtomicU64,
    completed: AtomicU64,
}

impl<H> Default for Registry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Registry<H> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            next_leg: AtomicU64::new(1),
            completed: AtomicU64::new(0),
        }
    }

    /// Remove the record for `id` if nothing holds it any more
    ///
    /// Must not be called while an entry guard for `id` is alive.
    fn remove_if_idle(&self, id: &ConnId) -> bool {
        let removed = self.records.remove_if(id, |_, record| record.is_idle()).is_some();
        if removed {
            debug!("Pairing record for {} removed", id);
        }
        removed
    }

    /// Create the record for `id` if it does not exist yet
    ///
    /// Marks one handshake as pending on the record, which keeps it alive
    /// until that handshake calls `register_role` or `abandon`.
    ///
    /// # Returns
    ///
    /// Whether both slots of the record are occupied after the call.
    pub fn ensure(&self, id: &ConnId) -> bool {
        let mut record = self.records.entry(id.clone()).or_insert_with(|| {
            debug!("Pairing record created for {}", id);
            PairingRecord::new()
        });
        record.pending += 1;
        record.is_complete()
    }

    /// Drop a pending handshake that never reached `register_role`
    ///
    /// Removes the record if nothing else holds it.
    pub fn abandon(&self, id: &ConnId) {
        match self.records.get_mut(id) {
            Some(mut record) => record.pending = record.pending.saturating_sub(1),
            None => return,
        }
        self.remove_if_idle(id);
    }

    /// Claim the `role` slot of `id`
    ///
    /// At most one caller observes the slot as free; every other caller
    /// gets `SlotOccupied` and the existing occupant is left untouched.
    /// Consumes the pending mark left by `ensure` either way.
    ///
    /// # Returns
    ///
    /// The ticket of the new leg, to be passed to `attach`.
    pub fn register_role(&self, id: &ConnId, role: Role) -> Result<LegId> {
        {
            let mut record = self
                .records
                .get_mut(id)
                .ok_or_else(|| RelayError::UnknownIdentifier(id.clone()))?;
            record.pending = record.pending.saturating_sub(1);

            let slot = record.slot_mut(role);
            if slot.is_none() {
                let leg = LegId(self.next_leg.fetch_add(1, Ordering::Relaxed));
                *slot = Some(Slot::Reserved(leg));
                return Ok(leg);
            }
        }

        self.remove_if_idle(id);
        Err(RelayError::SlotOccupied { id: id.clone(), role })
    }

    /// Park `handle` in the slot previously reserved for `leg`
    ///
    /// If the peer slot is already parked, both connections are taken out,
    /// the slots turn `Active` and the pairing is returned. This is the only
    /// place a pairing is completed, so it happens once per record lifetime.
    pub fn attach(&self, id: &ConnId, role: Role, leg: LegId, handle: H) -> Result<Attached<H>> {
        let mut entry = self
            .records
            .get_mut(id)
            .ok_or_else(|| RelayError::UnknownIdentifier(id.clone()))?;
        let record = &mut *entry;

        match record.slot_mut(role) {
            Some(Slot::Reserved(reserved)) if *reserved == leg => {}
            _ => {
                return Err(RelayError::Other(format!(
                    "{} slot of {} is not reserved for leg {}",
                    role, id, leg
                )));
            }
        }

        let peer_slot = record.slot_mut(role.peer());
        let (peer_leg, peer_handle) = match peer_slot.take() {
            Some(Slot::Waiting(peer_leg, peer_handle)) => (peer_leg, peer_handle),
            other => {
                *peer_slot = other;
                *record.slot_mut(role) = Some(Slot::Waiting(leg, handle));
                return Ok(Attached::Waiting);
            }
        };

        *peer_slot = Some(Slot::Active(peer_leg));
        *record.slot_mut(role) = Some(Slot::Active(leg));
        self.completed.fetch_add(1, Ordering::Relaxed);

        let ((source, source_leg), (destination, destination_leg)) = match role {
            Role::Source => ((handle, leg), (peer_handle, peer_leg)),
            Role::Destination => ((peer_handle, peer_leg), (handle, leg)),
        };

        info!("Pairing {} active (source {}, destination {})", id, source_leg, destination_leg);

        Ok(Attached::Paired(Pairing {
            id: id.clone(),
            source,
            source_leg,
            destination,
            destination_leg,
        }))
    }

    /// Empty the `role` slot of `id`
    ///
    /// Idempotent. Removes the record once both slots are empty; a later
    /// handshake with the same identifier then starts from a fresh record.
    ///
    /// # Returns
    ///
    /// Whether a slot was actually cleared.
    pub fn clear_role(&self, id: &ConnId, role: Role) -> bool {
        let parked = match self.records.get_mut(id) {
            Some(mut record) => record.slot_mut(role).take(),
            None => return false,
        };
        self.remove_if_idle(id);
        // A parked connection (if any) is closed here, outside the entry guard.
        parked.is_some()
    }

    /// Empty the `role` slot of `id` only while it is held by `leg`
    ///
    /// A late call never clears a slot that a newer connection has claimed
    /// in the meantime.
    pub fn release(&self, id: &ConnId, role: Role, leg: LegId) -> bool {
        let parked = match self.records.get_mut(id) {
            Some(mut record) => record.take_leg(role, leg),
            None => return false,
        };
        self.remove_if_idle(id);
        parked.is_some()
    }

    /// Empty both slots of a pairing in one step
    ///
    /// Each slot is only cleared while it still belongs to the given leg,
    /// so a newcomer can never observe one slot freed and the other still
    /// held by the dead pairing.
    ///
    /// # Returns
    ///
    /// Whether at least one slot was cleared.
    pub fn release_pairing(&self, id: &ConnId, source_leg: LegId, destination_leg: LegId) -> bool {
        let (source, destination) = match self.records.get_mut(id) {
            Some(mut record) => (
                record.take_leg(Role::Source, source_leg),
                record.take_leg(Role::Destination, destination_leg),
            ),
            None => return false,
        };
        self.remove_if_idle(id);
        source.is_some() || destination.is_some()
    }

    /// Take back a connection that is still waiting for its peer
    ///
    /// Only succeeds while the slot is `Waiting` for exactly `leg`, so a
    /// late timeout never disturbs an active pairing or a newer occupant.
    pub fn evict(&self, id: &ConnId, role: Role, leg: LegId) -> Option<H> {
        let handle = {
            let mut record = self.records.get_mut(id)?;
            let slot = record.slot_mut(role);
            match slot.take() {
                Some(Slot::Waiting(waiting, handle)) if waiting == leg => handle,
                other => {
                    *slot = other;
                    return None;
                }
            }
        };

        self.remove_if_idle(id);
        Some(handle)
    }

    /// Consistent view of both slots of `id`
    ///
    /// Both slots are read under the same entry guard; an unknown
    /// identifier yields an empty snapshot.
    pub fn snapshot(&self, id: &ConnId) -> Snapshot {
        self.records
            .get(id)
            .map(|record| Snapshot {
                source: record.source.as_ref().map(Slot::view),
                destination: record.destination.as_ref().map(Slot::view),
            })
            .unwrap_or_default()
    }

    /// Whether a record for `id` exists
    pub fn contains(&self, id: &ConnId) -> bool {
        self.records.contains_key(id)
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of pairings that became active since the registry was created
    pub fn pairings_completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }
}
