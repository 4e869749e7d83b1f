//! Data forwarding module
//!
//! Once a pairing is active, the forwarder copies bytes from the source leg
//! to the destination leg until either side goes away. It shares a teardown
//! signal with the peer monitor so that whichever task notices the end
//! first takes the whole pairing down.

use std::io;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt, WriteHalf};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::monitor::monitor_destination;
use super::registry::{Pairing, Registry};
use super::types::{ConnId, Connection, LegId};

/// Why a pairing task stopped
#[derive(Debug)]
pub enum LegEnd {
    /// The leg this task reads from reached end-of-stream
    PeerClosed,
    /// Reading the leg failed
    ReadFailed(io::Error),
    /// Writing to the destination leg failed
    WriteFailed(io::Error),
    /// The other task of the pairing tore it down
    TornDown,
}

impl LegEnd {
    /// Whether the end was caused by a transport error
    pub fn is_error(&self) -> bool {
        matches!(self, Self::ReadFailed(_) | Self::WriteFailed(_))
    }
}

/// Final report of a forwarder task
#[derive(Debug)]
pub struct ForwardReport {
    pub end: LegEnd,
    /// Bytes delivered to the destination
    pub bytes: u64,
}

/// Join handles of the two tasks driving one pairing
#[derive(Debug)]
pub struct PairingTasks {
    pub forwarder: JoinHandle<ForwardReport>,
    pub monitor: JoinHandle<LegEnd>,
}

/// One-shot teardown signal shared by the forwarder and the monitor
#[derive(Debug, Clone)]
pub(crate) struct Teardown {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Teardown {
    pub(crate) fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub(crate) fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Resolves once `trigger` has been called by either task
    pub(crate) async fn triggered(&mut self) {
        // The sender lives as long as `self`, so this cannot fail.
        let _ = self.rx.wait_for(|down| *down).await;
    }
}

/// Identity of an active pairing, as seen by its tasks
#[derive(Debug, Clone)]
pub(crate) struct PairingLegs {
    pub(crate) id: ConnId,
    pub(crate) source: LegId,
    pub(crate) destination: LegId,
}

impl PairingLegs {
    /// Free both slots held by this pairing
    ///
    /// Slots that were already released, or that belong to a newer leg, are
    /// left alone, so both tasks may call this.
    pub(crate) fn release<H>(&self, registry: &Registry<H>) {
        if registry.release_pairing(&self.id, self.source, self.destination) {
            info!("Pairing {} torn down", self.id);
        }
    }
}

/// Start the forwarder and the peer monitor for a freshly completed pairing
///
/// # Parameters
///
/// * `registry` - Registry the pairing lives in
/// * `pairing` - Both legs, as returned by `Registry::attach`
/// * `buffer_size` - Size of the forwarding buffer
///
/// # Returns
///
/// Handles of the two spawned tasks. Dropping them detaches the tasks.
pub fn spawn_pairing<H: Connection>(
    registry: Arc<Registry<H>>,
    pairing: Pairing<H>,
    buffer_size: usize,
) -> PairingTasks {
    let Pairing { id, source, source_leg, destination, destination_leg } = pairing;
    let legs = PairingLegs { id, source: source_leg, destination: destination_leg };

    // The monitor only reads the destination, the forwarder only writes it
    let (destination_reader, destination_writer) = tokio::io::split(destination);
    let teardown = Teardown::new();

    debug!("Starting forwarder and monitor for {}", legs.id);

    let forwarder = tokio::spawn(forward(
        Arc::clone(&registry),
        legs.clone(),
        source,
        destination_writer,
        buffer_size,
        teardown.clone(),
    ));
    let monitor = tokio::spawn(monitor_destination(registry, legs, destination_reader, teardown));

    PairingTasks { forwarder, monitor }
}

/// Copy bytes from `source` to `destination` until the pairing ends
///
/// On exit, whatever the cause, both slots are released, the monitor is
/// signalled and both connections are shut down.
pub(crate) async fn forward<H: Connection>(
    registry: Arc<Registry<H>>,
    legs: PairingLegs,
    mut source: H,
    mut destination: WriteHalf<H>,
    buffer_size: usize,
    mut teardown: Teardown,
) -> ForwardReport {
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut total_bytes: u64 = 0;

    let end = loop {
        let n = tokio::select! {
            read = source.read(&mut buffer) => match read {
                Ok(0) => break LegEnd::PeerClosed,
                Ok(n) => n,
                Err(e) => break LegEnd::ReadFailed(e),
            },
            _ = teardown.triggered() => break LegEnd::TornDown,
        };

        let chunk = &buffer[..n];
        let written = tokio::select! {
            written = async {
                destination.write_all(chunk).await?;
                destination.flush().await
            } => written,
            _ = teardown.triggered() => break LegEnd::TornDown,
        };

        if let Err(e) = written {
            break LegEnd::WriteFailed(e);
        }
        total_bytes += n as u64;
    };

    match &end {
        LegEnd::PeerClosed => info!("Source leg of {} closed cleanly", legs.id),
        LegEnd::ReadFailed(e) => warn!("Source leg of {} closed with error: {}", legs.id, e),
        LegEnd::WriteFailed(e) => warn!("Destination leg of {} gone: {}", legs.id, e),
        LegEnd::TornDown => debug!("Forwarder for {} stopped by monitor", legs.id),
    }

    legs.release(&*registry);
    teardown.trigger();

    // Either connection may already be closed; a failed shutdown is fine here.
    let _ = destination.shutdown().await;
    let _ = source.shutdown().await;

    debug!("Source to destination transferred {} bytes total for {}", total_bytes, legs.id);

    ForwardReport { end, bytes: total_bytes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::registry::Attached;
    use crate::relay::testing::FaultyStream;
    use crate::relay::types::Role;
    use std::time::Duration;
    use tokio::io::{duplex, DuplexStream};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    /// Register both legs of `key` and start the pairing tasks
    fn pair<H: Connection>(registry: &Arc<Registry<H>>, key: &str, source: H, destination: H) -> PairingTasks {
        let id = ConnId::from(key);

        registry.ensure(&id);
        let leg = registry.register_role(&id, Role::Source).unwrap();
        registry.attach(&id, Role::Source, leg, source).unwrap();

        registry.ensure(&id);
        let leg = registry.register_role(&id, Role::Destination).unwrap();
        let pairing = match registry.attach(&id, Role::Destination, leg, destination).unwrap() {
            Attached::Paired(pairing) => pairing,
            Attached::Waiting => panic!("expected pairing"),
        };

        spawn_pairing(Arc::clone(registry), pairing, 16)
    }

    /// Pair two in-memory connections and return the client ends
    fn paired(registry: &Arc<Registry<DuplexStream>>, key: &str) -> (DuplexStream, DuplexStream, PairingTasks) {
        let (source_client, source_server) = duplex(1024);
        let (destination_client, destination_server) = duplex(1024);
        let tasks = pair(registry, key, source_server, destination_server);
        (source_client, destination_client, tasks)
    }

    #[tokio::test]
    async fn test_forwarding_preserves_order_across_chunks() {
        let registry = Arc::new(Registry::new());
        let (mut source, mut destination, tasks) = paired(&registry, "room1");

        let payload: Vec<u8> = (0..200u8).collect();
        let writer = tokio::spawn(async move {
            for chunk in payload.chunks(7) {
                source.write_all(chunk).await.unwrap();
            }
            source
        });

        let mut received = vec![0u8; 200];
        timeout(WAIT, destination.read_exact(&mut received)).await.unwrap().unwrap();
        assert_eq!(received, (0..200u8).collect::<Vec<_>>());

        drop(writer.await.unwrap());
        let report = timeout(WAIT, tasks.forwarder).await.unwrap().unwrap();
        assert!(matches!(report.end, LegEnd::PeerClosed));
        assert_eq!(report.bytes, 200);
    }

    #[tokio::test]
    async fn test_source_close_tears_down_both_legs() {
        let registry = Arc::new(Registry::new());
        let (source, mut destination, tasks) = paired(&registry, "room1");

        drop(source);

        // Destination sees end-of-stream and the record is already gone
        let mut buf = [0u8; 8];
        let n = timeout(WAIT, destination.read(&mut buf)).await.unwrap().unwrap();
        assert_eq!(n, 0);
        assert!(!registry.contains(&ConnId::from("room1")));

        drop(destination);
        let end = timeout(WAIT, tasks.monitor).await.unwrap().unwrap();
        assert!(!end.is_error());
    }

    #[tokio::test]
    async fn test_destination_close_stops_forwarder() {
        let registry = Arc::new(Registry::new());
        let (mut source, destination, tasks) = paired(&registry, "room1");

        drop(destination);

        let end = timeout(WAIT, tasks.monitor).await.unwrap().unwrap();
        assert!(matches!(end, LegEnd::PeerClosed));

        // The forwarder quits without the source ever sending a byte
        let report = timeout(WAIT, tasks.forwarder).await.unwrap().unwrap();
        assert!(matches!(report.end, LegEnd::TornDown));

        let mut buf = [0u8; 8];
        let n = timeout(WAIT, source.read(&mut buf)).await.unwrap().unwrap();
        assert_eq!(n, 0);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_identifier_reusable_after_teardown() {
        let registry = Arc::new(Registry::new());
        let (source, _destination, tasks) = paired(&registry, "room1");
        drop(source);
        timeout(WAIT, tasks.forwarder).await.unwrap().unwrap();
        timeout(WAIT, tasks.monitor).await.unwrap().unwrap();
        assert!(registry.is_empty());

        let (mut source, mut destination, _tasks) = paired(&registry, "room1");
        source.write_all(b"again").await.unwrap();
        let mut buf = [0u8; 5];
        timeout(WAIT, destination.read_exact(&mut buf)).await.unwrap().unwrap();
        assert_eq!(&buf, b"again");
        assert_eq!(registry.pairings_completed(), 2);
    }

    #[tokio::test]
    async fn test_destination_write_failure_tears_down_both_legs() {
        let registry = Arc::new(Registry::new());
        let (mut source, source_server) = duplex(1024);
        let (_destination, destination_server) = duplex(1024);
        let tasks = pair(
            &registry,
            "room1",
            FaultyStream::healthy(source_server),
            FaultyStream::failing_writes(destination_server),
        );

        source.write_all(b"lost").await.unwrap();

        let report = timeout(WAIT, tasks.forwarder).await.unwrap().unwrap();
        assert!(matches!(report.end, LegEnd::WriteFailed(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
        assert_eq!(report.bytes, 0);

        let end = timeout(WAIT, tasks.monitor).await.unwrap().unwrap();
        assert!(matches!(end, LegEnd::TornDown));
        assert!(registry.is_empty());

        // The source is closed too
        let mut buf = [0u8; 8];
        let n = timeout(WAIT, source.read(&mut buf)).await.unwrap().unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_source_read_error_tears_down_both_legs() {
        let registry = Arc::new(Registry::new());
        let (_source, source_server) = duplex(1024);
        let (mut destination, destination_server) = duplex(1024);
        let tasks = pair(
            &registry,
            "room1",
            FaultyStream::failing_reads(source_server),
            FaultyStream::healthy(destination_server),
        );

        let report = timeout(WAIT, tasks.forwarder).await.unwrap().unwrap();
        assert!(report.end.is_error());
        assert!(matches!(report.end, LegEnd::ReadFailed(ref e) if e.kind() == io::ErrorKind::ConnectionReset));

        let end = timeout(WAIT, tasks.monitor).await.unwrap().unwrap();
        assert!(matches!(end, LegEnd::TornDown));
        assert!(registry.is_empty());

        let mut buf = [0u8; 8];
        let n = timeout(WAIT, destination.read(&mut buf)).await.unwrap().unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_destination_read_error_stops_forwarder() {
        let registry = Arc::new(Registry::new());
        let (mut source, source_server) = duplex(1024);
        let (_destination, destination_server) = duplex(1024);
        let tasks = pair(
            &registry,
            "room1",
            FaultyStream::healthy(source_server),
            FaultyStream::failing_reads(destination_server),
        );

        let end = timeout(WAIT, tasks.monitor).await.unwrap().unwrap();
        assert!(end.is_error());
        assert!(matches!(end, LegEnd::ReadFailed(_)));

        let report = timeout(WAIT, tasks.forwarder).await.unwrap().unwrap();
        assert!(matches!(report.end, LegEnd::TornDown));
        assert!(registry.is_empty());

        let mut buf = [0u8; 8];
        let n = timeout(WAIT, source.read(&mut buf)).await.unwrap().unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn test_release_frees_both_slots_at_once() {
        let registry: Registry<()> = Registry::new();
        let id = ConnId::from("room1");
        registry.ensure(&id);
        let source = registry.register_role(&id, Role::Source).unwrap();
        registry.ensure(&id);
        let destination = registry.register_role(&id, Role::Destination).unwrap();
        let legs = PairingLegs { id: id.clone(), source, destination };

        legs.release(&registry);
        assert!(!registry.contains(&id));

        // A new destination is accepted right away
        registry.ensure(&id);
        assert!(registry.register_role(&id, Role::Destination).is_ok());

        // Releasing again leaves the newcomer alone
        legs.release(&registry);
        assert!(registry.snapshot(&id).destination.is_some());
    }

    #[tokio::test]
    async fn test_teardown_signal() {
        let mut teardown = Teardown::new();
        let other = teardown.clone();
        assert!(timeout(Duration::from_millis(20), teardown.triggered()).await.is_err());

        other.trigger();
        timeout(WAIT, teardown.triggered()).await.unwrap();
        // Triggering twice is harmless
        other.trigger();
        timeout(WAIT, teardown.triggered()).await.unwrap();
    }
}
