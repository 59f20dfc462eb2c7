//! Connection Manager Implementation
//!
//! Concurrency-safe registry of live connections. Owns id allocation, the
//! closed-notification wiring that removes entries exactly once, and the
//! exactly-once startup of the background sweeps (idle reaper and status
//! reporter).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Once};

use anyhow::{bail, Context};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use super::contract::{Connection, ConnectionFactory};
use super::reaper::IdleReaper;
use super::status::StatusReporter;
use crate::config::Config;
use crate::Result;

/// Shared id -> connection table. Reads are always snapshotted before
/// iteration so no lock is held while closing or evaluating connections.
pub(crate) type ConnectionTable = Arc<RwLock<HashMap<u64, Arc<dyn Connection>>>>;

/// Lifecycle counters, updated by the registry and the background sweeps.
#[derive(Debug, Default)]
pub(crate) struct LifecycleStats {
    pub connections_created: AtomicU64,
    pub connections_evicted: AtomicU64,
    pub reaper_ticks: AtomicU64,
    pub reporter_ticks: AtomicU64,
}

/// Point-in-time view of the lifecycle counters, for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleSnapshot {
    pub connections_created: u64,
    pub connections_evicted: u64,
    pub reaper_ticks: u64,
    pub reporter_ticks: u64,
}

/// Manages the lifecycle of accepted connections.
///
/// Generic over the opaque transport handle `T` and protocol handler `P`,
/// which are passed through to the connection factory unmodified.
pub struct ConnectionManager<T, P> {
    factory: ConnectionFactory<T, P>,
    connections: ConnectionTable,
    next_id: AtomicU64,
    config: Arc<Config>,
    sweep_init: Once,
    shutdown_tx: broadcast::Sender<()>,
    disposed: AtomicBool,
    stats: Arc<LifecycleStats>,
}

impl<T, P> ConnectionManager<T, P> {
    /// Create a new connection manager around a connection factory.
    ///
    /// Background sweeps are not started here; they start lazily, exactly
    /// once, on the first successful `create_connection`.
    pub fn new(factory: ConnectionFactory<T, P>, config: Config) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            factory,
            connections: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            config: Arc::new(config),
            sweep_init: Once::new(),
            shutdown_tx,
            disposed: AtomicBool::new(false),
            stats: Arc::new(LifecycleStats::default()),
        }
    }

    /// Allocate the next id, build a connection through the factory, register
    /// it, and wire its closed notification to registry removal.
    ///
    /// A factory error propagates to the caller and registers nothing; the id
    /// counter has still advanced. The first successful call also starts the
    /// idle reaper and status reporter schedules, race-free under concurrent
    /// callers, without blocking on their startup. A disposed manager refuses
    /// new connections.
    pub async fn create_connection(&self, transport: T, protocol: P) -> Result<Arc<dyn Connection>> {
        // Subscribe before the disposed check: a disposal racing past the
        // check broadcasts after this point, so the waiter below still hears
        // it. A disposal that already broadcast is caught by the flag.
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if self.disposed.load(Ordering::Acquire) {
            bail!("Connection manager is disposed");
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let connection = (self.factory)(id, transport, protocol)
            .with_context(|| format!("Connection factory failed for connection {}", id))?;

        {
            let mut table = self.connections.write().await;
            table.insert(id, Arc::clone(&connection));
        }
        self.stats.connections_created.fetch_add(1, Ordering::Relaxed);
        debug!(connection_id = id, "Connection registered");

        // The closed notification fires at most once per connection; removal
        // is idempotent either way. The waiter also exits on manager
        // disposal so no task outlives the schedules.
        let closed = connection.closed();
        let connections = Arc::clone(&self.connections);
        tokio::spawn(async move {
            tokio::select! {
                _ = closed.wait() => {
                    let mut table = connections.write().await;
                    if table.remove(&id).is_some() {
                        debug!(connection_id = id, "Connection removed from registry");
                    }
                }
                _ = shutdown_rx.recv() => {}
            }
        });

        self.start_sweeps();

        Ok(connection)
    }

    /// Remove a connection from the registry. Removing an absent id is a
    /// silent no-op, never an error.
    pub async fn remove(&self, id: u64) {
        let mut table = self.connections.write().await;
        if table.remove(&id).is_some() {
            debug!(connection_id = id, "Connection removed from registry");
        }
    }

    /// Close every currently-registered connection non-gracefully.
    ///
    /// Operates on a snapshot: entries added after the snapshot are missed,
    /// entries already gone are skipped. Does not wait for closure and does
    /// not remove entries; removal happens through each connection's own
    /// closed notification. A failure closing one connection is logged and
    /// does not stop the rest.
    pub async fn close_all(&self) {
        let snapshot: Vec<Arc<dyn Connection>> = {
            let table = self.connections.read().await;
            table.values().cloned().collect()
        };

        info!(connection_count = snapshot.len(), "Closing all connections");

        for connection in snapshot {
            if let Err(e) = connection.close(false) {
                warn!(
                    connection_id = connection.id(),
                    error = %e,
                    "Failed to close connection"
                );
            }
        }
    }

    /// Current registry size. Diagnostics only.
    pub async fn count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Point-in-time lifecycle counters.
    pub fn stats(&self) -> LifecycleSnapshot {
        LifecycleSnapshot {
            connections_created: self.stats.connections_created.load(Ordering::Relaxed),
            connections_evicted: self.stats.connections_evicted.load(Ordering::Relaxed),
            reaper_ticks: self.stats.reaper_ticks.load(Ordering::Relaxed),
            reporter_ticks: self.stats.reporter_ticks.load(Ordering::Relaxed),
        }
    }

    /// Dispose the manager: cancel both recurring sweeps and the
    /// closed-notification waiter tasks.
    ///
    /// Does not close any still-open connection; that is exclusively
    /// `close_all`'s job. An in-progress sweep finishes its current tick.
    pub fn shutdown(&self) {
        debug!("Stopping background sweeps");
        // Flag before broadcast, so anyone who misses the message sees the
        // flag and anyone who misses the flag hears the message.
        self.disposed.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(());
    }

    /// Start the idle reaper and status reporter, exactly once per manager
    /// instance regardless of concurrent first-time callers.
    fn start_sweeps(&self) {
        self.sweep_init.call_once(|| {
            // Subscribe first: a disposal that already broadcast is caught by
            // the flag below, one that broadcasts later reaches these
            // receivers. Either way no unstoppable sweep is spawned.
            let reaper_rx = self.shutdown_tx.subscribe();
            let reporter_rx = self.shutdown_tx.subscribe();
            if self.disposed.load(Ordering::Acquire) {
                debug!("Manager disposed, skipping background sweep startup");
                return;
            }

            debug!("Initializing background sweeps");

            IdleReaper::spawn(
                Arc::clone(&self.connections),
                self.config.reaper.clone(),
                Arc::clone(&self.stats),
                reaper_rx,
            );

            StatusReporter::spawn(
                Arc::clone(&self.connections),
                self.config.status.clone(),
                Arc::clone(&self.stats),
                reporter_rx,
            );
        });
    }
}

impl<T, P> Drop for ConnectionManager<T, P> {
    fn drop(&mut self) {
        // Best-effort cancellation of the sweeps when the manager goes away
        // without an explicit shutdown.
        self.disposed.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(());
    }
}
