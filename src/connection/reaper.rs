//! Idle Connection Reaper
//!
//! Background sweep that evicts connections idle beyond the configured
//! threshold. Runs on its own tokio task from the first registered
//! connection until the manager is disposed.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep};
use tracing::{debug, info, warn};

use super::manager::{ConnectionTable, LifecycleStats};
use crate::config::ReaperConfig;

pub(crate) struct IdleReaper {
    connections: ConnectionTable,
    config: ReaperConfig,
    stats: Arc<LifecycleStats>,
}

impl IdleReaper {
    /// Spawn the recurring sweep: first run after `initial_delay`, then every
    /// `sweep_interval`, until the shutdown channel fires. Cancellation stops
    /// future sweeps but never interrupts one already in progress.
    pub(crate) fn spawn(
        connections: ConnectionTable,
        config: ReaperConfig,
        stats: Arc<LifecycleStats>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let reaper = Self {
            connections,
            config,
            stats,
        };

        tokio::spawn(async move {
            debug!(
                initial_delay = ?reaper.config.initial_delay,
                sweep_interval = ?reaper.config.sweep_interval,
                idle_threshold = ?reaper.config.idle_threshold,
                "Idle reaper started"
            );

            tokio::select! {
                _ = sleep(reaper.config.initial_delay) => {}
                _ = shutdown_rx.recv() => {
                    debug!("Idle reaper stopped before first sweep");
                    return;
                }
            }

            // The interval's first tick completes immediately, so the first
            // sweep lands at initial_delay and the rest at sweep_interval.
            let mut ticker = interval(reaper.config.sweep_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => reaper.sweep().await,
                    _ = shutdown_rx.recv() => {
                        debug!("Idle reaper stopped");
                        return;
                    }
                }
            }
        })
    }

    /// One sweep over a snapshot of registered ids.
    ///
    /// A connection removed between snapshot and evaluation is skipped. A
    /// close failure is isolated to that connection: the rest of the sweep
    /// and the schedule itself continue.
    async fn sweep(&self) {
        self.stats.reaper_ticks.fetch_add(1, Ordering::Relaxed);

        let ids: Vec<u64> = {
            let table = self.connections.read().await;
            table.keys().copied().collect()
        };

        debug!(connection_count = ids.len(), "Running idle sweep");

        for id in ids {
            let connection = {
                let table = self.connections.read().await;
                table.get(&id).cloned()
            };

            // Gone since the snapshot, closed by another path.
            let Some(connection) = connection else {
                continue;
            };

            if connection.last_activity().elapsed() >= self.config.idle_threshold {
                info!(connection_id = id, "Session timeout, disconnecting");

                if let Err(e) = connection.close(false) {
                    warn!(
                        connection_id = id,
                        error = %e,
                        "Failed to close idle connection"
                    );
                    continue;
                }

                self.stats.connections_evicted.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
