//! Status Reporter
//!
//! Periodic diagnostic emission: one structured log record per tick with the
//! current registry size and the approximate resident memory of the process.
//! Pure side effect; never mutates registry state.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep};
use tracing::{debug, info};

use super::manager::{ConnectionTable, LifecycleStats};
use crate::config::StatusConfig;

pub(crate) struct StatusReporter {
    connections: ConnectionTable,
    config: StatusConfig,
    stats: Arc<LifecycleStats>,
}

impl StatusReporter {
    /// Spawn the recurring report: first run after `initial_delay`, then
    /// every `report_interval`, until the shutdown channel fires.
    pub(crate) fn spawn(
        connections: ConnectionTable,
        config: StatusConfig,
        stats: Arc<LifecycleStats>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let reporter = Self {
            connections,
            config,
            stats,
        };

        tokio::spawn(async move {
            debug!(
                initial_delay = ?reporter.config.initial_delay,
                report_interval = ?reporter.config.report_interval,
                "Status reporter started"
            );

            // The process table is refreshed per tick; the System lives for
            // the task so sysinfo can diff instead of rescanning.
            let mut system = System::new();

            tokio::select! {
                _ = sleep(reporter.config.initial_delay) => {}
                _ = shutdown_rx.recv() => {
                    debug!("Status reporter stopped before first report");
                    return;
                }
            }

            let mut ticker = interval(reporter.config.report_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => reporter.report(&mut system).await,
                    _ = shutdown_rx.recv() => {
                        debug!("Status reporter stopped");
                        return;
                    }
                }
            }
        })
    }

    async fn report(&self, system: &mut System) {
        self.stats.reporter_ticks.fetch_add(1, Ordering::Relaxed);

        let connection_count = self.connections.read().await.len();
        let memory_used_mb = resident_memory_mb(system);

        info!(
            connection_count,
            memory_used_mb, "Status: {} connections, {}MB memory used",
            connection_count, memory_used_mb
        );
    }
}

/// Approximate resident memory of the current process in megabytes, rounded
/// to one decimal place. Returns 0.0 if the process cannot be probed; a
/// failed probe only degrades the report, never the schedule.
fn resident_memory_mb(system: &mut System) -> f64 {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0.0;
    };

    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        false,
        ProcessRefreshKind::nothing().with_memory(),
    );

    let bytes = system.process(pid).map(|p| p.memory()).unwrap_or(0);
    to_mb(bytes)
}

fn to_mb(bytes: u64) -> f64 {
    (bytes as f64 / 1024.0 / 1024.0 * 10.0).round() / 10.0
}
