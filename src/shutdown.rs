//! Coordinated Shutdown Handling
//!
//! Ties OS signals (SIGTERM/SIGINT) to the connection manager: on shutdown
//! every live connection gets a non-graceful close, the registry is given
//! time to drain through the closed notifications, and the background sweeps
//! are disposed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::signal;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, info, warn};

use crate::connection::ConnectionManager;
use crate::Result;

/// Shutdown coordinator that manages the coordinated shutdown process
pub struct ShutdownCoordinator {
    /// Broadcast sender for the shutdown signal
    shutdown_tx: broadcast::Sender<()>,
    /// Notification for shutdown completion
    shutdown_complete: Arc<Notify>,
    /// How long to wait for the registry to drain
    timeout: Duration,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator
    pub fn new(timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let shutdown_complete = Arc::new(Notify::new());

        Self {
            shutdown_tx,
            shutdown_complete,
            timeout,
        }
    }

    /// Get a shutdown receiver for components to listen for shutdown signals
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Get a handle to wait for shutdown completion
    pub fn completion_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown_complete)
    }

    /// Start listening for shutdown signals (SIGTERM, SIGINT)
    pub async fn listen_for_signals(&self) -> Result<()> {
        info!("Starting shutdown signal listener");

        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating shutdown");
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, initiating shutdown");
                }
                _ = signal::ctrl_c() => {
                    info!("Received Ctrl+C, initiating shutdown");
                }
            }
        }

        #[cfg(windows)]
        {
            signal::ctrl_c().await?;
            info!("Received Ctrl+C, initiating shutdown");
        }

        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal: {}", e);
        }

        Ok(())
    }

    /// Shut down a connection manager: close every live connection, wait for
    /// the registry to drain through the closed notifications, then dispose
    /// the manager's background sweeps.
    pub async fn shutdown_manager<T, P>(&self, manager: &ConnectionManager<T, P>) -> Result<()> {
        info!("Initiating shutdown of connection manager");
        let start_time = Instant::now();

        manager.close_all().await;

        // Removal happens via each connection's own closed notification, so
        // drain by polling the registry size rather than joining anything.
        let mut last_count = manager.count().await;
        info!(
            "Waiting for {} connections to drain (timeout: {:?})",
            last_count, self.timeout
        );

        while last_count > 0 && start_time.elapsed() < self.timeout {
            tokio::time::sleep(Duration::from_millis(100)).await;

            let current_count = manager.count().await;
            if current_count != last_count {
                debug!("Registered connections: {} -> {}", last_count, current_count);
                last_count = current_count;
            }
        }

        let final_count = manager.count().await;
        let elapsed = start_time.elapsed();

        if final_count == 0 {
            info!("Registry drained in {:?}", elapsed);
        } else {
            warn!(
                "Shutdown timeout reached after {:?} with {} connections still registered",
                elapsed, final_count
            );
        }

        manager.shutdown();

        self.shutdown_complete.notify_waiters();

        Ok(())
    }

    /// Wait for shutdown completion with timeout
    pub async fn wait_for_completion(&self) -> Result<()> {
        tokio::time::timeout(
            self.timeout + Duration::from_secs(5),
            self.shutdown_complete.notified(),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Shutdown completion timeout"))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_coordinator_creation() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        let _receiver = coordinator.subscribe();
        let _completion = coordinator.completion_handle();
    }

    #[tokio::test]
    async fn test_shutdown_signal_broadcast() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        let mut receiver = coordinator.subscribe();

        coordinator.shutdown_tx.send(()).unwrap();

        assert!(receiver.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_completion_notification() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
        let completion = coordinator.completion_handle();

        let waiter = tokio::spawn(async move { completion.notified().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        coordinator.shutdown_complete.notify_waiters();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("completion should be notified")
            .unwrap();
    }
}
