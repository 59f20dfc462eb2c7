//! Connection Contract
//!
//! The capability surface a tracked connection exposes to the lifecycle
//! manager. Connections are implemented by the protocol layer; this crate
//! only reads their id and last-activity timestamp, asks them to close, and
//! listens for their one-shot closed notification.

use crate::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;

/// One accepted client session tracked by the manager.
///
/// `last_activity` is owned by the protocol layer: it is refreshed there on
/// each unit of activity and only ever read here. `close` must not block on
/// the peer; it triggers teardown and the implementation fires its
/// [`ClosedSignal`] once teardown completes (or immediately, for abrupt
/// closes).
pub trait Connection: Send + Sync {
    /// Process-unique connection id, assigned by the manager.
    fn id(&self) -> u64;

    /// Timestamp of the most recent protocol activity.
    fn last_activity(&self) -> Instant;

    /// Close the connection. `graceful = false` is the non-graceful close
    /// used by sweeps and close-all; `graceful = true` is the conventional
    /// default for voluntary closes.
    fn close(&self, graceful: bool) -> Result<()>;

    /// The connection's single-fire closed notification.
    fn closed(&self) -> Arc<ClosedSignal>;
}

/// Constructs a connection from an allocated id, an opaque transport handle,
/// and an opaque protocol handler. Supplied by the bootstrap layer. Any error
/// propagates synchronously to the `create_connection` caller.
pub type ConnectionFactory<T, P> =
    Box<dyn Fn(u64, T, P) -> Result<Arc<dyn Connection>> + Send + Sync>;

/// Single-fire completion signal.
///
/// Fired by the connection when it has closed, awaited by the registry's
/// removal task. `fire` is at-most-once: the first call wakes waiters and
/// returns `true`, every later call is a no-op returning `false`. `wait`
/// resolves immediately if the signal already fired.
#[derive(Debug, Default)]
pub struct ClosedSignal {
    fired: AtomicBool,
    notify: Notify,
}

impl ClosedSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Returns whether this call was the one that fired it.
    pub fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.notify.notify_waiters();
        true
    }

    /// Whether the signal has fired.
    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Wait until the signal fires. Returns immediately if it already has.
    pub async fn wait(&self) {
        loop {
            if self.fired.load(Ordering::Acquire) {
                return;
            }
            let notified = self.notify.notified();
            // Re-check after registering the waiter so a fire between the
            // load and `notified()` cannot be missed.
            if self.fired.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }
}
