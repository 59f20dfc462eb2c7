//! Shared test doubles for lifecycle tests

#![allow(dead_code)]

use anyhow::bail;
use connwarden::{ClosedSignal, Connection, ConnectionFactory};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Opaque transport stand-in carrying failure-injection knobs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TestTransport {
    /// Make the factory reject this connection.
    pub fail_factory: bool,
    /// Make every `close` call on this connection fail.
    pub fail_close: bool,
}

impl TestTransport {
    pub fn failing_factory() -> Self {
        Self {
            fail_factory: true,
            ..Self::default()
        }
    }

    pub fn failing_close() -> Self {
        Self {
            fail_close: true,
            ..Self::default()
        }
    }
}

/// Connection double: activity is refreshed with `touch`, closes are counted
/// through a shared counter, and the closed signal fires on successful close.
pub struct TestConnection {
    id: u64,
    last_activity: Mutex<Instant>,
    closed: Arc<ClosedSignal>,
    fail_close: bool,
    close_calls: Arc<AtomicU64>,
    last_graceful: Mutex<Option<bool>>,
}

impl TestConnection {
    /// What the protocol layer does on each unit of activity.
    pub fn touch(&self) {
        *self.last_activity.lock().unwrap() = Instant::now();
    }

    /// Graceful flag of the most recent close call, if any.
    pub fn last_graceful(&self) -> Option<bool> {
        *self.last_graceful.lock().unwrap()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_fired()
    }
}

impl Connection for TestConnection {
    fn id(&self) -> u64 {
        self.id
    }

    fn last_activity(&self) -> Instant {
        *self.last_activity.lock().unwrap()
    }

    fn close(&self, graceful: bool) -> connwarden::Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_graceful.lock().unwrap() = Some(graceful);

        if self.fail_close {
            bail!("injected close failure");
        }

        self.closed.fire();
        Ok(())
    }

    fn closed(&self) -> Arc<ClosedSignal> {
        Arc::clone(&self.closed)
    }
}

/// Observation handles for everything the factory built.
pub struct TestHarness {
    close_calls: Arc<AtomicU64>,
    created: Arc<Mutex<Vec<Arc<TestConnection>>>>,
}

impl TestHarness {
    /// Total `close` invocations across all connections.
    pub fn close_calls(&self) -> u64 {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// The n-th connection the factory built, in creation order.
    pub fn connection(&self, index: usize) -> Arc<TestConnection> {
        Arc::clone(&self.created.lock().unwrap()[index])
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

/// Install the test log subscriber, once per test binary. Respects
/// `RUST_LOG`; defaults to debug so sweep activity shows up in captured
/// output.
pub fn init_test_logging() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Factory building `TestConnection`s, plus the harness observing them.
pub fn test_factory() -> (ConnectionFactory<TestTransport, ()>, TestHarness) {
    init_test_logging();
    let close_calls = Arc::new(AtomicU64::new(0));
    let created: Arc<Mutex<Vec<Arc<TestConnection>>>> = Arc::new(Mutex::new(Vec::new()));

    let harness = TestHarness {
        close_calls: Arc::clone(&close_calls),
        created: Arc::clone(&created),
    };

    let factory: ConnectionFactory<TestTransport, ()> =
        Box::new(move |id, transport: TestTransport, _protocol: ()| {
            if transport.fail_factory {
                bail!("injected factory failure");
            }

            let connection = Arc::new(TestConnection {
                id,
                last_activity: Mutex::new(Instant::now()),
                closed: Arc::new(ClosedSignal::new()),
                fail_close: transport.fail_close,
                close_calls: Arc::clone(&close_calls),
                last_graceful: Mutex::new(None),
            });

            created.lock().unwrap().push(Arc::clone(&connection));
            let connection: Arc<dyn Connection> = connection;
            Ok(connection)
        });

    (factory, harness)
}
