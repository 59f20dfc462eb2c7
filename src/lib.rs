//! Connwarden
//!
//! Connection lifecycle management for socket-based servers.
//!
//! The crate tracks accepted connections in a concurrency-safe registry,
//! allocates process-unique connection ids, evicts connections idle beyond a
//! configurable threshold, reports periodic health diagnostics, and supports
//! coordinated shutdown. The accept loop, wire protocol, and transport are
//! external collaborators: they reach this crate only through the
//! [`Connection`] contract and the connection factory.

pub mod config;
pub mod connection;
pub mod shutdown;

pub use config::Config;
pub use connection::{ClosedSignal, Connection, ConnectionFactory, ConnectionManager};
pub use shutdown::ShutdownCoordinator;

/// Common error type for the crate
pub type Result<T> = anyhow::Result<T>;
