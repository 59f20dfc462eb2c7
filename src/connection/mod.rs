//! Connection Lifecycle Management

pub mod contract;
pub mod manager;
pub mod reaper;
pub mod status;

pub use contract::{ClosedSignal, Connection, ConnectionFactory};
pub use manager::{ConnectionManager, LifecycleSnapshot};
