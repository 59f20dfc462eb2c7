//! Configuration Types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub reaper: ReaperConfig,
    pub status: StatusConfig,
}

/// Idle reaper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReaperConfig {
    /// Delay before the first sweep after the manager starts
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    /// Interval between sweeps
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// Maximum permitted time since last activity before eviction
    #[serde(with = "humantime_serde")]
    pub idle_threshold: Duration,
}

/// Status reporter configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Delay before the first report after the manager starts
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    /// Interval between status reports
    #[serde(with = "humantime_serde")]
    pub report_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reaper: ReaperConfig::default(),
            status: StatusConfig::default(),
        }
    }
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(5 * 60),
            idle_threshold: Duration::from_secs(20 * 60),
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(60),
            report_interval: Duration::from_secs(20 * 60),
        }
    }
}
