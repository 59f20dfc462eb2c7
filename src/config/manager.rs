//! Configuration Manager

use super::Config;
use crate::Result;
use anyhow::{bail, Context};
use std::path::Path;
use std::time::Duration;

/// Manages configuration loading and validation
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from file
    pub fn load_from_file(path: &Path) -> Result<Config> {
        if path.exists() {
            tracing::info!("Loading configuration from: {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

            config
                .validate()
                .with_context(|| "Configuration validation failed")?;

            tracing::info!("Configuration loaded and validated successfully");
            Ok(config)
        } else {
            tracing::warn!(
                "Configuration file not found at {}, using defaults",
                path.display()
            );
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Config> {
        let mut config = Config::default();

        if let Ok(threshold) = std::env::var("CONNWARDEN_IDLE_THRESHOLD") {
            config.reaper.idle_threshold = humantime::parse_duration(&threshold)
                .with_context(|| format!("Invalid CONNWARDEN_IDLE_THRESHOLD: {}", threshold))?;
        }

        if let Ok(interval) = std::env::var("CONNWARDEN_SWEEP_INTERVAL") {
            config.reaper.sweep_interval = humantime::parse_duration(&interval)
                .with_context(|| format!("Invalid CONNWARDEN_SWEEP_INTERVAL: {}", interval))?;
        }

        if let Ok(delay) = std::env::var("CONNWARDEN_SWEEP_INITIAL_DELAY") {
            config.reaper.initial_delay = humantime::parse_duration(&delay)
                .with_context(|| format!("Invalid CONNWARDEN_SWEEP_INITIAL_DELAY: {}", delay))?;
        }

        if let Ok(interval) = std::env::var("CONNWARDEN_REPORT_INTERVAL") {
            config.status.report_interval = humantime::parse_duration(&interval)
                .with_context(|| format!("Invalid CONNWARDEN_REPORT_INTERVAL: {}", interval))?;
        }

        if let Ok(delay) = std::env::var("CONNWARDEN_REPORT_INITIAL_DELAY") {
            config.status.initial_delay = humantime::parse_duration(&delay)
                .with_context(|| format!("Invalid CONNWARDEN_REPORT_INITIAL_DELAY: {}", delay))?;
        }

        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.validate_reaper_config()
            .with_context(|| "Reaper configuration validation failed")?;

        self.validate_status_config()
            .with_context(|| "Status reporter configuration validation failed")?;

        Ok(())
    }

    fn validate_reaper_config(&self) -> Result<()> {
        if self.reaper.sweep_interval.is_zero() {
            bail!("reaper.sweep_interval must be greater than 0");
        }

        if self.reaper.sweep_interval > Duration::from_secs(24 * 3600) {
            bail!("reaper.sweep_interval cannot exceed 24 hours");
        }

        if self.reaper.idle_threshold.is_zero() {
            bail!("reaper.idle_threshold must be greater than 0");
        }

        if self.reaper.initial_delay > Duration::from_secs(24 * 3600) {
            bail!("reaper.initial_delay cannot exceed 24 hours");
        }

        Ok(())
    }

    fn validate_status_config(&self) -> Result<()> {
        if self.status.report_interval.is_zero() {
            bail!("status.report_interval must be greater than 0");
        }

        if self.status.report_interval > Duration::from_secs(24 * 3600) {
            bail!("status.report_interval cannot exceed 24 hours");
        }

        if self.status.initial_delay > Duration::from_secs(24 * 3600) {
            bail!("status.initial_delay cannot exceed 24 hours");
        }

        Ok(())
    }
}
