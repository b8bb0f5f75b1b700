//! Dispatch configuration
//!
//! Runtime-tunable settings loaded from TOML, with built-in defaults.
//!
//! ## Loading Order
//!
//! 1. `DISPATCH_CONFIG` environment variable (path to TOML file)
//! 2. `dispatch.toml` in the current working directory
//! 3. Built-in defaults
//!
//! Fixed system constants (capacity ceiling, loading admission threshold)
//! live in [`defaults`] and are not operator-tunable: the admission
//! threshold is part of the loading contract, not a preference.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// System-wide fixed constants.
pub mod defaults {
    /// Maximum payload capacity any drone may declare (weight units).
    pub const MAX_WEIGHT_LIMIT: u32 = 500;

    /// Minimum battery level (percent) required to accept cargo.
    pub const MIN_LOADING_BATTERY: f64 = 25.0;

    /// Default retention window for battery audit samples (minutes).
    pub const AUDIT_TTL_MINUTES: i64 = 5;

    /// Fallback interval between retention sweeps when no mutation signal
    /// arrives (seconds).
    pub const PURGE_SWEEP_INTERVAL_SECS: u64 = 30;

    /// Interval between battery sampler ticks (seconds).
    pub const SAMPLER_INTERVAL_SECS: u64 = 60;

    /// Buffer size of the purge-signal channel. Signals are coalescable, so
    /// a full buffer is dropped, not an error.
    pub const PURGE_SIGNAL_BUFFER: usize = 16;
}

/// Runtime configuration for the dispatch service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Retention window applied to battery audits recorded without an
    /// explicit TTL (minutes)
    pub audit_ttl_minutes: i64,

    /// Fallback interval between retention sweeps (seconds)
    pub purge_sweep_interval_secs: u64,

    /// Interval between battery sampler ticks (seconds)
    pub sampler_interval_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            audit_ttl_minutes: defaults::AUDIT_TTL_MINUTES,
            purge_sweep_interval_secs: defaults::PURGE_SWEEP_INTERVAL_SECS,
            sampler_interval_secs: defaults::SAMPLER_INTERVAL_SECS,
        }
    }
}

impl DispatchConfig {
    /// Load configuration using the documented loading order.
    ///
    /// Missing files fall through to defaults; a file that exists but does
    /// not parse fails startup.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("DISPATCH_CONFIG") {
            info!(path = %path, "Loading config from DISPATCH_CONFIG");
            return Self::from_file(&path);
        }

        let local = Path::new("dispatch.toml");
        if local.exists() {
            info!("Loading config from ./dispatch.toml");
            return Self::from_file(local);
        }

        info!("No config file found, using built-in defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would disable retention or sweeping
    pub fn validate(&self) -> Result<()> {
        if self.audit_ttl_minutes <= 0 {
            anyhow::bail!(
                "audit_ttl_minutes must be positive (got {})",
                self.audit_ttl_minutes
            );
        }
        if self.purge_sweep_interval_secs == 0 {
            anyhow::bail!("purge_sweep_interval_secs must be positive");
        }
        if self.sampler_interval_secs == 0 {
            anyhow::bail!("sampler_interval_secs must be positive");
        }
        Ok(())
    }
}
