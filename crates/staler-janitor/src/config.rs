//! Configuration for Janitor operations
//!
//! Per-provider expiries belong to the providers themselves; this only
//! controls how passes are run.

use crate::JanitorError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the Janitor service
///
/// # Examples
///
/// ```
/// use staler_janitor::JanitorConfig;
/// use std::time::Duration;
///
/// let config = JanitorConfig::default();
/// assert!(!config.dry_run);
/// assert_eq!(config.sweep_interval, Duration::from_secs(3600));
///
/// let config = JanitorConfig::default().with_dry_run(true);
/// assert!(config.dry_run);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JanitorConfig {
    /// Dry-run mode: Log what would be deleted without actually deleting
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,

    /// How often `watch` mode runs a pass
    /// Default: 1 hour
    #[serde(default = "default_sweep_interval", with = "humantime_serde")]
    pub sweep_interval: Duration,
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            sweep_interval: default_sweep_interval(),
        }
    }
}

impl JanitorConfig {
    /// Return a copy with dry-run mode set
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Return a copy with a different sweep interval
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Check the configuration is usable
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError::Config`] if the sweep interval is zero.
    pub fn validate(&self) -> Result<(), JanitorError> {
        if self.sweep_interval.is_zero() {
            return Err(JanitorError::Config(
                "sweep_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
