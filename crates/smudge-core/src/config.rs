//! Registry configuration.

use serde::{Deserialize, Serialize};

use crate::error::{TrackError, TrackResult};

/// Tuning for the per-thread tracking registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Number of table insertions between sweeps of dead entries (default: 256).
    pub sweep_interval: usize,
}

impl RegistryConfig {
    /// Check that the configuration can be installed.
    pub fn validate(&self) -> TrackResult<()> {
        if self.sweep_interval == 0 {
            return Err(TrackError::Config(
                "sweep_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            sweep_interval: 256,
        }
    }
}
