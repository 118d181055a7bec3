// Raft group registry configuration
// Provides the settings shared by every shard's registry instance

use std::time::Duration;

use serde::{Deserialize, Serialize};

use regatta_common::{RegattaError, Result};

/// Configuration for the Raft group registry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Whether Raft is enabled on this node (default: true)
    /// A disabled registry never registers handlers, subscriptions or groups
    pub enabled: bool,

    /// Tick period of every group's engine in milliseconds (default: 100ms)
    pub tick_interval_ms: u64,

    /// Probe interval of the direct failure detector in milliseconds (default: 1000ms)
    pub failure_detector_interval_ms: u64,

    /// Number of execution shards (default: 1)
    pub shard_count: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_ms: 100,
            failure_detector_interval_ms: 1000,
            shard_count: 1,
        }
    }
}

impl RegistryConfig {
    /// Get tick interval as Duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Get failure detector probe interval as Duration
    pub fn failure_detector_interval(&self) -> Duration {
        Duration::from_millis(self.failure_detector_interval_ms)
    }

    /// Reject values the registry cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(RegattaError::ConfigError(
                "raft.tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.failure_detector_interval_ms == 0 {
            return Err(RegattaError::ConfigError(
                "raft.failure_detector_interval_ms must be positive".to_string(),
            ));
        }
        if self.shard_count == 0 {
            return Err(RegattaError::ConfigError(
                "raft.shard_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
