//! Dispatcher configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dispatch::{DispatchError, DispatchResult, DEFAULT_CHANNEL_CAPACITY};

/// Settings for [`MessageDispatcher`](crate::dispatch::MessageDispatcher)
/// and the refresh service that drains it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Messages per ring buffer (the ring has two)
    ///
    /// Each slot is ~150 bytes, so the default of 65536 costs ~20 MB.
    pub channel_capacity: usize,

    /// Drain period of the refresh service in milliseconds (16 ≈ 60 Hz)
    pub refresh_interval_ms: u64,

    /// Start with delivery blocked until a UI surface attaches
    pub start_blocked: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            refresh_interval_ms: 16,
            start_blocked: true,
        }
    }
}

impl DispatcherConfig {
    /// Check that the configuration can build a dispatcher
    pub fn validate(&self) -> DispatchResult<()> {
        if self.channel_capacity == 0 {
            return Err(DispatchError::InvalidCapacity(self.channel_capacity));
        }
        if self.refresh_interval_ms == 0 {
            return Err(DispatchError::InvalidRefreshInterval(self.refresh_interval_ms));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = DispatcherConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.channel_capacity, 65536);
        assert_eq!(config.refresh_interval(), Duration::from_millis(16));
        assert!(config.start_blocked);
    }

    #[test]
    fn test_validate_rejects_zeroes() {
        let config = DispatcherConfig {
            channel_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DispatchError::InvalidCapacity(0))));

        let config = DispatcherConfig {
            refresh_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DispatchError::InvalidRefreshInterval(0))
        ));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: DispatcherConfig = serde_yaml::from_str("channel_capacity: 1024\n").unwrap();
        assert_eq!(config.channel_capacity, 1024);
        assert_eq!(config.refresh_interval_ms, 16);
        assert!(config.start_blocked);
    }
}
