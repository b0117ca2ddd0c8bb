//! Capacity, expiry and history limits for the memory manager.

use parley_types::ConfigError;
use std::time::Duration;

/// Default idle window before a session is reclaimed.
pub const DEFAULT_EXPIRY_MINUTES: u64 = 30;

/// Default maximum number of live sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 100;

/// Default number of trailing messages in a history view.
pub const DEFAULT_MAX_HISTORY_LENGTH: usize = 20;

/// Default period between reclamation scans.
pub const DEFAULT_RECLAIM_INTERVAL: Duration = Duration::from_secs(300);

/// Limits applied by [`crate::MemoryManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Sessions idle for longer than this are reclaimed.
    pub expiry: Duration,
    /// Admitting a session beyond this count evicts the least recently accessed one.
    pub max_sessions: usize,
    /// Number of trailing messages returned by history views.
    pub max_history_length: usize,
    /// How often the reclaimer scans for idle sessions.
    pub reclaim_interval: Duration,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            expiry: Duration::from_secs(DEFAULT_EXPIRY_MINUTES * 60),
            max_sessions: DEFAULT_MAX_SESSIONS,
            max_history_length: DEFAULT_MAX_HISTORY_LENGTH,
            reclaim_interval: DEFAULT_RECLAIM_INTERVAL,
        }
    }
}

impl MemoryConfig {
    /// Build a validated config from the user-facing minute/count options.
    pub fn from_minutes(
        expiry_minutes: u64,
        max_sessions: usize,
        max_history_length: usize,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            expiry: Duration::from_secs(expiry_minutes.saturating_mul(60)),
            max_sessions,
            max_history_length,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_reclaim_interval(mut self, interval: Duration) -> Self {
        self.reclaim_interval = interval;
        self
    }

    /// Reject limits the manager cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sessions == 0 {
            return Err(ConfigError::invalid("max_sessions", "must be at least 1"));
        }
        if self.max_history_length == 0 {
            return Err(ConfigError::invalid(
                "max_history_length",
                "must be at least 1",
            ));
        }
        if self.expiry.is_zero() {
            return Err(ConfigError::invalid(
                "expiry_minutes",
                "must be greater than zero",
            ));
        }
        if self.reclaim_interval.is_zero() {
            return Err(ConfigError::invalid(
                "reclaim_interval",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = MemoryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.expiry, Duration::from_secs(1800));
        assert_eq!(config.max_sessions, 100);
        assert_eq!(config.max_history_length, 20);
        assert_eq!(config.reclaim_interval, Duration::from_secs(300));
    }

    #[test]
    fn from_minutes_converts_expiry() {
        let config = MemoryConfig::from_minutes(5, 10, 4).unwrap();
        assert_eq!(config.expiry, Duration::from_secs(300));
        assert_eq!(config.max_sessions, 10);
        assert_eq!(config.max_history_length, 4);
    }

    #[test]
    fn zero_capacity_rejected() {
        let err = MemoryConfig::from_minutes(30, 0, 20).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "max_sessions"));
    }

    #[test]
    fn zero_history_rejected() {
        let err = MemoryConfig::from_minutes(30, 10, 0).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "max_history_length")
        );
    }

    #[test]
    fn zero_expiry_rejected() {
        assert!(MemoryConfig::from_minutes(0, 10, 10).is_err());
    }

    #[test]
    fn zero_reclaim_interval_rejected() {
        let config = MemoryConfig::default().with_reclaim_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
