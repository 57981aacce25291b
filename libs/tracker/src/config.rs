//! Tracker timing configuration.

use std::time::Duration;

use rollwatch_reconcile::DEFAULT_HEALTH_GRACE;
use thiserror::Error;

/// Default interval between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Default delay before the first poll, giving the scheduler a moment to
/// accept the submission.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);

/// Default total wait before a session is reported as timed out.
pub const DEFAULT_DEADLINE: Duration = Duration::from_millis(120_000);

/// Default pause between reaching `healthy` and completing the session.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1500);

const ENV_POLL_INTERVAL: &str = "ROLLWATCH_POLL_INTERVAL_MS";
const ENV_INITIAL_DELAY: &str = "ROLLWATCH_INITIAL_DELAY_MS";
const ENV_DEADLINE: &str = "ROLLWATCH_DEADLINE_MS";
const ENV_SETTLE_DELAY: &str = "ROLLWATCH_SETTLE_DELAY_MS";
const ENV_HEALTH_GRACE: &str = "ROLLWATCH_HEALTH_GRACE_MS";

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}' (expected milliseconds)")]
    InvalidDuration { var: &'static str, value: String },

    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
}

/// Timing knobs for a tracking session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub poll_interval: Duration,
    pub initial_delay: Duration,
    pub deadline: Duration,
    pub settle_delay: Duration,
    pub health_grace: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            initial_delay: DEFAULT_INITIAL_DELAY,
            deadline: DEFAULT_DEADLINE,
            settle_delay: DEFAULT_SETTLE_DELAY,
            health_grace: DEFAULT_HEALTH_GRACE,
        }
    }
}

impl TrackerConfig {
    /// Load from `ROLLWATCH_*_MS` environment variables, falling back to
    /// the defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let millis = |var: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match lookup(var) {
                None => Ok(default),
                Some(value) => value
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|_| ConfigError::InvalidDuration { var, value }),
            }
        };

        let config = Self {
            poll_interval: millis(ENV_POLL_INTERVAL, defaults.poll_interval)?,
            initial_delay: millis(ENV_INITIAL_DELAY, defaults.initial_delay)?,
            deadline: millis(ENV_DEADLINE, defaults.deadline)?,
            settle_delay: millis(ENV_SETTLE_DELAY, defaults.settle_delay)?,
            health_grace: millis(ENV_HEALTH_GRACE, defaults.health_grace)?,
        };
        config.validate()?;

        Ok(config)
    }

    /// Check invariants the timers rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_health_grace(mut self, grace: Duration) -> Self {
        self.health_grace = grace;
        self
    }
}
