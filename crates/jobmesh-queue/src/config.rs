//! Queue configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// Largest delay a single timer is allowed to sleep for (2^31 - 1 ms).
pub const MAX_TIMER_DELAY_MS: u64 = 2_147_483_647;

/// Queue configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of handler executions running at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Hard cap on pending jobs.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Scales retry backoff and interval periods.
    #[serde(default = "default_delay_multiplier")]
    pub delay_multiplier: f64,

    /// Safety-net dispatch period in milliseconds (0 = disabled).
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Longest single timer sleep; longer cron waits are chunked.
    #[serde(default = "default_max_timer_delay_ms")]
    pub max_timer_delay_ms: u64,

    /// How often `stop()` re-checks the in-flight counter.
    #[serde(default = "default_drain_poll_interval_ms")]
    pub drain_poll_interval_ms: u64,
}

fn default_concurrency() -> usize {
    4
}

fn default_max_queue_size() -> usize {
    10000
}

fn default_delay_multiplier() -> f64 {
    1.0
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_max_timer_delay_ms() -> u64 {
    MAX_TIMER_DELAY_MS
}

fn default_drain_poll_interval_ms() -> u64 {
    10
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_queue_size: default_max_queue_size(),
            delay_multiplier: default_delay_multiplier(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            max_timer_delay_ms: default_max_timer_delay_ms(),
            drain_poll_interval_ms: default_drain_poll_interval_ms(),
        }
    }
}

impl QueueConfig {
    /// Check the options for values the queue cannot run with.
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.concurrency == 0 {
            return Err(QueueError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.max_queue_size == 0 {
            return Err(QueueError::InvalidConfig(
                "max_queue_size must be at least 1".to_string(),
            ));
        }
        if !self.delay_multiplier.is_finite() || self.delay_multiplier <= 0.0 {
            return Err(QueueError::InvalidConfig(format!(
                "delay_multiplier must be a positive number, got {}",
                self.delay_multiplier
            )));
        }
        if self.max_timer_delay_ms == 0 {
            return Err(QueueError::InvalidConfig(
                "max_timer_delay_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Heartbeat period, if enabled.
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.heartbeat_interval_ms > 0).then(|| Duration::from_millis(self.heartbeat_interval_ms))
    }

    /// Maximum single timer delay as Duration.
    pub fn max_timer_delay(&self) -> Duration {
        Duration::from_millis(self.max_timer_delay_ms)
    }

    /// Drain poll interval as Duration.
    pub fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_interval_ms.max(1))
    }

    /// Apply the delay multiplier to a base delay in milliseconds.
    ///
    /// Never returns zero so repeating timers always have a period.
    pub fn scaled_delay(&self, base_ms: f64) -> Duration {
        let ms = base_ms * self.delay_multiplier;
        if !ms.is_finite() || ms >= self.max_timer_delay_ms as f64 {
            return self.max_timer_delay();
        }
        Duration::from_micros((ms * 1000.0).round().max(1000.0) as u64)
    }

    /// Exponential retry backoff for a job that has failed `attempts` times.
    pub fn retry_backoff(&self, attempts: u32) -> Duration {
        self.scaled_delay(2f64.powi(attempts as i32) * 1000.0)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
