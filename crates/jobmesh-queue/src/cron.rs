//! Cron expression evaluation.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::error::QueueError;

/// Computes the next fire time of a cron expression.
pub trait CronEvaluator: Send + Sync {
    /// Next fire time strictly after `now`.
    ///
    /// Fails with [`QueueError::InvalidSchedule`] on bad syntax or when the
    /// expression has no upcoming occurrence.
    fn next_fire(&self, expression: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, QueueError>;

    /// Check that `expression` parses.
    fn validate(&self, expression: &str) -> Result<(), QueueError> {
        self.next_fire(expression, Utc::now()).map(|_| ())
    }
}

/// [`CronEvaluator`] backed by the `cron` crate.
///
/// Accepts the crate's 6/7-field format (`sec min hour dom month dow [year]`)
/// and standard 5-field expressions, which run at second 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCron;

impl StandardCron {
    /// Parse an expression into a schedule.
    pub fn parse(expression: &str) -> Result<Schedule, QueueError> {
        let normalized = normalize(expression);
        Schedule::from_str(&normalized).map_err(|e| {
            QueueError::InvalidSchedule(format!("invalid cron expression '{}': {}", expression, e))
        })
    }
}

impl CronEvaluator for StandardCron {
    fn next_fire(&self, expression: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, QueueError> {
        let schedule = Self::parse(expression)?;
        schedule.after(&now).next().ok_or_else(|| {
            QueueError::InvalidSchedule(format!(
                "cron expression '{}' has no upcoming fire time",
                expression
            ))
        })
    }
}

fn normalize(expression: &str) -> String {
    let trimmed = expression.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Common cron schedule presets.
pub mod presets {
    /// Every minute.
    pub const EVERY_MINUTE: &str = "0 * * * * *";

    /// Every 5 minutes.
    pub const EVERY_5_MINUTES: &str = "0 */5 * * * *";

    /// Every hour.
    pub const EVERY_HOUR: &str = "0 0 * * * *";

    /// Every day at midnight.
    pub const DAILY_MIDNIGHT: &str = "0 0 0 * * *";

    /// First day of each month at midnight.
    pub const MONTHLY_FIRST: &str = "0 0 0 1 * *";
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
