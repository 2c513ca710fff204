//! Queue errors.

use thiserror::Error;

/// Queue error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Queue is at capacity.
    #[error("Queue is full (capacity: {capacity})")]
    QueueFull { capacity: usize },

    /// Queue has been stopped.
    #[error("Queue is stopped")]
    Stopped,

    /// A consumer handler failed.
    #[error("Handler failed: {0}")]
    HandlerFailed(String),

    /// Malformed recurring schedule (bad cron expression or interval).
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Rejected construction options.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal invariant violation.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    /// Shorthand for a handler failure.
    pub fn handler(msg: impl Into<String>) -> Self {
        QueueError::HandlerFailed(msg.into())
    }
}
