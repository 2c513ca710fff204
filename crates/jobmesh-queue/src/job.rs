//! Job definition and per-call options.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

/// A unit of work in the queue.
///
/// Cloning is cheap: the payload and the attempt counter are shared, so every
/// consumer group handling the same job sees the same attempt count.
pub struct Job<T> {
    /// Unique job ID.
    pub id: String,
    /// Opaque payload.
    pub payload: Arc<T>,
    /// Higher values are dispatched first.
    pub priority: i32,
    /// When the job entered the queue.
    pub enqueued_at: Instant,
    /// Not eligible for dispatch before this instant.
    pub available_at: Instant,
    attempts: Arc<AtomicU32>,
}

impl<T> Job<T> {
    /// Create a new job that is available `start_delay` from now.
    pub fn new(id: impl Into<String>, payload: Arc<T>, priority: i32, start_delay: Duration) -> Self {
        let now = Instant::now();
        Self {
            id: id.into(),
            payload,
            priority,
            enqueued_at: now,
            available_at: now + start_delay,
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Number of failed handler invocations so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Record a failed invocation, returning the new count.
    pub(crate) fn record_attempt(&self) -> u32 {
        self.attempts.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Check if the job may be dispatched at `now`.
    pub fn is_available(&self, now: Instant) -> bool {
        self.available_at <= now
    }
}

impl<T> Clone for Job<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            payload: self.payload.clone(),
            priority: self.priority,
            enqueued_at: self.enqueued_at,
            available_at: self.available_at,
            attempts: self.attempts.clone(),
        }
    }
}

impl<T> fmt::Debug for Job<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("attempts", &self.attempts())
            .finish_non_exhaustive()
    }
}

/// Options for [`JobQueue::enqueue`](crate::JobQueue::enqueue).
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    /// Job priority (default 0).
    pub priority: i32,
    /// Delay before the job becomes eligible.
    pub start_delay: Duration,
    /// Caller-supplied ID; a pending job with the same ID makes the call a no-op.
    pub job_id: Option<String>,
}

impl EnqueueOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set start delay.
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Set job ID.
    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub(crate) fn resolve_id(&self) -> String {
        self.job_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }
}

/// Options for [`JobQueue::consume`](crate::JobQueue::consume).
#[derive(Debug, Clone)]
pub struct ConsumeOptions {
    /// Consumer group to join.
    pub consumer_group: String,
    /// Retries before a failing job counts as failed for this consumer.
    pub max_retries: u32,
}

impl ConsumeOptions {
    /// Join `group` with the default retry budget.
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            consumer_group: group.into(),
            max_retries: 3,
        }
    }

    /// Set maximum retries.
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_job_new() {
        let job = Job::new("a", Arc::new("payload"), 5, Duration::ZERO);
        assert_eq!(job.id, "a");
        assert_eq!(job.priority, 5);
        assert_eq!(job.attempts(), 0);
        assert_eq!(job.available_at, job.enqueued_at);
        assert!(job.is_available(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_job_availability() {
        let job = Job::new("a", Arc::new(()), 0, Duration::from_secs(5));
        assert!(!job.is_available(Instant::now()));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(job.is_available(Instant::now()));
    }

    #[tokio::test]
    async fn test_attempts_shared_between_clones() {
        let job = Job::new("a", Arc::new(()), 0, Duration::ZERO);
        let clone = job.clone();
        assert_eq!(clone.record_attempt(), 1);
        assert_eq!(job.attempts(), 1);
    }

    #[test]
    fn test_enqueue_options() {
        let options = EnqueueOptions::new().with_priority(3).with_job_id("x");
        assert_eq!(options.priority, 3);
        assert_eq!(options.resolve_id(), "x");

        let generated = EnqueueOptions::new().resolve_id();
        assert!(Uuid::parse_str(&generated).is_ok());
    }

    #[test]
    fn test_consume_options_default_retries() {
        let options = ConsumeOptions::new("billing");
        assert_eq!(options.consumer_group, "billing");
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.with_max_retries(1).max_retries, 1);
    }
}
