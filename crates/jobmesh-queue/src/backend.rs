//! Abstract queue backend interface.
//!
//! [`JobQueue`] is the in-process implementation. Networked backends can
//! implement the same trait; for them `test_connection` is a real probe.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::QueueError;
use crate::handler::JobHandler;
use crate::job::{ConsumeOptions, EnqueueOptions};
use crate::queue::JobQueue;
use crate::recurring::{RecurringJobDetails, RecurringOptions};
use crate::stats::QueueStats;

/// Operations every queue backend provides.
#[async_trait]
pub trait QueueBackend<T: Send + Sync + 'static>: Send + Sync {
    /// Add a job, returning its id.
    async fn enqueue(&self, payload: T, options: EnqueueOptions) -> Result<String, QueueError>;

    /// Register a consumer.
    async fn consume(
        &self,
        handler: Arc<dyn JobHandler<T>>,
        options: ConsumeOptions,
    ) -> Result<(), QueueError>;

    /// Install or replace a recurring schedule.
    async fn schedule_recurring(
        &self,
        payload: T,
        options: RecurringOptions,
    ) -> Result<String, QueueError>;

    /// Remove a recurring schedule.
    async fn cancel_recurring(&self, job_id: &str) -> Result<bool, QueueError>;

    /// Active recurring schedule ids.
    async fn list_recurring_jobs(&self) -> Result<Vec<String>, QueueError>;

    /// Details of one recurring schedule.
    async fn get_recurring_job_details(
        &self,
        job_id: &str,
    ) -> Result<Option<RecurringJobDetails<T>>, QueueError>;

    /// Point-in-time statistics.
    async fn stats(&self) -> Result<QueueStats, QueueError>;

    /// Handler invocations in flight.
    async fn in_flight_count(&self) -> Result<usize, QueueError>;

    /// Stop and drain.
    async fn stop(&self) -> Result<(), QueueError>;

    /// Liveness probe.
    async fn test_connection(&self) -> Result<(), QueueError>;
}

#[async_trait]
impl<T: Send + Sync + 'static> QueueBackend<T> for JobQueue<T> {
    async fn enqueue(&self, payload: T, options: EnqueueOptions) -> Result<String, QueueError> {
        JobQueue::enqueue(self, payload, options)
    }

    async fn consume(
        &self,
        handler: Arc<dyn JobHandler<T>>,
        options: ConsumeOptions,
    ) -> Result<(), QueueError> {
        self.consume_shared(handler, options);
        Ok(())
    }

    async fn schedule_recurring(
        &self,
        payload: T,
        options: RecurringOptions,
    ) -> Result<String, QueueError> {
        JobQueue::schedule_recurring(self, payload, options)
    }

    async fn cancel_recurring(&self, job_id: &str) -> Result<bool, QueueError> {
        Ok(JobQueue::cancel_recurring(self, job_id))
    }

    async fn list_recurring_jobs(&self) -> Result<Vec<String>, QueueError> {
        Ok(JobQueue::list_recurring_jobs(self))
    }

    async fn get_recurring_job_details(
        &self,
        job_id: &str,
    ) -> Result<Option<RecurringJobDetails<T>>, QueueError> {
        Ok(JobQueue::get_recurring_job_details(self, job_id))
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        Ok(JobQueue::stats(self))
    }

    async fn in_flight_count(&self) -> Result<usize, QueueError> {
        Ok(JobQueue::in_flight_count(self))
    }

    async fn stop(&self) -> Result<(), QueueError> {
        JobQueue::stop(self).await;
        Ok(())
    }

    async fn test_connection(&self) -> Result<(), QueueError> {
        JobQueue::test_connection(self).await
    }
}
