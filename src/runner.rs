//! Builds a queue from [`Settings`] and runs it until Ctrl-C.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use jobmesh_queue::{ConsumeOptions, EnqueueOptions, Job, JobHandler, JobQueue, QueueError};

use crate::settings::Settings;

/// Consumer that logs every delivery and optionally fails on a fixed cadence.
pub(crate) struct LoggingConsumer {
    group: String,
    name: String,
    fail_every: u32,
    deliveries: AtomicU32,
}

impl LoggingConsumer {
    pub(crate) fn new(group: &str, index: usize, fail_every: u32) -> Self {
        Self {
            group: group.to_string(),
            name: format!("{}-{}", group, index + 1),
            fail_every,
            deliveries: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl JobHandler<Value> for LoggingConsumer {
    async fn handle(&self, job: &Job<Value>) -> Result<(), QueueError> {
        let delivery = self.deliveries.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_every > 0 && delivery % self.fail_every == 0 {
            return Err(QueueError::handler(format!(
                "{} rejected delivery #{}",
                self.name, delivery
            )));
        }

        info!(
            group = %self.group,
            consumer = %self.name,
            job_id = %job.id,
            priority = job.priority,
            attempts = job.attempts(),
            payload = %job.payload,
            "Job delivered"
        );
        Ok(())
    }
}

/// Create the queue, join the configured consumers, install recurring
/// schedules and enqueue startup jobs.
pub(crate) fn start(settings: &Settings) -> Result<JobQueue<Value>, Box<dyn std::error::Error>> {
    settings.validate()?;
    let queue = JobQueue::new(settings.queue.clone())?;

    for group in &settings.groups {
        for index in 0..group.consumers {
            queue.consume(
                LoggingConsumer::new(&group.name, index, group.fail_every),
                ConsumeOptions::new(group.name.clone()).with_max_retries(group.max_retries),
            );
        }
    }

    for recurring in &settings.recurring {
        queue.schedule_recurring(recurring.payload.clone(), recurring.to_options()?)?;
    }

    for job in &settings.jobs {
        let mut options = EnqueueOptions::new()
            .with_priority(job.priority)
            .with_start_delay(Duration::from_millis(job.delay_ms));
        if let Some(id) = &job.id {
            options = options.with_job_id(id.clone());
        }
        let id = queue.enqueue(job.payload.clone(), options)?;
        info!("Enqueued startup job {}", id);
    }

    Ok(queue)
}

/// Run until Ctrl-C, then stop and drain.
pub(crate) async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let queue = start(&settings)?;
    info!(
        "jobmesh running: {} groups, {} recurring jobs (Ctrl-C to stop)",
        settings.groups.len(),
        queue.list_recurring_jobs().len()
    );

    if settings.stats_interval_secs == 0 {
        tokio::signal::ctrl_c().await?;
    } else {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(settings.stats_interval_secs));
        ticker.tick().await;
        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result?;
                    break;
                }
                _ = ticker.tick() => {
                    let stats = queue.stats();
                    info!(
                        pending = stats.pending,
                        processing = stats.processing,
                        completed = stats.completed,
                        failed = stats.failed,
                        "Queue stats"
                    );
                }
            }
        }
    }

    info!("Shutdown signal received, draining in-flight jobs");
    queue.stop().await;

    let stats = queue.stats();
    if stats.pending > 0 {
        warn!("{} pending jobs discarded on shutdown", stats.pending);
    }
    info!(
        "jobmesh stopped: {} completed, {} failed",
        stats.completed, stats.failed
    );
    Ok(())
}
