//! Job queue: public handle, shared state, enqueue and lifecycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::QueueConfig;
use crate::cron::{CronEvaluator, StandardCron};
use crate::error::QueueError;
use crate::group::{Consumer, GroupRegistry};
use crate::handler::JobHandler;
use crate::job::{ConsumeOptions, EnqueueOptions, Job};
use crate::recurring::{RecurringJobDetails, RecurringOptions, RecurringRegistry};
use crate::semaphore::ConcurrencyLimiter;
use crate::stats::{QueueCounters, QueueStats};
use crate::store::JobStore;
use crate::timer::{TimerHandle, TimerService};

/// State guarded by the dispatch lock.
pub(crate) struct QueueState<T> {
    pub(crate) store: JobStore<T>,
    pub(crate) groups: GroupRegistry<T>,
    /// Running (or permit-waiting) invocations per job id.
    pub(crate) in_flight: HashMap<String, usize>,
}

impl<T> QueueState<T> {
    fn new() -> Self {
        Self {
            store: JobStore::new(),
            groups: GroupRegistry::new(),
            in_flight: HashMap::new(),
        }
    }

    /// Whether `id` is still pending or being handled somewhere.
    pub(crate) fn is_live(&self, id: &str) -> bool {
        self.store.contains(id) || self.in_flight.contains_key(id)
    }
}

pub(crate) struct Inner<T> {
    pub(crate) config: QueueConfig,
    pub(crate) state: Mutex<QueueState<T>>,
    pub(crate) recurring: Mutex<RecurringRegistry<T>>,
    pub(crate) counters: QueueCounters,
    pub(crate) limiter: ConcurrencyLimiter,
    pub(crate) timers: TimerService,
    pub(crate) cron: Arc<dyn CronEvaluator>,
    stopped: AtomicBool,
    heartbeat: Mutex<Option<TimerHandle>>,
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        self.timers.shutdown();
    }
}

impl<T: Send + Sync + 'static> Inner<T> {
    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub(crate) fn enqueue(
        self: &Arc<Self>,
        payload: Arc<T>,
        options: EnqueueOptions,
    ) -> Result<String, QueueError> {
        let id = options.resolve_id();
        {
            let mut state = self.state.lock();
            if self.is_stopped() {
                return Err(QueueError::Stopped);
            }
            if state.is_live(&id) {
                debug!("Job {} already pending, ignoring duplicate enqueue", id);
                return Ok(id);
            }
            if state.store.len() >= self.config.max_queue_size {
                warn!(
                    "Rejecting job {}: queue is full ({} pending)",
                    id,
                    state.store.len()
                );
                return Err(QueueError::QueueFull {
                    capacity: self.config.max_queue_size,
                });
            }
            state.store.insert(Job::new(
                id.clone(),
                payload,
                options.priority,
                options.start_delay,
            ));
        }

        debug!(
            "Enqueued job {} (priority: {}, delay: {:?})",
            id, options.priority, options.start_delay
        );

        if options.start_delay.is_zero() {
            self.dispatch();
        } else {
            let weak = Arc::downgrade(self);
            self.timers
                .after(format!("delay:{}", id), options.start_delay, move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.dispatch();
                    }
                });
        }

        Ok(id)
    }

    fn start_heartbeat(self: &Arc<Self>) {
        let Some(period) = self.config.heartbeat_interval() else {
            return;
        };
        let weak = Arc::downgrade(self);
        let handle = self.timers.every("heartbeat", period, move || {
            if let Some(inner) = weak.upgrade() {
                inner.dispatch();
            }
        });
        *self.heartbeat.lock() = Some(handle);
        debug!("Heartbeat started (interval={}ms)", period.as_millis());
    }
}

/// In-process job queue with consumer groups and recurring schedules.
///
/// The handle is cheap to clone; all clones share one queue. Operations that
/// start work spawn Tokio tasks and must run inside a Tokio runtime.
pub struct JobQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for JobQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> JobQueue<T> {
    /// Create a queue using the built-in cron evaluator.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime while the heartbeat is
    /// enabled (`heartbeat_interval_ms > 0`, the default), since the
    /// heartbeat timer is spawned immediately.
    pub fn new(config: QueueConfig) -> Result<Self, QueueError> {
        Self::with_cron_evaluator(config, Arc::new(StandardCron))
    }

    /// Create a queue with a custom cron evaluator.
    ///
    /// # Panics
    ///
    /// Same as [`new`](Self::new): requires a Tokio runtime unless the
    /// heartbeat is disabled.
    pub fn with_cron_evaluator(
        config: QueueConfig,
        cron: Arc<dyn CronEvaluator>,
    ) -> Result<Self, QueueError> {
        config.validate()?;

        let inner = Arc::new(Inner {
            limiter: ConcurrencyLimiter::new(config.concurrency),
            config,
            state: Mutex::new(QueueState::new()),
            recurring: Mutex::new(RecurringRegistry::new()),
            counters: QueueCounters::new(),
            timers: TimerService::new(),
            cron,
            stopped: AtomicBool::new(false),
            heartbeat: Mutex::new(None),
        });
        inner.start_heartbeat();

        info!(
            "Job queue started (concurrency: {}, max size: {})",
            inner.config.concurrency, inner.config.max_queue_size
        );

        Ok(Self { inner })
    }

    /// Queue configuration.
    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Add a job. Returns its id.
    ///
    /// Re-enqueueing an id that is still live is a no-op returning the same id.
    /// An id stays live while it is pending and also while any group is still
    /// handling it, even after it has left the store; such an enqueue is
    /// dropped. Once every handler for the id has finished it can be reused.
    pub fn enqueue(&self, payload: T, options: EnqueueOptions) -> Result<String, QueueError> {
        self.inner.enqueue(Arc::new(payload), options)
    }

    /// Register `handler` in a consumer group, creating the group if needed.
    pub fn consume<H>(&self, handler: H, options: ConsumeOptions)
    where
        H: JobHandler<T> + 'static,
    {
        self.consume_shared(Arc::new(handler), options);
    }

    /// Register an already shared handler.
    pub fn consume_shared(&self, handler: Arc<dyn JobHandler<T>>, options: ConsumeOptions) {
        let consumers = {
            let mut state = self.inner.state.lock();
            state
                .groups
                .register(
                    &options.consumer_group,
                    Consumer {
                        handler,
                        max_retries: options.max_retries,
                    },
                )
                .consumer_count()
        };
        info!(
            "Consumer joined group '{}' ({} consumers, max retries: {})",
            options.consumer_group, consumers, options.max_retries
        );
        self.inner.dispatch();
    }

    /// Install (or replace) a recurring schedule.
    pub fn schedule_recurring(
        &self,
        payload: T,
        options: RecurringOptions,
    ) -> Result<String, QueueError> {
        self.inner.schedule_recurring(Arc::new(payload), options)
    }

    /// Remove a recurring schedule and its pending instances.
    ///
    /// Returns false if no schedule existed under `job_id`.
    pub fn cancel_recurring(&self, job_id: &str) -> bool {
        self.inner.cancel_recurring(job_id)
    }

    /// Ids of active recurring schedules, sorted.
    pub fn list_recurring_jobs(&self) -> Vec<String> {
        self.inner.recurring.lock().active_ids()
    }

    /// Details of a recurring schedule.
    pub fn get_recurring_job_details(&self, job_id: &str) -> Option<RecurringJobDetails<T>> {
        self.inner.recurring.lock().details(job_id)
    }

    /// Point-in-time statistics.
    pub fn stats(&self) -> QueueStats {
        let state = self.inner.state.lock();
        QueueStats {
            pending: state.store.len(),
            processing: self.inner.counters.processing(),
            completed: self.inner.counters.completed.load(Ordering::Relaxed),
            failed: self.inner.counters.failed.load(Ordering::Relaxed),
            consumer_groups: state.groups.len(),
        }
    }

    /// Handler invocations currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.inner.counters.processing()
    }

    /// Check if [`stop`](Self::stop) was called.
    pub fn is_stopped(&self) -> bool {
        self.inner.is_stopped()
    }

    /// Stop dispatching and wait for in-flight handlers to finish.
    ///
    /// Running handlers are not interrupted. Safe to call more than once.
    pub async fn stop(&self) {
        let first = {
            let _state = self.inner.state.lock();
            !self.inner.stopped.swap(true, Ordering::SeqCst)
        };
        if first {
            info!("Stopping job queue");
        }

        if let Some(heartbeat) = self.inner.heartbeat.lock().take() {
            heartbeat.cancel();
        }
        self.inner.recurring.lock().disable_all();
        self.inner.timers.shutdown();

        let poll = self.inner.config.drain_poll_interval();
        loop {
            let in_flight = self.inner.counters.processing();
            if in_flight == 0 {
                break;
            }
            debug!("Draining {} in-flight jobs", in_flight);
            tokio::time::sleep(poll).await;
        }

        info!("Job queue stopped");
    }

    /// Liveness probe. Always succeeds for the in-process queue.
    pub async fn test_connection(&self) -> Result<(), QueueError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
