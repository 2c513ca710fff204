//! Dispatch loop and per-job processing.
//!
//! A dispatch pass claims at most one job per consumer group, then spawns one
//! task per claim. Each task holds a concurrency permit while its handler
//! runs, and finishes by either arming a retry timer or triggering the next
//! pass.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::group::Consumer;
use crate::job::Job;
use crate::queue::{Inner, QueueState};

/// One claimed (job, consumer) pair.
struct Launch<T> {
    group: String,
    job: Job<T>,
    consumer: Consumer<T>,
}

/// How a processing run ended.
enum Outcome {
    Completed,
    RetryArmed,
    Finished,
}

impl<T: Send + Sync + 'static> Inner<T> {
    /// Run one dispatch pass.
    pub(crate) fn dispatch(self: &Arc<Self>) {
        let launches = {
            let mut state = self.state.lock();
            // Checked under the lock so no claim can follow the flag flip in `stop`.
            if self.is_stopped() {
                return;
            }
            let launches = self.claim_next(&mut state);
            Self::purge_fully_claimed(&mut state);
            launches
        };

        for launch in launches {
            let inner = self.clone();
            tokio::spawn(async move {
                inner.process(launch).await;
            });
        }
    }

    fn claim_next(&self, state: &mut QueueState<T>) -> Vec<Launch<T>> {
        let now = Instant::now();
        let QueueState {
            store,
            groups,
            in_flight,
        } = state;

        let mut launches = Vec::new();
        for group in groups.iter_mut() {
            let Some(job) = store.next_eligible(group.claimed(), now) else {
                continue;
            };
            let job = job.clone();
            let Some(consumer) = group.next_consumer() else {
                continue;
            };

            group.claim(job.id.clone());
            *in_flight.entry(job.id.clone()).or_insert(0) += 1;
            self.counters.record_launch();

            debug!(
                "Dispatching job {} to group '{}' (priority: {}, attempts: {})",
                job.id,
                group.name(),
                job.priority,
                job.attempts()
            );
            launches.push(Launch {
                group: group.name().to_string(),
                job,
                consumer,
            });
        }
        launches
    }

    fn purge_fully_claimed(state: &mut QueueState<T>) {
        let groups = &state.groups;
        let purged = state.store.remove_where(|job| groups.all_claimed(&job.id));
        for job in &purged {
            debug!("Job {} delivered to every group, removed from store", job.id);
        }
    }

    async fn process(self: Arc<Self>, launch: Launch<T>) {
        let Launch {
            group,
            job,
            consumer,
        } = launch;

        let outcome = match self.limiter.acquire().await {
            Ok(_permit) => {
                let result = AssertUnwindSafe(consumer.handler.handle(&job))
                    .catch_unwind()
                    .await;
                match result {
                    Ok(Ok(())) => {
                        self.counters.record_completed();
                        debug!("Job {} completed in group '{}'", job.id, group);
                        Outcome::Completed
                    }
                    Ok(Err(e)) => self.handle_failure(&group, &job, &consumer, &e.to_string()),
                    Err(_) => self.handle_failure(&group, &job, &consumer, "handler panicked"),
                }
            }
            Err(e) => {
                error!("Could not acquire permit for job {}: {}", job.id, e);
                Outcome::Finished
            }
        };

        self.settle(&job.id);
        self.counters.record_finish();

        if !matches!(outcome, Outcome::RetryArmed) {
            self.dispatch();
        }
    }

    fn handle_failure(
        self: &Arc<Self>,
        group: &str,
        job: &Job<T>,
        consumer: &Consumer<T>,
        reason: &str,
    ) -> Outcome {
        if job.attempts() >= consumer.max_retries {
            self.counters.record_failed();
            error!(
                "Job {} failed in group '{}' after {} attempts: {}",
                job.id,
                group,
                job.attempts(),
                reason
            );
            return Outcome::Finished;
        }

        let attempts = {
            let mut state = self.state.lock();
            let released = state
                .groups
                .get_mut(group)
                .map(|g| g.release(&job.id))
                .unwrap_or(false);
            if !released {
                debug!("Job {} was withdrawn, not retrying", job.id);
                return Outcome::Finished;
            }
            let attempts = job.record_attempt();
            if !state.store.contains(&job.id) {
                state.store.insert(job.clone());
            }
            attempts
        };

        let delay = self.config.retry_backoff(attempts);
        warn!(
            "Job {} failed in group '{}' (attempt {}/{}), retrying in {:?}: {}",
            job.id, group, attempts, consumer.max_retries, delay, reason
        );

        let weak = Arc::downgrade(self);
        self.timers.after(format!("retry:{}", job.id), delay, move || {
            if let Some(inner) = weak.upgrade() {
                inner.dispatch();
            }
        });
        Outcome::RetryArmed
    }

    /// Drop one in-flight reference to `id`; once none remain and the job has
    /// left the store, forget it in every group so the id can be reused.
    fn settle(&self, id: &str) {
        let mut state = self.state.lock();
        let remaining = match state.in_flight.get_mut(id) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        };
        if remaining > 0 {
            return;
        }
        state.in_flight.remove(id);
        if !state.store.contains(id) {
            state.groups.release_everywhere(id);
        }
    }
}
