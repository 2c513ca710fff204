//! Timer facility shared by delayed enqueue, retry backoff, recurring
//! schedules and the heartbeat.
//!
//! Every timer runs as its own Tokio task and owns a child of the service's
//! root [`CancellationToken`], so a single [`TimerService::shutdown`] call
//! silences all of them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Shortest period a repeating timer may use.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Handle to a scheduled timer.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    id: Arc<str>,
    token: CancellationToken,
    fire_count: Arc<AtomicU64>,
}

impl TimerHandle {
    fn new(id: String, token: CancellationToken) -> Self {
        Self {
            id: id.into(),
            token,
            fire_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Timer ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Cancel the timer. A callback that has not started yet will not run.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if the timer was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Number of times the callback has run.
    pub fn fire_count(&self) -> u64 {
        self.fire_count.load(Ordering::Relaxed)
    }
}

/// Creates one-shot and repeating timers.
#[derive(Debug, Clone, Default)]
pub struct TimerService {
    root: CancellationToken,
}

impl TimerService {
    /// Create a new timer service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` once after `delay`.
    pub fn after<F>(&self, id: impl Into<String>, delay: Duration, f: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = TimerHandle::new(id.into(), self.root.child_token());
        let token = handle.token.clone();
        let fire_count = handle.fire_count.clone();
        let id = handle.id.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("Timer {} cancelled before firing", id);
                }
                _ = tokio::time::sleep(delay) => {
                    if !token.is_cancelled() {
                        fire_count.fetch_add(1, Ordering::Relaxed);
                        f();
                    }
                }
            }
        });

        handle
    }

    /// Run `f` every `period`, first after one full period.
    pub fn every<F>(&self, id: impl Into<String>, period: Duration, mut f: F) -> TimerHandle
    where
        F: FnMut() + Send + 'static,
    {
        let period = period.max(MIN_PERIOD);
        let handle = TimerHandle::new(id.into(), self.root.child_token());
        let token = handle.token.clone();
        let fire_count = handle.fire_count.clone();
        let id = handle.id.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!("Repeating timer {} stopped", id);
                        break;
                    }
                    _ = interval.tick() => {
                        if token.is_cancelled() {
                            break;
                        }
                        fire_count.fetch_add(1, Ordering::Relaxed);
                        f();
                    }
                }
            }
        });

        handle
    }

    /// Cancel every timer created by this service, including future ones.
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    /// Check if the service was shut down.
    pub fn is_shutdown(&self) -> bool {
        self.root.is_cancelled()
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
