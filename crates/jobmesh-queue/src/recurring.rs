//! Recurring job schedules.
//!
//! Each schedule produces job instances named `<job_id>:<uuid>`. Interval
//! schedules enqueue one instance immediately and then one per period. Cron
//! schedules re-arm a one-shot timer after every firing; waits longer than
//! the maximum timer delay are split into chunks that only re-arm.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::QueueError;
use crate::job::EnqueueOptions;
use crate::queue::Inner;
use crate::timer::TimerHandle;

/// When a recurring job fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    /// Fixed period in seconds (scaled by the delay multiplier).
    Interval(f64),
    /// Cron expression.
    Cron(String),
}

impl Recurrence {
    /// Interval in seconds, for interval schedules.
    pub fn interval_seconds(&self) -> Option<f64> {
        match self {
            Recurrence::Interval(seconds) => Some(*seconds),
            Recurrence::Cron(_) => None,
        }
    }

    /// Cron expression, for cron schedules.
    pub fn cron_expression(&self) -> Option<&str> {
        match self {
            Recurrence::Interval(_) => None,
            Recurrence::Cron(expression) => Some(expression),
        }
    }
}

/// Options for [`JobQueue::schedule_recurring`](crate::JobQueue::schedule_recurring).
#[derive(Debug, Clone)]
pub struct RecurringOptions {
    /// Recurring job id; instances are named `<job_id>:<suffix>`.
    pub job_id: String,
    /// Priority of every instance.
    pub priority: i32,
    /// Firing rule.
    pub recurrence: Recurrence,
}

impl RecurringOptions {
    /// Fire every `seconds`.
    pub fn interval(job_id: impl Into<String>, seconds: f64) -> Self {
        Self {
            job_id: job_id.into(),
            priority: 0,
            recurrence: Recurrence::Interval(seconds),
        }
    }

    /// Fire on a cron expression.
    pub fn cron(job_id: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            priority: 0,
            recurrence: Recurrence::Cron(expression.into()),
        }
    }

    /// Set instance priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Read-only view of a recurring schedule.
#[derive(Debug)]
pub struct RecurringJobDetails<T> {
    pub payload: Arc<T>,
    pub priority: i32,
    pub recurrence: Recurrence,
    pub enabled: bool,
}

impl<T> Clone for RecurringJobDetails<T> {
    fn clone(&self) -> Self {
        Self {
            payload: self.payload.clone(),
            priority: self.priority,
            recurrence: self.recurrence.clone(),
            enabled: self.enabled,
        }
    }
}

struct RecurringEntry<T> {
    payload: Arc<T>,
    priority: i32,
    recurrence: Recurrence,
    enabled: bool,
    generation: u64,
    timer: Option<TimerHandle>,
}

impl<T> RecurringEntry<T> {
    fn disable(&mut self) {
        self.enabled = false;
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

/// Schedules by recurring job id.
pub(crate) struct RecurringRegistry<T> {
    entries: HashMap<String, RecurringEntry<T>>,
    next_generation: u64,
}

impl<T> RecurringRegistry<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_generation: 0,
        }
    }

    pub(crate) fn active_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.enabled)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub(crate) fn details(&self, job_id: &str) -> Option<RecurringJobDetails<T>> {
        self.entries.get(job_id).map(|entry| RecurringJobDetails {
            payload: entry.payload.clone(),
            priority: entry.priority,
            recurrence: entry.recurrence.clone(),
            enabled: entry.enabled,
        })
    }

    /// Cancel every timer; entries stay visible but disabled.
    pub(crate) fn disable_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.disable();
        }
    }

    fn remove(&mut self, job_id: &str) -> Option<RecurringEntry<T>> {
        let mut entry = self.entries.remove(job_id)?;
        entry.disable();
        Some(entry)
    }

    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}

fn instance_prefix(job_id: &str) -> String {
    format!("{}:", job_id)
}

impl<T: Send + Sync + 'static> Inner<T> {
    pub(crate) fn schedule_recurring(
        self: &Arc<Self>,
        payload: Arc<T>,
        options: RecurringOptions,
    ) -> Result<String, QueueError> {
        if self.is_stopped() {
            return Err(QueueError::Stopped);
        }
        self.validate_recurrence(&options)?;

        let RecurringOptions {
            job_id,
            priority,
            recurrence,
        } = options;

        let mut recurring = self.recurring.lock();
        let generation = recurring.bump_generation();

        // Arm a cron timer before touching an existing schedule so a failed
        // evaluation leaves it in place. The callback needs the recurring
        // lock, so it cannot run before the entry is inserted.
        let cron_timer = match &recurrence {
            Recurrence::Cron(expression) => match self.arm_cron(&job_id, generation, expression) {
                Ok(timer) => Some(timer),
                Err(e) => {
                    error!("Rejecting recurring job '{}': {}", job_id, e);
                    return Err(e);
                }
            },
            Recurrence::Interval(_) => None,
        };

        if recurring.remove(&job_id).is_some() {
            let purged = self.purge_instances(&job_id);
            info!(
                "Replacing recurring job '{}' ({} pending instances discarded)",
                job_id, purged
            );
        }

        let mut entry = RecurringEntry {
            payload,
            priority,
            recurrence: recurrence.clone(),
            enabled: true,
            generation,
            timer: cron_timer,
        };

        match &recurrence {
            Recurrence::Interval(seconds) => {
                self.enqueue_instance(&job_id, &entry);

                let period = self.config.scaled_delay(seconds * 1000.0);
                let weak = Arc::downgrade(self);
                let id = job_id.clone();
                entry.timer = Some(self.timers.every(
                    format!("recurring:{}", job_id),
                    period,
                    move || {
                        if let Some(inner) = weak.upgrade() {
                            inner.on_interval_tick(&id, generation);
                        }
                    },
                ));
                info!(
                    "Scheduled recurring job '{}' every {:?}",
                    job_id, period
                );
            }
            Recurrence::Cron(expression) => {
                info!(
                    "Scheduled recurring job '{}' with cron '{}'",
                    job_id, expression
                );
            }
        }

        recurring.entries.insert(job_id.clone(), entry);
        Ok(job_id)
    }

    pub(crate) fn cancel_recurring(&self, job_id: &str) -> bool {
        let mut recurring = self.recurring.lock();
        if recurring.remove(job_id).is_none() {
            return false;
        }
        let purged = self.purge_instances(job_id);
        info!(
            "Cancelled recurring job '{}' ({} pending instances discarded)",
            job_id, purged
        );
        true
    }

    fn validate_recurrence(&self, options: &RecurringOptions) -> Result<(), QueueError> {
        let result = match &options.recurrence {
            Recurrence::Interval(seconds) if !seconds.is_finite() || *seconds <= 0.0 => Err(
                QueueError::InvalidSchedule(format!("interval must be positive, got {}", seconds)),
            ),
            Recurrence::Interval(_) => Ok(()),
            Recurrence::Cron(expression) => self.cron.validate(expression),
        };
        if let Err(ref e) = result {
            error!("Rejecting recurring job '{}': {}", options.job_id, e);
        }
        result
    }

    /// Remove not-yet-delivered instances of `job_id` from the store and
    /// every group's claims. Returns how many were removed.
    fn purge_instances(&self, job_id: &str) -> usize {
        let prefix = instance_prefix(job_id);
        let mut state = self.state.lock();
        let removed = state.store.remove_where(|job| job.id.starts_with(&prefix));
        for job in &removed {
            state.groups.release_everywhere(&job.id);
        }
        removed.len()
    }

    fn enqueue_instance(self: &Arc<Self>, job_id: &str, entry: &RecurringEntry<T>) {
        let instance_id = format!("{}{}", instance_prefix(job_id), Uuid::new_v4());
        let options = EnqueueOptions::new()
            .with_priority(entry.priority)
            .with_job_id(instance_id);
        match self.enqueue(entry.payload.clone(), options) {
            Ok(id) => debug!("Recurring job '{}' produced instance {}", job_id, id),
            Err(e) => warn!("Recurring job '{}' could not enqueue instance: {}", job_id, e),
        }
    }

    fn on_interval_tick(self: &Arc<Self>, job_id: &str, generation: u64) {
        if self.is_stopped() {
            return;
        }
        let recurring = self.recurring.lock();
        let Some(entry) = recurring.entries.get(job_id) else {
            return;
        };
        if entry.generation != generation || !entry.enabled {
            return;
        }
        self.enqueue_instance(job_id, entry);
    }

    /// Arm the next cron timer. Delays beyond the maximum timer duration arm
    /// a chunk that only re-arms on expiry.
    fn arm_cron(
        self: &Arc<Self>,
        job_id: &str,
        generation: u64,
        expression: &str,
    ) -> Result<TimerHandle, QueueError> {
        let now = Utc::now();
        let next = self.cron.next_fire(expression, now)?;
        let delay = (next - now).to_std().unwrap_or(Duration::ZERO);

        let max = self.config.max_timer_delay();
        let (delay, fire) = if delay > max {
            debug!(
                "Recurring job '{}' next fires at {}, waking in {:?} to re-arm",
                job_id,
                next.to_rfc3339(),
                max
            );
            (max, false)
        } else {
            debug!(
                "Recurring job '{}' next fires at {}",
                job_id,
                next.to_rfc3339()
            );
            (delay, true)
        };

        let weak = Arc::downgrade(self);
        let id = job_id.to_string();
        Ok(self.timers.after(format!("cron:{}", job_id), delay, move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_cron_timer(&id, generation, fire);
            }
        }))
    }

    fn on_cron_timer(self: &Arc<Self>, job_id: &str, generation: u64, fire: bool) {
        if self.is_stopped() {
            return;
        }
        let mut recurring = self.recurring.lock();
        let Some(entry) = recurring.entries.get_mut(job_id) else {
            return;
        };
        if entry.generation != generation || !entry.enabled {
            return;
        }

        if fire {
            self.enqueue_instance(job_id, entry);
        }

        let expression = match &entry.recurrence {
            Recurrence::Cron(expression) => expression.clone(),
            Recurrence::Interval(_) => return,
        };
        match self.arm_cron(job_id, generation, &expression) {
            Ok(timer) => entry.timer = Some(timer),
            Err(e) => {
                error!("Recurring job '{}' disabled: {}", job_id, e);
                entry.disable();
            }
        }
    }
}

#[cfg(test)]
#[path = "recurring_tests.rs"]
mod tests;
