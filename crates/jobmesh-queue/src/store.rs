//! Pending job store.
//!
//! Jobs are kept in a `Vec` sorted by descending priority. Insertion is
//! stable: a new job lands after every job of equal or higher priority.

use std::collections::HashSet;

use tokio::time::Instant;

use crate::job::Job;

/// Ordered sequence of pending jobs.
pub struct JobStore<T> {
    jobs: Vec<Job<T>>,
}

impl<T> Default for JobStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> JobStore<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    /// Insert a job, keeping priority order.
    pub fn insert(&mut self, job: Job<T>) {
        let index = self
            .jobs
            .iter()
            .position(|existing| existing.priority < job.priority)
            .unwrap_or(self.jobs.len());
        self.jobs.insert(index, job);
    }

    /// Check whether a job with `id` is pending.
    pub fn contains(&self, id: &str) -> bool {
        self.jobs.iter().any(|job| job.id == id)
    }

    /// Get a pending job by id.
    pub fn get(&self, id: &str) -> Option<&Job<T>> {
        self.jobs.iter().find(|job| job.id == id)
    }

    /// Remove a job by id.
    pub fn remove(&mut self, id: &str) -> Option<Job<T>> {
        let index = self.jobs.iter().position(|job| job.id == id)?;
        Some(self.jobs.remove(index))
    }

    /// First job in priority order that is not in `claimed` and is available at `now`.
    pub fn next_eligible(&self, claimed: &HashSet<String>, now: Instant) -> Option<&Job<T>> {
        self.jobs
            .iter()
            .find(|job| !claimed.contains(&job.id) && job.is_available(now))
    }

    /// Remove every job for which `predicate` holds, returning the removed jobs.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Vec<Job<T>>
    where
        F: FnMut(&Job<T>) -> bool,
    {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.jobs.len());
        for job in self.jobs.drain(..) {
            if predicate(&job) {
                removed.push(job);
            } else {
                kept.push(job);
            }
        }
        self.jobs = kept;
        removed
    }

    /// Iterate pending jobs in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &Job<T>> {
        self.jobs.iter()
    }

    /// Number of pending jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Drop all pending jobs.
    pub fn clear(&mut self) {
        self.jobs.clear();
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
