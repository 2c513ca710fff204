//! Consumer group registry.

use std::collections::HashSet;
use std::sync::Arc;

use crate::handler::JobHandler;

/// A registered consumer.
pub struct Consumer<T> {
    /// Handler invoked for each delivered job.
    pub handler: Arc<dyn JobHandler<T>>,
    /// Failed attempts tolerated before the job counts as failed.
    pub max_retries: u32,
}

impl<T> Clone for Consumer<T> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            max_retries: self.max_retries,
        }
    }
}

/// A named subscription.
///
/// Every job is delivered to the group once; consumers inside the group take
/// turns.
pub struct ConsumerGroup<T> {
    name: String,
    consumers: Vec<Consumer<T>>,
    cursor: usize,
    claimed: HashSet<String>,
}

impl<T> ConsumerGroup<T> {
    /// Create an empty group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            consumers: Vec::new(),
            cursor: 0,
            claimed: HashSet::new(),
        }
    }

    /// Group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a consumer. Only future round-robin picks are affected.
    pub fn add_consumer(&mut self, consumer: Consumer<T>) {
        self.consumers.push(consumer);
    }

    /// Number of consumers.
    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Pick the consumer at the cursor and advance it.
    pub fn next_consumer(&mut self) -> Option<Consumer<T>> {
        if self.consumers.is_empty() {
            return None;
        }
        let index = self.cursor % self.consumers.len();
        self.cursor = (index + 1) % self.consumers.len();
        Some(self.consumers[index].clone())
    }

    /// Ids already delivered to this group.
    pub fn claimed(&self) -> &HashSet<String> {
        &self.claimed
    }

    /// Check whether `id` was delivered to this group.
    pub fn has_claimed(&self, id: &str) -> bool {
        self.claimed.contains(id)
    }

    /// Mark `id` as delivered.
    pub fn claim(&mut self, id: impl Into<String>) {
        self.claimed.insert(id.into());
    }

    /// Forget a delivery. Returns whether the id was claimed.
    pub fn release(&mut self, id: &str) -> bool {
        self.claimed.remove(id)
    }
}

/// All consumer groups, in registration order.
pub struct GroupRegistry<T> {
    groups: Vec<ConsumerGroup<T>>,
}

impl<T> Default for GroupRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> GroupRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { groups: Vec::new() }
    }

    /// Add a consumer to `name`, creating the group on first use.
    pub fn register(&mut self, name: &str, consumer: Consumer<T>) -> &ConsumerGroup<T> {
        let index = match self.groups.iter().position(|g| g.name == name) {
            Some(index) => index,
            None => {
                self.groups.push(ConsumerGroup::new(name));
                self.groups.len() - 1
            }
        };
        let group = &mut self.groups[index];
        group.add_consumer(consumer);
        group
    }

    /// Look up a group.
    pub fn get(&self, name: &str) -> Option<&ConsumerGroup<T>> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Look up a group mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ConsumerGroup<T>> {
        self.groups.iter_mut().find(|g| g.name == name)
    }

    /// Iterate groups.
    pub fn iter(&self) -> impl Iterator<Item = &ConsumerGroup<T>> {
        self.groups.iter()
    }

    /// Iterate groups mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ConsumerGroup<T>> {
        self.groups.iter_mut()
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Check if no group is registered.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Whether every registered group has claimed `id`. False with no groups.
    pub fn all_claimed(&self, id: &str) -> bool {
        !self.groups.is_empty() && self.groups.iter().all(|g| g.has_claimed(id))
    }

    /// Drop `id` from every group's claimed set.
    pub fn release_everywhere(&mut self, id: &str) {
        for group in &mut self.groups {
            group.release(id);
        }
    }
}

#[cfg(test)]
#[path = "group_tests.rs"]
mod tests;
