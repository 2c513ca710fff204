//! Consumer handler trait.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

use crate::error::QueueError;
use crate::job::Job;

/// Job handler trait.
///
/// An `Err` return counts as a failed attempt and is retried according to the
/// consumer's retry budget.
#[async_trait]
pub trait JobHandler<T>: Send + Sync {
    /// Handle a job.
    async fn handle(&self, job: &Job<T>) -> Result<(), QueueError>;
}

/// Handler backed by an async closure. See [`handler_fn`].
pub struct FnHandler<F, T> {
    f: F,
    _payload: PhantomData<fn(T)>,
}

/// Wrap an async closure as a [`JobHandler`].
///
/// ```rust,no_run
/// use jobmesh_queue::{handler_fn, QueueError};
///
/// let handler = handler_fn(|job: jobmesh_queue::Job<String>| async move {
///     println!("got {}", job.payload);
///     Ok::<(), QueueError>(())
/// });
/// ```
pub fn handler_fn<F, Fut, T>(f: F) -> FnHandler<F, T>
where
    F: Fn(Job<T>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), QueueError>> + Send,
{
    FnHandler {
        f,
        _payload: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, T> JobHandler<T> for FnHandler<F, T>
where
    F: Fn(Job<T>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), QueueError>> + Send,
    T: Send + Sync + 'static,
{
    async fn handle(&self, job: &Job<T>) -> Result<(), QueueError> {
        (self.f)(job.clone()).await
    }
}
