//! # jobmesh queue
//!
//! In-process job queue that is a priority work queue, a publish/subscribe
//! broker and a recurring-job scheduler at once.
//!
//! ## Features
//!
//! - Priority ordering (stable among equal priorities) and delayed start
//! - Consumer groups: every group receives each job once, consumers inside a
//!   group take turns
//! - Retry with exponential backoff per consumer retry budget
//! - Global concurrency cap shared by all groups
//! - Interval and cron recurring jobs, with chunked waits for sparse crons
//! - Heartbeat re-dispatch and graceful drain on stop
//!
//! ## Example
//!
//! ```rust,no_run
//! use jobmesh_queue::{handler_fn, ConsumeOptions, EnqueueOptions, Job, JobQueue, QueueConfig, QueueError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), QueueError> {
//!     let queue = JobQueue::new(QueueConfig::default())?;
//!
//!     queue.consume(
//!         handler_fn(|job: Job<String>| async move {
//!             println!("email: {}", job.payload);
//!             Ok(())
//!         }),
//!         ConsumeOptions::new("mailer"),
//!     );
//!
//!     queue.enqueue("welcome".to_string(), EnqueueOptions::new().with_priority(10))?;
//!     queue.stop().await;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod cron;
mod dispatch;
pub mod error;
pub mod group;
pub mod handler;
pub mod job;
pub mod queue;
pub mod recurring;
pub mod semaphore;
pub mod stats;
pub mod store;
pub mod timer;

pub use backend::QueueBackend;
pub use config::QueueConfig;
pub use cron::{CronEvaluator, StandardCron};
pub use error::QueueError;
pub use handler::{handler_fn, FnHandler, JobHandler};
pub use job::{ConsumeOptions, EnqueueOptions, Job};
pub use queue::JobQueue;
pub use recurring::{Recurrence, RecurringJobDetails, RecurringOptions};
pub use semaphore::ConcurrencyLimiter;
pub use stats::QueueStats;
pub use timer::{TimerHandle, TimerService};
