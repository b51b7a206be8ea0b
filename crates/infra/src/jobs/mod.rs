//! Background job queue: submit a job, have it executed later by a worker,
//! with bounded retries on contention and a dead-letter queue for the rest.

pub mod executor;
pub mod store;
pub mod types;

pub use executor::{ExecutorStats, JobExecutor, JobExecutorConfig, JobExecutorHandle};
pub use store::{InMemoryJobStore, JobStats, JobStore, JobStoreError};
pub use types::{BackoffStrategy, DeadLetterEntry, Job, JobId, JobResult, JobStatus, RetryPolicy};
