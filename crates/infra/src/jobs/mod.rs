//! Background work: audio transcription, response analysis and invitation
//! mail all run as tenant-scoped jobs.
//!
//! A job is queued in a [`JobStore`], claimed by a [`JobExecutor`] and run by
//! the handler registered for its name. Failed attempts back off according to
//! the job's [`RetryPolicy`]; once attempts run out the job moves to the
//! dead-letter queue, where a company user may requeue it. [`JobObserver`]s
//! watch terminal failures and completions without affecting either.

pub mod executor;
pub mod monitor;
pub mod store;
pub mod types;

pub use executor::{ExecutorStats, JobExecutor, JobExecutorConfig, JobExecutorHandle, Outcome};
pub use monitor::{JobFailed, JobObserver, JobProcessed, ProcessingFailureLogger, SlowJobLogger};
pub use store::{InMemoryJobStore, JobStats, JobStore, JobStoreError};
pub use types::{
    AttemptRecord, BackoffStrategy, DeadLetterEntry, Job, JobId, JobKind, JobResult, JobStatus,
    RetryPolicy,
};
