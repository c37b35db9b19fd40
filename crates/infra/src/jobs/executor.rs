//! Claims due jobs, runs their handlers and settles the result.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use reskill_core::TenantId;

use super::monitor::{JobFailed, JobObserver, JobProcessed};
use super::store::{JobStore, JobStoreError};
use super::types::{Job, JobKind, JobResult, JobStatus};

pub type JobHandler = Box<dyn Fn(&Job) -> JobResult + Send + Sync>;

#[derive(Debug, Clone)]
pub struct JobExecutorConfig {
    /// Sleep between polls of an empty queue.
    pub poll_interval: Duration,
    /// Worker thread name, also used in log lines.
    pub name: String,
}

impl Default for JobExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            name: "job-worker".to_string(),
        }
    }
}

impl JobExecutorConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Handle to control a running executor.
#[derive(Debug)]
pub struct JobExecutorHandle {
    shutdown: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<ExecutorStats>>,
}

impl JobExecutorHandle {
    /// Let the current job finish, then join the worker thread.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }

    pub fn stats(&self) -> ExecutorStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Counters since the worker started.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ExecutorStats {
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_dead_lettered: u64,
    pub uptime_secs: u64,
}

/// Outcome of running one claimed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    /// Failed; will be retried later.
    Retrying(String),
    /// Failed for good and moved to the dead-letter queue.
    DeadLettered(String),
}

/// Runs queued jobs through the handler registered for their name.
pub struct JobExecutor<S: JobStore> {
    store: S,
    handlers: HashMap<String, JobHandler>,
    observers: Vec<Arc<dyn JobObserver>>,
}

impl<S: JobStore> JobExecutor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
            observers: Vec::new(),
        }
    }

    /// `kind_pattern` is an exact job name, a namespace such as
    /// `"processing.*"`, or `"*"` for anything unhandled.
    pub fn register_handler<F>(&mut self, kind_pattern: impl Into<String>, handler: F)
    where
        F: Fn(&Job) -> JobResult + Send + Sync + 'static,
    {
        self.handlers.insert(kind_pattern.into(), Box::new(handler));
    }

    /// Observers are notified in registration order.
    pub fn register_observer(&mut self, observer: Arc<dyn JobObserver>) {
        self.observers.push(observer);
    }

    /// Exact name first, then the longest matching `ns.*` pattern, then `*`.
    fn handler_for(&self, kind: &JobKind) -> Option<&JobHandler> {
        let name = kind.type_name();
        self.handlers.get(name).or_else(|| {
            self.handlers
                .iter()
                .filter_map(|(pattern, handler)| {
                    let prefix = pattern.strip_suffix('*')?;
                    (prefix.is_empty() || (prefix.ends_with('.') && name.starts_with(prefix)))
                        .then_some((prefix.len(), handler))
                })
                .max_by_key(|(len, _)| *len)
                .map(|(_, handler)| handler)
        })
    }

    fn notify(&self, f: impl Fn(&dyn JobObserver)) {
        for observer in &self.observers {
            f(observer.as_ref());
        }
    }

    /// Run one attempt of a claimed job and record what happened.
    pub fn execute_one(&self, job: &mut Job) -> Result<Outcome, JobStoreError> {
        let started = Utc::now();
        let clock = Instant::now();

        let result = match self.handler_for(&job.kind) {
            Some(handler) => handler(job),
            None => {
                warn!(job_id = %job.id, job = job.name(), "no handler registered");
                JobResult::Failure(format!("no handler registered for {}", job.name()))
            }
        };
        let elapsed = clock.elapsed();

        let (error, retry_at) = match result {
            JobResult::Success => {
                job.mark_completed(started);
                self.store.update(job)?;
                debug!(job_id = %job.id, job = job.name(), ?elapsed, "job completed");
                self.notify(|o| o.job_processed(&JobProcessed { job: &*job, elapsed }));
                return Ok(Outcome::Succeeded);
            }
            JobResult::Failure(error) => (error, None),
            JobResult::RetryAfter(delay) => (
                "handler asked for a retry".to_string(),
                chrono::Duration::from_std(delay).ok(),
            ),
        };

        job.mark_failed(error.clone(), started);
        if let JobStatus::DeadLettered { attempts, .. } = job.status {
            warn!(job_id = %job.id, job = job.name(), attempts, error = %error, "job dead-lettered");
            self.store.dead_letter(job.clone(), error.clone())?;
            self.notify(|o| {
                o.job_failed(&JobFailed {
                    job: &*job,
                    error: &error,
                    attempt: attempts,
                })
            });
            return Ok(Outcome::DeadLettered(error));
        }

        if let Some(delay) = retry_at {
            job.scheduled_at = Some(Utc::now() + delay);
        }
        self.store.update(job)?;
        debug!(job_id = %job.id, job = job.name(), attempt = job.attempt, "job will be retried");
        Ok(Outcome::Retrying(error))
    }

    /// Claim and run every ready job until the store has none left.
    ///
    /// Synchronous; jobs enqueued by handlers are picked up in the same call.
    pub fn drain(&self, tenant_id: Option<TenantId>) -> Result<Vec<Outcome>, JobStoreError> {
        let mut outcomes = Vec::new();
        while let Some(mut job) = self.store.claim_next(tenant_id)? {
            outcomes.push(self.execute_one(&mut job)?);
        }
        Ok(outcomes)
    }
}

impl<S: JobStore + 'static> JobExecutor<S> {
    /// Spawn the executor in a background thread.
    pub fn spawn(self: Arc<Self>, config: JobExecutorConfig) -> std::io::Result<JobExecutorHandle> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(Mutex::new(ExecutorStats::default()));

        let join = {
            let shutdown = shutdown.clone();
            let stats = stats.clone();
            thread::Builder::new()
                .name(config.name.clone())
                .spawn(move || executor_loop(&self, &config, &shutdown, &stats))?
        };

        Ok(JobExecutorHandle {
            shutdown,
            join: Some(join),
            stats,
        })
    }
}

fn executor_loop<S: JobStore>(
    executor: &JobExecutor<S>,
    config: &JobExecutorConfig,
    shutdown: &AtomicBool,
    stats: &Mutex<ExecutorStats>,
) {
    info!(executor = %config.name, "job executor started");
    let start_time = Instant::now();

    while !shutdown.load(Ordering::SeqCst) {
        match executor.store.claim_next(None) {
            Ok(Some(mut job)) => {
                debug!(executor = %config.name, job_id = %job.id, job = job.name(), "claimed job");
                let result = executor.execute_one(&mut job);

                let mut s = stats.lock().unwrap_or_else(PoisonError::into_inner);
                s.uptime_secs = start_time.elapsed().as_secs();
                s.jobs_processed += 1;
                match result {
                    Ok(Outcome::Succeeded) => s.jobs_succeeded += 1,
                    Ok(Outcome::Retrying(_)) => s.jobs_failed += 1,
                    Ok(Outcome::DeadLettered(_)) => {
                        s.jobs_failed += 1;
                        s.jobs_dead_lettered += 1;
                    }
                    Err(e) => {
                        s.jobs_failed += 1;
                        error!(executor = %config.name, job_id = %job.id, error = %e, "failed to record job result");
                    }
                }
            }
            Ok(None) => thread::sleep(config.poll_interval),
            Err(e) => {
                error!(executor = %config.name, error = %e, "failed to claim job");
                thread::sleep(config.poll_interval);
            }
        }
    }

    info!(executor = %config.name, "job executor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::store::InMemoryJobStore;
    use crate::jobs::types::RetryPolicy;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl JobObserver for Recorder {
        fn job_failed(&self, event: &JobFailed<'_>) {
            self.seen
                .lock()
                .unwrap()
                .push(format!("failed:{}:{}", event.job.name(), event.error));
        }

        fn job_processed(&self, event: &JobProcessed<'_>) {
            self.seen
                .lock()
                .unwrap()
                .push(format!("processed:{}", event.job.name()));
        }
    }

    fn tenant() -> TenantId {
        TenantId::new(7)
    }

    #[test]
    fn successful_job_notifies_observers() {
        let store = InMemoryJobStore::arc();
        let recorder = Arc::new(Recorder::default());
        let mut executor = JobExecutor::new(store.clone());
        executor.register_handler(JobKind::ANALYZE_RESPONSE, |_job| JobResult::Success);
        executor.register_observer(recorder.clone());

        store
            .enqueue(Job::new(tenant(), JobKind::analyze_response(), serde_json::json!({})))
            .unwrap();

        let outcomes = executor.drain(Some(tenant())).unwrap();
        assert_eq!(outcomes, vec![Outcome::Succeeded]);
        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec!["processed:processing.analyze_response".to_string()]
        );
    }

    #[test]
    fn failure_reported_only_when_dead_lettered() {
        let store = InMemoryJobStore::arc();
        let recorder = Arc::new(Recorder::default());
        let mut executor = JobExecutor::new(store.clone());
        executor.register_handler("processing.*", |_job| JobResult::Failure("boom".into()));
        executor.register_observer(recorder.clone());

        let job = Job::new(tenant(), JobKind::transcribe_audio(), serde_json::json!({}))
            .with_retry_policy(RetryPolicy::fixed(2, Duration::ZERO));
        store.enqueue(job).unwrap();

        let mut claimed = store.claim_next(Some(tenant())).unwrap().unwrap();
        assert_eq!(
            executor.execute_one(&mut claimed).unwrap(),
            Outcome::Retrying("boom".into())
        );
        assert!(recorder.seen.lock().unwrap().is_empty());

        let outcomes = executor.drain(Some(tenant())).unwrap();
        assert_eq!(outcomes, vec![Outcome::DeadLettered("boom".into())]);
        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec!["failed:processing.transcribe_audio:boom".to_string()]
        );
        assert_eq!(store.list_dead_letters(tenant(), 10).unwrap().len(), 1);
    }

    #[test]
    fn missing_handler_fails_the_job() {
        let store = InMemoryJobStore::arc();
        let executor = JobExecutor::new(store.clone());

        let job = Job::new(tenant(), JobKind::custom("orphan"), serde_json::json!({}))
            .with_retry_policy(RetryPolicy::no_retry());
        store.enqueue(job).unwrap();

        let outcomes = executor.drain(None).unwrap();
        assert!(matches!(outcomes.as_slice(), [Outcome::DeadLettered(_)]));
    }

    #[test]
    fn wildcard_handler() {
        let store = InMemoryJobStore::arc();
        let mut executor = JobExecutor::new(store.clone());
        executor.register_handler("*", |_job| JobResult::Success);

        store
            .enqueue(Job::new(tenant(), JobKind::custom("anything"), serde_json::json!({})))
            .unwrap();

        assert_eq!(executor.drain(None).unwrap(), vec![Outcome::Succeeded]);
    }

    #[test]
    fn spawned_executor_runs_jobs() {
        let store = InMemoryJobStore::arc();
        let mut executor = JobExecutor::new(store.clone());
        executor.register_handler(JobKind::CAMPAIGN_INVITATION_MAIL, |_job| JobResult::Success);

        let job = Job::new(tenant(), JobKind::campaign_invitation_mail(), serde_json::json!({}));
        let id = store.enqueue(job).unwrap();

        let handle = Arc::new(executor)
            .spawn(JobExecutorConfig::default().with_poll_interval(Duration::from_millis(5)))
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.stats().jobs_succeeded == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(handle.stats().jobs_succeeded, 1);
        let job = store.get(tenant(), id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        handle.shutdown();
    }
}
