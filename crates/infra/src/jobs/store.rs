//! Where queued, running and dead-lettered jobs live.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::Serialize;

use reskill_core::TenantId;

use super::types::{DeadLetterEntry, Job, JobId, JobStatus};

/// Tenant-scoped job queue with a dead-letter side table.
///
/// Every lookup that takes a `TenantId` refuses to hand out another tenant's
/// job with [`JobStoreError::TenantIsolation`].
pub trait JobStore: Send + Sync {
    fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError>;

    fn get(&self, tenant_id: TenantId, job_id: JobId) -> Result<Option<Job>, JobStoreError>;

    /// Persist the state of a job returned by `claim_next`.
    fn update(&self, job: &Job) -> Result<(), JobStoreError>;

    /// Mark the oldest due job as running and return it.
    fn claim_next(&self, tenant_id: Option<TenantId>) -> Result<Option<Job>, JobStoreError>;

    /// Jobs waiting for an attempt, oldest first.
    fn queued(&self, tenant_id: TenantId) -> Result<Vec<Job>, JobStoreError>;

    fn dead_letter(&self, job: Job, reason: String) -> Result<(), JobStoreError>;

    fn list_dead_letters(
        &self,
        tenant_id: TenantId,
        limit: usize,
    ) -> Result<Vec<DeadLetterEntry>, JobStoreError>;

    /// Put a dead-lettered job back in the queue with a clean attempt count.
    fn retry_dead_letter(&self, tenant_id: TenantId, job_id: JobId) -> Result<Job, JobStoreError>;

    fn stats(&self, tenant_id: TenantId) -> Result<JobStats, JobStoreError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job belongs to another tenant")]
    TenantIsolation,
    #[error("job already queued: {0}")]
    AlreadyExists(JobId),
    #[error("job store unavailable: {0}")]
    Storage(String),
}

/// Per-tenant counts shown on the company jobs page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    /// Failed at least once and waiting for a retry.
    pub retrying: usize,
    pub dead_lettered: usize,
}

/// Completed jobs kept for lookup after they leave the queue.
pub const COMPLETED_RETAINED: usize = 1024;

#[derive(Debug, Default)]
struct Queues {
    /// Pending, running and retrying jobs only.
    jobs: HashMap<JobId, Job>,
    dead_letters: HashMap<JobId, DeadLetterEntry>,
    /// Most recent completions, oldest at the front.
    completed: VecDeque<Job>,
    completed_counts: HashMap<TenantId, usize>,
}

impl Queues {
    fn retire(&mut self, job: Job) {
        *self.completed_counts.entry(job.tenant_id).or_default() += 1;
        if self.completed.len() == COMPLETED_RETAINED {
            self.completed.pop_front();
        }
        self.completed.push_back(job);
    }
}

/// Process-local store used by the server and the tests.
///
/// Completed jobs leave the queue; only the last [`COMPLETED_RETAINED`]
/// stay readable through `get`, while `stats` keeps counting all of them.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    queues: RwLock<Queues>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Queues>, JobStoreError> {
        self.queues
            .read()
            .map_err(|_| JobStoreError::Storage("lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Queues>, JobStoreError> {
        self.queues
            .write()
            .map_err(|_| JobStoreError::Storage("lock poisoned".into()))
    }
}

fn owned_by(job: &Job, tenant_id: TenantId) -> Result<(), JobStoreError> {
    if job.tenant_id == tenant_id {
        Ok(())
    } else {
        Err(JobStoreError::TenantIsolation)
    }
}

impl JobStore for InMemoryJobStore {
    fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError> {
        let mut q = self.write()?;
        let id = job.id;
        if q.jobs.contains_key(&id) || q.dead_letters.contains_key(&id) {
            return Err(JobStoreError::AlreadyExists(id));
        }
        q.jobs.insert(id, job);
        Ok(id)
    }

    fn get(&self, tenant_id: TenantId, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        let q = self.read()?;
        let found = q
            .jobs
            .get(&job_id)
            .or_else(|| q.completed.iter().rev().find(|j| j.id == job_id));
        let Some(job) = found else {
            return Ok(None);
        };
        owned_by(job, tenant_id)?;
        Ok(Some(job.clone()))
    }

    fn update(&self, job: &Job) -> Result<(), JobStoreError> {
        let mut q = self.write()?;
        if job.status == JobStatus::Completed {
            q.jobs.remove(&job.id).ok_or(JobStoreError::NotFound(job.id))?;
            q.retire(job.clone());
            return Ok(());
        }
        let slot = q.jobs.get_mut(&job.id).ok_or(JobStoreError::NotFound(job.id))?;
        *slot = job.clone();
        Ok(())
    }

    fn claim_next(&self, tenant_id: Option<TenantId>) -> Result<Option<Job>, JobStoreError> {
        let now = Utc::now();
        let mut q = self.write()?;
        let next = q
            .jobs
            .values_mut()
            .filter(|j| {
                j.status.is_waiting()
                    && j.is_due(now)
                    && tenant_id.is_none_or(|t| j.tenant_id == t)
            })
            .min_by_key(|j| (j.created_at, j.id.0));

        Ok(next.map(|job| {
            job.mark_running();
            job.clone()
        }))
    }

    fn queued(&self, tenant_id: TenantId) -> Result<Vec<Job>, JobStoreError> {
        let q = self.read()?;
        let mut waiting: Vec<Job> = q
            .jobs
            .values()
            .filter(|j| j.tenant_id == tenant_id && j.status.is_waiting())
            .cloned()
            .collect();
        waiting.sort_by_key(|j| (j.created_at, j.id.0));
        Ok(waiting)
    }

    fn dead_letter(&self, mut job: Job, reason: String) -> Result<(), JobStoreError> {
        let mut q = self.write()?;
        q.jobs.remove(&job.id);

        let now = Utc::now();
        job.status = JobStatus::DeadLettered {
            error: reason.clone(),
            attempts: job.attempt,
        };
        job.updated_at = now;
        q.dead_letters.insert(
            job.id,
            DeadLetterEntry {
                job,
                dead_lettered_at: now,
                reason,
            },
        );
        Ok(())
    }

    fn list_dead_letters(
        &self,
        tenant_id: TenantId,
        limit: usize,
    ) -> Result<Vec<DeadLetterEntry>, JobStoreError> {
        let q = self.read()?;
        let mut entries: Vec<DeadLetterEntry> = q
            .dead_letters
            .values()
            .filter(|e| e.job.tenant_id == tenant_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.dead_lettered_at);
        entries.truncate(limit);
        Ok(entries)
    }

    fn retry_dead_letter(&self, tenant_id: TenantId, job_id: JobId) -> Result<Job, JobStoreError> {
        let mut q = self.write()?;
        let entry = q
            .dead_letters
            .get(&job_id)
            .ok_or(JobStoreError::NotFound(job_id))?;
        owned_by(&entry.job, tenant_id)?;

        let Some(DeadLetterEntry { mut job, .. }) = q.dead_letters.remove(&job_id) else {
            return Err(JobStoreError::NotFound(job_id));
        };
        job.reset();
        q.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    fn stats(&self, tenant_id: TenantId) -> Result<JobStats, JobStoreError> {
        let q = self.read()?;
        let mut stats = JobStats {
            completed: q.completed_counts.get(&tenant_id).copied().unwrap_or(0),
            ..JobStats::default()
        };
        for job in q.jobs.values().filter(|j| j.tenant_id == tenant_id) {
            let counter = match job.status {
                JobStatus::Pending => &mut stats.pending,
                JobStatus::Running => &mut stats.running,
                JobStatus::Completed => &mut stats.completed,
                JobStatus::Failed { .. } => &mut stats.retrying,
                JobStatus::DeadLettered { .. } => &mut stats.dead_lettered,
            };
            *counter += 1;
        }
        stats.dead_lettered += q
            .dead_letters
            .values()
            .filter(|e| e.job.tenant_id == tenant_id)
            .count();
        Ok(stats)
    }
}

impl<S: JobStore + ?Sized> JobStore for Arc<S> {
    fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError> {
        (**self).enqueue(job)
    }

    fn get(&self, tenant_id: TenantId, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        (**self).get(tenant_id, job_id)
    }

    fn update(&self, job: &Job) -> Result<(), JobStoreError> {
        (**self).update(job)
    }

    fn claim_next(&self, tenant_id: Option<TenantId>) -> Result<Option<Job>, JobStoreError> {
        (**self).claim_next(tenant_id)
    }

    fn queued(&self, tenant_id: TenantId) -> Result<Vec<Job>, JobStoreError> {
        (**self).queued(tenant_id)
    }

    fn dead_letter(&self, job: Job, reason: String) -> Result<(), JobStoreError> {
        (**self).dead_letter(job, reason)
    }

    fn list_dead_letters(
        &self,
        tenant_id: TenantId,
        limit: usize,
    ) -> Result<Vec<DeadLetterEntry>, JobStoreError> {
        (**self).list_dead_letters(tenant_id, limit)
    }

    fn retry_dead_letter(&self, tenant_id: TenantId, job_id: JobId) -> Result<Job, JobStoreError> {
        (**self).retry_dead_letter(tenant_id, job_id)
    }

    fn stats(&self, tenant_id: TenantId) -> Result<JobStats, JobStoreError> {
        (**self).stats(tenant_id)
    }
}
