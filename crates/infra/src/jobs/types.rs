//! Jobs, their names and retry policies.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use reskill_core::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dotted job name, `<namespace>.<action>`. Handlers are looked up by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobKind(String);

impl JobKind {
    pub const TRANSCRIBE_AUDIO: &'static str = "processing.transcribe_audio";
    pub const ANALYZE_RESPONSE: &'static str = "processing.analyze_response";
    pub const CAMPAIGN_INVITATION_MAIL: &'static str = "mail.campaign_invitation";

    pub fn transcribe_audio() -> Self {
        Self(Self::TRANSCRIBE_AUDIO.into())
    }

    pub fn analyze_response() -> Self {
        Self(Self::ANALYZE_RESPONSE.into())
    }

    pub fn campaign_invitation_mail() -> Self {
        Self(Self::CAMPAIGN_INVITATION_MAIL.into())
    }

    pub fn custom(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn type_name(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    /// Waiting for another attempt.
    Failed { error: String, attempt: u32 },
    /// Out of attempts; lives in the dead-letter queue.
    DeadLettered { error: String, attempts: u32 },
}

impl JobStatus {
    /// Queued for a first or later attempt.
    pub fn is_waiting(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Fixed,
    /// `base * 2^(attempt - 1)`
    #[default]
    Exponential,
}

/// How often a failing job is retried and how long it waits in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, the first one included. 0 and 1 both mean no retry.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(600),
            strategy: BackoffStrategy::Exponential,
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// Wait before the attempt following attempt number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = match (attempt, self.strategy) {
            (0, _) => Duration::ZERO,
            (_, BackoffStrategy::Fixed) => self.base_delay,
            (n, BackoffStrategy::Exponential) => self
                .base_delay
                .saturating_mul(1u32.checked_shl(n - 1).unwrap_or(u32::MAX)),
        };
        delay.min(self.max_delay)
    }

    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

/// One finished attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// `None` for a successful attempt.
    pub error: Option<String>,
}

/// A tenant-scoped unit of background work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub tenant_id: TenantId,
    pub kind: JobKind,
    /// Identifiers only. Payloads are logged by the monitoring observers, so
    /// they must never carry secrets.
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub retry_policy: RetryPolicy,
    /// Attempts started so far.
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Earliest time of the next attempt, set by backoff.
    pub scheduled_at: Option<DateTime<Utc>>,
    pub history: Vec<AttemptRecord>,
}

impl Job {
    pub fn new(tenant_id: TenantId, kind: JobKind, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            tenant_id,
            kind,
            payload,
            status: JobStatus::Pending,
            retry_policy: RetryPolicy::default(),
            attempt: 0,
            created_at: now,
            updated_at: now,
            scheduled_at: None,
            history: Vec::new(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn name(&self) -> &str {
        self.kind.type_name()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at.is_none_or(|at| at <= now)
    }

    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        self.attempt += 1;
        self.updated_at = Utc::now();
    }

    fn record(&mut self, started_at: DateTime<Utc>, error: Option<String>) -> DateTime<Utc> {
        let now = Utc::now();
        self.updated_at = now;
        self.history.push(AttemptRecord {
            attempt: self.attempt,
            started_at,
            finished_at: now,
            error,
        });
        now
    }

    pub fn mark_completed(&mut self, started_at: DateTime<Utc>) {
        self.record(started_at, None);
        self.status = JobStatus::Completed;
        self.scheduled_at = None;
    }

    /// Record a failed attempt. The job is rescheduled while the policy allows
    /// it and dead-lettered after that.
    pub fn mark_failed(&mut self, error: String, started_at: DateTime<Utc>) {
        let now = self.record(started_at, Some(error.clone()));
        if self.retry_policy.should_retry(self.attempt) {
            let delay = self.retry_policy.delay_for_attempt(self.attempt);
            self.scheduled_at = Some(now + chrono::Duration::from_std(delay).unwrap_or_default());
            self.status = JobStatus::Failed {
                error,
                attempt: self.attempt,
            };
        } else {
            self.status = JobStatus::DeadLettered {
                error,
                attempts: self.attempt,
            };
        }
    }

    /// Back to a fresh, immediately due job.
    pub fn reset(&mut self) {
        self.status = JobStatus::Pending;
        self.attempt = 0;
        self.scheduled_at = None;
        self.history.clear();
        self.updated_at = Utc::now();
    }
}

/// What a handler reports for one attempt.
#[derive(Debug)]
pub enum JobResult {
    Success,
    Failure(String),
    /// Retry after this delay instead of the policy's backoff.
    RetryAfter(Duration),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub job: Job,
    pub dead_lettered_at: DateTime<Utc>,
    pub reason: String,
}
