//! Monitoring hooks on the job executor.
//!
//! Observers see two signals: a job that failed for good, and a job whose
//! handler returned successfully. They never influence retries.

use std::time::Duration;

use tracing::{error, warn};

use super::types::Job;

/// A job exhausted its retries (or had no retry policy) and was dead-lettered.
#[derive(Debug)]
pub struct JobFailed<'a> {
    pub job: &'a Job,
    pub error: &'a str,
    pub attempt: u32,
}

/// A job handler completed successfully.
#[derive(Debug)]
pub struct JobProcessed<'a> {
    pub job: &'a Job,
    pub elapsed: Duration,
}

/// Hook invoked by [`super::JobExecutor`] after a job settles.
pub trait JobObserver: Send + Sync {
    fn job_failed(&self, _event: &JobFailed<'_>) {}

    fn job_processed(&self, _event: &JobProcessed<'_>) {}
}

/// Logs terminal failures of processing jobs at error level.
#[derive(Debug, Clone)]
pub struct ProcessingFailureLogger {
    marker: String,
}

impl ProcessingFailureLogger {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn applies_to(&self, job_name: &str) -> bool {
        job_name.contains(&self.marker)
    }
}

impl Default for ProcessingFailureLogger {
    fn default() -> Self {
        Self::new("processing.")
    }
}

impl JobObserver for ProcessingFailureLogger {
    fn job_failed(&self, event: &JobFailed<'_>) {
        if !self.applies_to(event.job.name()) {
            return;
        }
        error!(
            target: "reskill::jobs",
            job = event.job.name(),
            job_id = %event.job.id,
            tenant_id = %event.job.tenant_id,
            attempt = event.attempt,
            error = event.error,
            payload = %event.job.payload,
            "processing job failed"
        );
    }
}

/// Warns when a job handler ran longer than the threshold.
///
/// Passive: the check happens after completion, nothing is interrupted.
#[derive(Debug, Clone)]
pub struct SlowJobLogger {
    threshold: Duration,
}

impl SlowJobLogger {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn is_slow(&self, elapsed: Duration) -> bool {
        elapsed > self.threshold
    }
}

impl Default for SlowJobLogger {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl JobObserver for SlowJobLogger {
    fn job_processed(&self, event: &JobProcessed<'_>) {
        if !self.is_slow(event.elapsed) {
            return;
        }
        warn!(
            target: "reskill::jobs",
            job = event.job.name(),
            job_id = %event.job.id,
            elapsed_secs = event.elapsed.as_secs_f64(),
            payload = %event.job.payload,
            "slow job"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_logger_matches_on_marker() {
        let logger = ProcessingFailureLogger::default();
        assert!(logger.applies_to("processing.transcribe_audio"));
        assert!(logger.applies_to("queue.processing.analyze_response"));
        assert!(!logger.applies_to("mail.campaign_invitation"));
    }

    #[test]
    fn slow_threshold_is_exclusive() {
        let logger = SlowJobLogger::default();
        assert!(!logger.is_slow(Duration::from_secs(300)));
        assert!(logger.is_slow(Duration::from_millis(300_001)));
        assert!(!logger.is_slow(Duration::from_secs(1)));
    }
}
