//! Handlers for `processing.*` jobs.
//!
//! Each handler calls a processing backend, stages the output in
//! [`ProcessingResults`] and announces completion through the dispatcher.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use reskill_core::ResponseId;
use reskill_events::{
    AiAnalysisCompleted, AudioTranscriptionCompleted, DomainEvent, EventDispatcher,
};
use reskill_processing::{AnalysisInput, Analyzer, Transcriber};

use crate::jobs::{Job, JobExecutor, JobKind, JobResult, JobStore};
use crate::responses::{QuestionnaireResponse, ResponseRepository};
use crate::results::ProcessingResults;

/// Payload of every processing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePayload {
    pub response_id: ResponseId,
}

impl ResponsePayload {
    pub fn new(response_id: ResponseId) -> Self {
        Self { response_id }
    }

    pub fn from_job(job: &Job) -> Result<Self, String> {
        serde_json::from_value(job.payload.clone())
            .map_err(|e| format!("invalid payload for {}: {e}", job.name()))
    }
}

pub struct ProcessingJobs {
    responses: Arc<ResponseRepository>,
    results: Arc<ProcessingResults>,
    transcriber: Arc<dyn Transcriber>,
    analyzer: Arc<dyn Analyzer>,
    dispatcher: Arc<EventDispatcher>,
}

impl ProcessingJobs {
    pub fn new(
        responses: Arc<ResponseRepository>,
        results: Arc<ProcessingResults>,
        transcriber: Arc<dyn Transcriber>,
        analyzer: Arc<dyn Analyzer>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Self {
        Self {
            responses,
            results,
            transcriber,
            analyzer,
            dispatcher,
        }
    }

    /// Install both handlers on an executor.
    pub fn register<S: JobStore>(self: Arc<Self>, executor: &mut JobExecutor<S>) {
        let this = self.clone();
        executor.register_handler(JobKind::TRANSCRIBE_AUDIO, move |job| {
            this.transcribe_audio(job)
        });
        executor.register_handler(JobKind::ANALYZE_RESPONSE, move |job| {
            self.analyze_response(job)
        });
    }

    pub fn transcribe_audio(&self, job: &Job) -> JobResult {
        into_job_result(self.try_transcribe(job))
    }

    pub fn analyze_response(&self, job: &Job) -> JobResult {
        into_job_result(self.try_analyze(job))
    }

    fn load(&self, job: &Job) -> Result<QuestionnaireResponse, String> {
        let payload = ResponsePayload::from_job(job)?;
        self.responses
            .get(job.tenant_id, payload.response_id)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("questionnaire response {} not found", payload.response_id))
    }

    fn try_transcribe(&self, job: &Job) -> Result<(), String> {
        let response = self.load(job)?;
        let audio_url = response
            .audio_url
            .as_deref()
            .ok_or_else(|| format!("response {} has no audio", response.id))?;

        let transcript = self
            .transcriber
            .transcribe(audio_url)
            .map_err(|e| e.to_string())?;
        self.results
            .put_transcript(job.tenant_id, response.id, transcript)
            .map_err(|e| e.to_string())?;
        debug!(response_id = %response.id, "transcript staged");

        let event = DomainEvent::from(AudioTranscriptionCompleted {
            tenant_id: job.tenant_id,
            response_id: response.id,
            occurred_at: Utc::now(),
            metadata: Some(json!({ "job_id": job.id, "attempt": job.attempt })),
        });
        self.dispatcher.dispatch(&event).map_err(|e| e.to_string())
    }

    fn try_analyze(&self, job: &Job) -> Result<(), String> {
        let response = self.load(job)?;
        let input = AnalysisInput {
            answers: response.answers.clone(),
            transcript: response.transcript.as_ref().map(|t| t.text.clone()),
        };

        let analysis = self.analyzer.analyze(&input).map_err(|e| e.to_string())?;
        let score = analysis.score;
        self.results
            .put_analysis(job.tenant_id, response.id, analysis)
            .map_err(|e| e.to_string())?;
        debug!(response_id = %response.id, score, "analysis staged");

        let event = DomainEvent::from(AiAnalysisCompleted {
            tenant_id: job.tenant_id,
            response_id: response.id,
            occurred_at: Utc::now(),
            metadata: Some(json!({ "job_id": job.id, "attempt": job.attempt })),
        });
        self.dispatcher.dispatch(&event).map_err(|e| e.to_string())
    }
}

fn into_job_result(result: Result<(), String>) -> JobResult {
    match result {
        Ok(()) => JobResult::Success,
        Err(error) => JobResult::Failure(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reskill_core::{CampaignId, InvitationId, TenantId};
    use reskill_processing::LocalProcessor;

    use crate::campaigns::CampaignRepository;
    use crate::jobs::{InMemoryJobStore, JobStatus};
    use crate::listeners::listener_table;
    use crate::responses::ResponseStatus;

    const TENANT: TenantId = TenantId::new(7);

    fn setup() -> (Arc<ResponseRepository>, Arc<InMemoryJobStore>, JobExecutor<Arc<InMemoryJobStore>>) {
        let responses = Arc::new(ResponseRepository::new());
        let results = Arc::new(ProcessingResults::new());
        let jobs = InMemoryJobStore::arc();
        let dispatcher = Arc::new(EventDispatcher::new(listener_table(
            responses.clone(),
            Arc::new(CampaignRepository::new()),
            results.clone(),
            jobs.clone(),
        )));
        let handlers = Arc::new(ProcessingJobs::new(
            responses.clone(),
            results,
            Arc::new(LocalProcessor),
            Arc::new(LocalProcessor),
            dispatcher,
        ));
        let mut executor = JobExecutor::new(jobs.clone());
        handlers.register(&mut executor);
        (responses, jobs, executor)
    }

    fn stored_response(responses: &ResponseRepository, audio: Option<&str>) -> ResponseId {
        let response = QuestionnaireResponse::new(
            TENANT,
            CampaignId::new(),
            InvitationId::new(),
            json!({"q1": "a", "q2": ""}),
            audio.map(str::to_string),
        )
        .unwrap();
        let id = response.id;
        responses.insert(response).unwrap();
        id
    }

    fn job(kind: JobKind, id: ResponseId) -> Job {
        Job::new(TENANT, kind, serde_json::to_value(ResponsePayload::new(id)).unwrap())
    }

    #[test]
    fn transcription_chains_into_analysis() {
        let (responses, jobs, executor) = setup();
        let id = stored_response(&responses, Some("https://cdn.test/a.ogg"));
        jobs.enqueue(job(JobKind::transcribe_audio(), id)).unwrap();

        executor.drain(Some(TENANT)).unwrap();

        let response = responses.get(TENANT, id).unwrap().unwrap();
        assert_eq!(response.status, ResponseStatus::Analyzed);
        assert!(response.transcript.is_some());
        let analysis = response.analysis.unwrap();
        assert_eq!(analysis.summary.as_deref(), Some("1 of 2 questions answered"));
    }

    #[test]
    fn unknown_response_fails_the_job() {
        let (_responses, jobs, executor) = setup();
        let id = jobs
            .enqueue(job(JobKind::analyze_response(), ResponseId::new()))
            .unwrap();

        let mut claimed = jobs.claim_next(Some(TENANT)).unwrap().unwrap();
        executor.execute_one(&mut claimed).unwrap();

        let stored = jobs.get(TENANT, id).unwrap().unwrap();
        assert!(matches!(stored.status, JobStatus::Failed { .. }));
    }

    #[test]
    fn malformed_payload_is_reported() {
        let bad = Job::new(TENANT, JobKind::analyze_response(), json!({"nope": 1}));
        let err = ResponsePayload::from_job(&bad).unwrap_err();
        assert!(err.contains("processing.analyze_response"));
    }
}
