//! Primary listeners for the domain events.
//!
//! One listener per event type; the routing table lives in
//! [`reskill_events::ListenerTable`].

use std::sync::Arc;

use tracing::info;

use reskill_core::TenantId;
use reskill_events::{
    AiAnalysisCompleted, AudioTranscriptionCompleted, Listener, ListenerError,
    ListenerTable, QuestionnaireResponseSubmitted,
};

use crate::campaigns::CampaignRepository;
use crate::error::RepositoryError;
use crate::jobs::{Job, JobKind, JobStore};
use crate::processing_jobs::ResponsePayload;
use crate::responses::ResponseRepository;
use crate::results::ProcessingResults;

fn repository_error(err: RepositoryError) -> ListenerError {
    match err {
        RepositoryError::NotFound(what) => ListenerError::MissingContext(what.to_string()),
        other => ListenerError::Storage(other.to_string()),
    }
}

fn enqueue(jobs: &dyn JobStore, job: Job) -> Result<(), ListenerError> {
    let name = job.name().to_string();
    let id = jobs
        .enqueue(job)
        .map_err(|e| ListenerError::Enqueue(e.to_string()))?;
    info!(job = %name, job_id = %id, "queued follow-up job");
    Ok(())
}

fn follow_up(
    tenant_id: TenantId,
    kind: JobKind,
    payload: &ResponsePayload,
) -> Result<Job, ListenerError> {
    let payload =
        serde_json::to_value(payload).map_err(|e| ListenerError::Enqueue(e.to_string()))?;
    Ok(Job::new(tenant_id, kind, payload))
}

/// Consumes the invitation and queues transcription (audio) or analysis.
pub struct ProcessQuestionnaireResponse {
    responses: Arc<ResponseRepository>,
    campaigns: Arc<CampaignRepository>,
    jobs: Arc<dyn JobStore>,
}

impl ProcessQuestionnaireResponse {
    pub fn new(
        responses: Arc<ResponseRepository>,
        campaigns: Arc<CampaignRepository>,
        jobs: Arc<dyn JobStore>,
    ) -> Self {
        Self {
            responses,
            campaigns,
            jobs,
        }
    }
}

impl Listener<QuestionnaireResponseSubmitted> for ProcessQuestionnaireResponse {
    fn name(&self) -> &'static str {
        "ProcessQuestionnaireResponse"
    }

    fn handle(&self, event: &QuestionnaireResponseSubmitted) -> Result<(), ListenerError> {
        let response = self
            .responses
            .get(event.tenant_id, event.response_id)
            .map_err(repository_error)?
            .ok_or_else(|| ListenerError::MissingContext("questionnaire response".into()))?;
        if response.invitation_id != event.invitation_id {
            return Err(ListenerError::MissingContext("invitation".into()));
        }

        self.campaigns
            .mark_invitation_consumed(event.tenant_id, event.invitation_id)
            .map_err(repository_error)?;

        let kind = if response.has_audio() {
            JobKind::transcribe_audio()
        } else {
            JobKind::analyze_response()
        };
        let job = follow_up(event.tenant_id, kind, &ResponsePayload::new(response.id))?;
        enqueue(self.jobs.as_ref(), job)
    }
}

/// Applies a staged transcript and queues the analysis.
pub struct ProcessTranscriptionResults {
    responses: Arc<ResponseRepository>,
    results: Arc<ProcessingResults>,
    jobs: Arc<dyn JobStore>,
}

impl ProcessTranscriptionResults {
    pub fn new(
        responses: Arc<ResponseRepository>,
        results: Arc<ProcessingResults>,
        jobs: Arc<dyn JobStore>,
    ) -> Self {
        Self {
            responses,
            results,
            jobs,
        }
    }
}

impl Listener<AudioTranscriptionCompleted> for ProcessTranscriptionResults {
    fn name(&self) -> &'static str {
        "ProcessTranscriptionResults"
    }

    fn handle(&self, event: &AudioTranscriptionCompleted) -> Result<(), ListenerError> {
        let mut response = self
            .responses
            .get(event.tenant_id, event.response_id)
            .map_err(repository_error)?
            .ok_or_else(|| ListenerError::MissingContext("questionnaire response".into()))?;
        let transcript = self
            .results
            .transcript(event.tenant_id, event.response_id)
            .map_err(repository_error)?
            .ok_or_else(|| ListenerError::MissingContext("transcript".into()))?;

        response.record_transcript(transcript);
        self.responses.update(response).map_err(repository_error)?;

        let job = follow_up(
            event.tenant_id,
            JobKind::analyze_response(),
            &ResponsePayload::new(event.response_id),
        )?;
        enqueue(self.jobs.as_ref(), job)
    }
}

/// Applies a staged analysis result to its response.
pub struct ProcessAiAnalysisResults {
    responses: Arc<ResponseRepository>,
    results: Arc<ProcessingResults>,
}

impl ProcessAiAnalysisResults {
    pub fn new(responses: Arc<ResponseRepository>, results: Arc<ProcessingResults>) -> Self {
        Self { responses, results }
    }
}

impl Listener<AiAnalysisCompleted> for ProcessAiAnalysisResults {
    fn name(&self) -> &'static str {
        "ProcessAIAnalysisResults"
    }

    fn handle(&self, event: &AiAnalysisCompleted) -> Result<(), ListenerError> {
        let mut response = self
            .responses
            .get(event.tenant_id, event.response_id)
            .map_err(repository_error)?
            .ok_or_else(|| ListenerError::MissingContext("questionnaire response".into()))?;
        let analysis = self
            .results
            .analysis(event.tenant_id, event.response_id)
            .map_err(repository_error)?
            .ok_or_else(|| ListenerError::MissingContext("analysis result".into()))?;

        response.record_analysis(analysis);
        self.responses.update(response).map_err(repository_error)?;
        info!(
            tenant_id = %event.tenant_id,
            response_id = %event.response_id,
            "analysis applied to response"
        );
        Ok(())
    }
}

/// The production routing table.
pub fn listener_table(
    responses: Arc<ResponseRepository>,
    campaigns: Arc<CampaignRepository>,
    results: Arc<ProcessingResults>,
    jobs: Arc<dyn JobStore>,
) -> ListenerTable {
    ListenerTable {
        questionnaire_response_submitted: Arc::new(ProcessQuestionnaireResponse::new(
            responses.clone(),
            campaigns,
            jobs.clone(),
        )),
        audio_transcription_completed: Arc::new(ProcessTranscriptionResults::new(
            responses.clone(),
            results.clone(),
            jobs,
        )),
        ai_analysis_completed: Arc::new(ProcessAiAnalysisResults::new(responses, results)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use reskill_core::{EmailAddress, ResponseId};
    use reskill_processing::{AnalysisResult, Transcript};
    use serde_json::json;

    use crate::campaigns::NewCampaign;
    use crate::jobs::InMemoryJobStore;
    use crate::responses::{QuestionnaireResponse, ResponseStatus};

    struct Fixture {
        responses: Arc<ResponseRepository>,
        campaigns: Arc<CampaignRepository>,
        results: Arc<ProcessingResults>,
        jobs: Arc<InMemoryJobStore>,
        table: ListenerTable,
    }

    const TENANT: TenantId = TenantId::new(7);

    fn fixture() -> Fixture {
        let responses = Arc::new(ResponseRepository::new());
        let campaigns = Arc::new(CampaignRepository::new());
        let results = Arc::new(ProcessingResults::new());
        let jobs = InMemoryJobStore::arc();
        let table = listener_table(
            responses.clone(),
            campaigns.clone(),
            results.clone(),
            jobs.clone(),
        );
        Fixture {
            responses,
            campaigns,
            results,
            jobs,
            table,
        }
    }

    fn submitted(f: &Fixture, audio: Option<&str>) -> QuestionnaireResponseSubmitted {
        let campaign = f
            .campaigns
            .create_campaign(TENANT, NewCampaign { name: "Spring".into(), code: None })
            .unwrap();
        let invitation = f
            .campaigns
            .create_invitation(TENANT, campaign.id, EmailAddress::parse("r@x.io").unwrap())
            .unwrap();
        let response = QuestionnaireResponse::new(
            TENANT,
            campaign.id,
            invitation.id,
            json!({"q1": "a"}),
            audio.map(str::to_string),
        )
        .unwrap();
        f.responses.insert(response.clone()).unwrap();
        QuestionnaireResponseSubmitted {
            tenant_id: TENANT,
            campaign_id: campaign.id,
            invitation_id: invitation.id,
            response_id: response.id,
            occurred_at: Utc::now(),
            metadata: None,
        }
    }

    fn queued(f: &Fixture) -> Vec<String> {
        f.jobs
            .queued(TENANT)
            .unwrap()
            .into_iter()
            .map(|j| j.name().to_string())
            .collect()
    }

    #[test]
    fn submission_without_audio_queues_analysis() {
        let f = fixture();
        let event = submitted(&f, None);

        f.table.questionnaire_response_submitted.handle(&event).unwrap();

        assert_eq!(queued(&f), vec![JobKind::ANALYZE_RESPONSE.to_string()]);
        let invitation = f
            .campaigns
            .get_invitation(TENANT, event.invitation_id)
            .unwrap()
            .unwrap();
        assert!(!invitation.is_open());
    }

    #[test]
    fn submission_with_audio_queues_transcription() {
        let f = fixture();
        let event = submitted(&f, Some("https://cdn.test/a.ogg"));

        f.table.questionnaire_response_submitted.handle(&event).unwrap();

        assert_eq!(queued(&f), vec![JobKind::TRANSCRIBE_AUDIO.to_string()]);
    }

    #[test]
    fn transcript_is_applied_then_analysis_queued() {
        let f = fixture();
        let event = submitted(&f, Some("https://cdn.test/a.ogg"));
        let transcript = Transcript {
            text: "hello".into(),
            language: Some("en".into()),
            duration_secs: Some(1.5),
        };
        f.results
            .put_transcript(TENANT, event.response_id, transcript.clone())
            .unwrap();

        f.table
            .audio_transcription_completed
            .handle(&AudioTranscriptionCompleted {
                tenant_id: TENANT,
                response_id: event.response_id,
                occurred_at: Utc::now(),
                metadata: None,
            })
            .unwrap();

        let response = f.responses.get(TENANT, event.response_id).unwrap().unwrap();
        assert_eq!(response.status, ResponseStatus::Transcribed);
        assert_eq!(response.transcript, Some(transcript));
        assert_eq!(queued(&f), vec![JobKind::ANALYZE_RESPONSE.to_string()]);
    }

    #[test]
    fn analysis_is_applied() {
        let f = fixture();
        let event = submitted(&f, None);
        f.results
            .put_analysis(TENANT, event.response_id, AnalysisResult::new(1.0, 0.5))
            .unwrap();

        f.table
            .ai_analysis_completed
            .handle(&AiAnalysisCompleted {
                tenant_id: TENANT,
                response_id: event.response_id,
                occurred_at: Utc::now(),
                metadata: None,
            })
            .unwrap();

        let response = f.responses.get(TENANT, event.response_id).unwrap().unwrap();
        assert_eq!(response.status, ResponseStatus::Analyzed);
    }

    #[test]
    fn missing_response_is_missing_context() {
        let f = fixture();
        let err = f
            .table
            .ai_analysis_completed
            .handle(&AiAnalysisCompleted {
                tenant_id: TENANT,
                response_id: ResponseId::new(),
                occurred_at: Utc::now(),
                metadata: None,
            })
            .unwrap_err();
        assert!(matches!(err, ListenerError::MissingContext(_)));
    }

    #[test]
    fn other_tenant_cannot_reach_the_response() {
        let f = fixture();
        let mut event = submitted(&f, None);
        event.tenant_id = TenantId::new(9);

        let err = f
            .table
            .questionnaire_response_submitted
            .handle(&event)
            .unwrap_err();
        assert!(matches!(err, ListenerError::MissingContext(_)));
        assert!(queued(&f).is_empty());
    }
}
