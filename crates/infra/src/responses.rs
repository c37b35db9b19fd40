//! Questionnaire responses submitted through an invitation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use reskill_core::{CampaignId, DomainError, InvitationId, ResponseId, TenantId};
use reskill_processing::{AnalysisResult, Transcript};

use crate::error::RepositoryError;
use crate::store::{InMemoryTenantStore, TenantStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Submitted,
    Transcribed,
    Analyzed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionnaireResponse {
    pub id: ResponseId,
    pub tenant_id: TenantId,
    pub campaign_id: CampaignId,
    pub invitation_id: InvitationId,
    pub answers: JsonValue,
    pub audio_url: Option<String>,
    pub status: ResponseStatus,
    pub transcript: Option<Transcript>,
    pub analysis: Option<AnalysisResult>,
    pub submitted_at: DateTime<Utc>,
}

impl QuestionnaireResponse {
    pub fn new(
        tenant_id: TenantId,
        campaign_id: CampaignId,
        invitation_id: InvitationId,
        answers: JsonValue,
        audio_url: Option<String>,
    ) -> Result<Self, DomainError> {
        if !answers.is_object() {
            return Err(DomainError::validation("answers must be an object"));
        }
        let audio_url = audio_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        Ok(Self {
            id: ResponseId::new(),
            tenant_id,
            campaign_id,
            invitation_id,
            answers,
            audio_url,
            status: ResponseStatus::Submitted,
            transcript: None,
            analysis: None,
            submitted_at: Utc::now(),
        })
    }

    pub fn has_audio(&self) -> bool {
        self.audio_url.is_some()
    }

    pub fn record_transcript(&mut self, transcript: Transcript) {
        self.transcript = Some(transcript);
        self.status = ResponseStatus::Transcribed;
    }

    pub fn record_analysis(&mut self, analysis: AnalysisResult) {
        self.analysis = Some(analysis);
        self.status = ResponseStatus::Analyzed;
    }
}

#[derive(Debug, Default)]
pub struct ResponseRepository {
    responses: InMemoryTenantStore<ResponseId, QuestionnaireResponse>,
}

impl ResponseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, response: QuestionnaireResponse) -> Result<(), RepositoryError> {
        if self.responses.get(response.tenant_id, &response.id)?.is_some() {
            return Err(RepositoryError::Conflict(format!(
                "response {} already exists",
                response.id
            )));
        }
        self.responses
            .upsert(response.tenant_id, response.id, response)
    }

    pub fn get(
        &self,
        tenant_id: TenantId,
        id: ResponseId,
    ) -> Result<Option<QuestionnaireResponse>, RepositoryError> {
        self.responses.get(tenant_id, &id)
    }

    pub fn update(&self, response: QuestionnaireResponse) -> Result<(), RepositoryError> {
        if self.responses.get(response.tenant_id, &response.id)?.is_none() {
            return Err(RepositoryError::NotFound("response"));
        }
        self.responses
            .upsert(response.tenant_id, response.id, response)
    }

    pub fn list_for_campaign(
        &self,
        tenant_id: TenantId,
        campaign_id: CampaignId,
    ) -> Result<Vec<QuestionnaireResponse>, RepositoryError> {
        let mut responses: Vec<_> = self
            .responses
            .list(tenant_id)?
            .into_iter()
            .filter(|r| r.campaign_id == campaign_id)
            .collect();
        responses.sort_by_key(|r| r.submitted_at);
        Ok(responses)
    }
}
