use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reskill_core::{CampaignId, InvitationId, ResponseId, TenantId};

/// A domain-agnostic event.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **versioned** (schema evolution)
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "ai.analysis_completed").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}

/// Messages that belong to exactly one tenant.
pub trait TenantScoped {
    fn tenant_id(&self) -> TenantId;
}

/// A respondent finished a campaign questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionnaireResponseSubmitted {
    pub tenant_id: TenantId,
    pub campaign_id: CampaignId,
    pub invitation_id: InvitationId,
    pub response_id: ResponseId,
    pub occurred_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// The transcription service produced a transcript for a response's audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTranscriptionCompleted {
    pub tenant_id: TenantId,
    pub response_id: ResponseId,
    pub occurred_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// The AI analysis of a response is available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysisCompleted {
    pub tenant_id: TenantId,
    pub response_id: ResponseId,
    pub occurred_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Closed set of events the pipeline knows how to route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    QuestionnaireResponseSubmitted(QuestionnaireResponseSubmitted),
    AudioTranscriptionCompleted(AudioTranscriptionCompleted),
    AiAnalysisCompleted(AiAnalysisCompleted),
}

impl DomainEvent {
    /// Name of the event's type as it appears in logs.
    pub fn class_name(&self) -> &'static str {
        match self {
            DomainEvent::QuestionnaireResponseSubmitted(_) => "QuestionnaireResponseSubmitted",
            DomainEvent::AudioTranscriptionCompleted(_) => "AudioTranscriptionCompleted",
            DomainEvent::AiAnalysisCompleted(_) => "AIAnalysisCompleted",
        }
    }

    pub fn metadata(&self) -> Option<&serde_json::Value> {
        match self {
            DomainEvent::QuestionnaireResponseSubmitted(e) => e.metadata.as_ref(),
            DomainEvent::AudioTranscriptionCompleted(e) => e.metadata.as_ref(),
            DomainEvent::AiAnalysisCompleted(e) => e.metadata.as_ref(),
        }
    }

    pub fn response_id(&self) -> ResponseId {
        match self {
            DomainEvent::QuestionnaireResponseSubmitted(e) => e.response_id,
            DomainEvent::AudioTranscriptionCompleted(e) => e.response_id,
            DomainEvent::AiAnalysisCompleted(e) => e.response_id,
        }
    }
}

impl Event for DomainEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::QuestionnaireResponseSubmitted(_) => "questionnaire.response_submitted",
            DomainEvent::AudioTranscriptionCompleted(_) => "audio.transcription_completed",
            DomainEvent::AiAnalysisCompleted(_) => "ai.analysis_completed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::QuestionnaireResponseSubmitted(e) => e.occurred_at,
            DomainEvent::AudioTranscriptionCompleted(e) => e.occurred_at,
            DomainEvent::AiAnalysisCompleted(e) => e.occurred_at,
        }
    }
}

impl TenantScoped for DomainEvent {
    fn tenant_id(&self) -> TenantId {
        match self {
            DomainEvent::QuestionnaireResponseSubmitted(e) => e.tenant_id,
            DomainEvent::AudioTranscriptionCompleted(e) => e.tenant_id,
            DomainEvent::AiAnalysisCompleted(e) => e.tenant_id,
        }
    }
}

impl From<QuestionnaireResponseSubmitted> for DomainEvent {
    fn from(value: QuestionnaireResponseSubmitted) -> Self {
        Self::QuestionnaireResponseSubmitted(value)
    }
}

impl From<AudioTranscriptionCompleted> for DomainEvent {
    fn from(value: AudioTranscriptionCompleted) -> Self {
        Self::AudioTranscriptionCompleted(value)
    }
}

impl From<AiAnalysisCompleted> for DomainEvent {
    fn from(value: AiAnalysisCompleted) -> Self {
        Self::AiAnalysisCompleted(value)
    }
}
