//! Staging area for outputs of the processing backends.
//!
//! Job handlers park a result here, then raise a completion event that only
//! carries ids; the event's listener picks the result up and applies it.

use reskill_core::{ResponseId, TenantId};
use reskill_processing::{AnalysisResult, Transcript};

use crate::error::RepositoryError;
use crate::store::{InMemoryTenantStore, TenantStore};

#[derive(Debug, Default)]
pub struct ProcessingResults {
    transcripts: InMemoryTenantStore<ResponseId, Transcript>,
    analyses: InMemoryTenantStore<ResponseId, AnalysisResult>,
}

impl ProcessingResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_transcript(
        &self,
        tenant_id: TenantId,
        response_id: ResponseId,
        transcript: Transcript,
    ) -> Result<(), RepositoryError> {
        self.transcripts.upsert(tenant_id, response_id, transcript)
    }

    pub fn transcript(
        &self,
        tenant_id: TenantId,
        response_id: ResponseId,
    ) -> Result<Option<Transcript>, RepositoryError> {
        self.transcripts.get(tenant_id, &response_id)
    }

    pub fn put_analysis(
        &self,
        tenant_id: TenantId,
        response_id: ResponseId,
        analysis: AnalysisResult,
    ) -> Result<(), RepositoryError> {
        self.analyses.upsert(tenant_id, response_id, analysis)
    }

    pub fn analysis(
        &self,
        tenant_id: TenantId,
        response_id: ResponseId,
    ) -> Result<Option<AnalysisResult>, RepositoryError> {
        self.analyses.get(tenant_id, &response_id)
    }
}
