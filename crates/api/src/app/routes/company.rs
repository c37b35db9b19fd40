//! Company routes. Everything here runs behind the tenant fence, so the
//! tenant always comes from [`TenantContext`], never from the request body.

use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use reskill_auth::CompanyRealm;
use reskill_core::{CampaignId, EmailAddress};
use reskill_infra::jobs::{JobId, JobStore};
use reskill_infra::{CampaignView, NewCampaign};

use crate::app::errors::ApiError;
use crate::app::extract::FormOrJson;
use crate::app::services::AppServices;
use crate::app::views;
use crate::context::{CompanyContext, TenantContext};
use crate::cookies;
use crate::realm::HttpRealm;

/// Dead letters listed by `GET /company/jobs`.
const DEAD_LETTER_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub email: String,
}

pub fn router() -> Router {
    Router::new()
        .route("/company/dashboard", get(dashboard))
        .route("/company/campaigns", post(create_campaign))
        .route("/company/campaigns/:id/invitations", post(invite))
        .route("/company/jobs", get(jobs))
        .route("/company/jobs/:id/retry", post(retry_job))
}

/// GET /company/dashboard - The company's campaigns
pub async fn dashboard(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(user): Extension<CompanyContext>,
    headers: HeaderMap,
) -> Result<Html<String>, ApiError> {
    let company = services.companies.get(tenant.tenant_id())?;
    let campaigns = services.campaigns.list_campaigns(tenant.tenant_id())?;

    let presented = cookies::session_id(&headers, CompanyRealm::COOKIE);
    let session = services.company.start(presented.as_ref(), Utc::now());
    Ok(Html(views::company_dashboard(
        user.identity(),
        company.as_ref(),
        &campaigns,
        CompanyRealm::LOGOUT_PATH,
        session.csrf_token.as_str(),
    )))
}

/// POST /company/campaigns - Create a campaign
pub async fn create_campaign(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    FormOrJson(body): FormOrJson<NewCampaign>,
) -> Result<impl IntoResponse, ApiError> {
    let campaign = services.campaigns.create_campaign(tenant.tenant_id(), body)?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

/// POST /company/campaigns/:id/invitations - Invite a respondent by email
///
/// The token is mailed, never returned.
pub async fn invite(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    FormOrJson(body): FormOrJson<InviteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = tenant.tenant_id();
    let campaign = services
        .campaigns
        .get_campaign(tenant_id, CampaignId::from_uuid(id))?
        .ok_or(ApiError::NotFound("campaign"))?;
    let email = EmailAddress::parse(body.email.trim())?;

    let invitation = services
        .campaigns
        .create_invitation(tenant_id, campaign.id, email)?;
    let company = services.companies.get(tenant_id)?;
    let sent = services.invitations.send(
        CampaignView {
            campaign: &campaign,
            company: company.as_ref(),
        },
        &invitation,
    );
    let message_id = match sent {
        Ok(message_id) => message_id,
        Err(err) => {
            services
                .campaigns
                .discard_invitation(tenant_id, invitation.id)?;
            return Err(err.into());
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": invitation.id,
            "campaign_id": campaign.id,
            "email": invitation.email,
            "message_id": message_id.to_string(),
        })),
    ))
}

/// GET /company/jobs - Background job counters and dead letters
pub async fn jobs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = tenant.tenant_id();
    let stats = services
        .jobs
        .stats(tenant_id)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let dead_letters: Vec<_> = services
        .jobs
        .list_dead_letters(tenant_id, DEAD_LETTER_LIMIT)
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .into_iter()
        .map(|entry| {
            json!({
                "job_id": entry.job.id,
                "job": entry.job.name(),
                "attempts": entry.job.attempt,
                "reason": entry.reason,
                "dead_lettered_at": entry.dead_lettered_at,
            })
        })
        .collect();
    Ok(Json(json!({ "stats": stats, "dead_letters": dead_letters })))
}

/// POST /company/jobs/:id/retry - Put a dead-lettered job back in the queue
pub async fn retry_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    use reskill_infra::jobs::JobStoreError;

    let job = services
        .jobs
        .retry_dead_letter(tenant.tenant_id(), JobId(id))
        .map_err(|e| match e {
            JobStoreError::NotFound(_) | JobStoreError::TenantIsolation => {
                ApiError::NotFound("job")
            }
            other => ApiError::Internal(other.to_string()),
        })?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "job_id": job.id, "job": job.name() })),
    ))
}
