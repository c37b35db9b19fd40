//! Public invitation landing. The token in the path is the only credential.

use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tracing::info;

use reskill_events::{DomainEvent, QuestionnaireResponseSubmitted};
use reskill_infra::{Campaign, CampaignInvitation, QuestionnaireResponse};

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::app::views;

#[derive(Debug, Deserialize)]
pub struct SubmitResponseRequest {
    pub answers: JsonValue,
    #[serde(default)]
    pub audio_url: Option<String>,
}

pub fn router() -> Router {
    Router::new().route("/i/:token", get(show).post(submit))
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Html(views::not_found_page())).into_response()
}

/// The open invitation for `token` and its campaign. Unknown, consumed and
/// orphaned invitations all look the same to the caller.
fn open_invitation(
    services: &AppServices,
    token: &str,
) -> Result<Option<(CampaignInvitation, Campaign)>, ApiError> {
    let Some(invitation) = services
        .campaigns
        .find_invitation_by_token(token)?
        .filter(|inv| inv.is_open())
    else {
        return Ok(None);
    };
    let campaign = services
        .campaigns
        .get_campaign(invitation.tenant_id, invitation.campaign_id)?;
    Ok(campaign.map(|campaign| (invitation, campaign)))
}

/// GET /i/:token - Questionnaire landing page
pub async fn show(
    Extension(services): Extension<Arc<AppServices>>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    let Some((_, campaign)) = open_invitation(&services, &token)? else {
        return Ok(not_found());
    };
    let company = services.companies.get(campaign.tenant_id)?;
    Ok(Html(views::invitation_page(&campaign, company.as_ref())).into_response())
}

/// POST /i/:token - Submit questionnaire answers
pub async fn submit(
    Extension(services): Extension<Arc<AppServices>>,
    Path(token): Path<String>,
    Json(body): Json<SubmitResponseRequest>,
) -> Result<Response, ApiError> {
    let Some((invitation, campaign)) = open_invitation(&services, &token)? else {
        return Ok(not_found());
    };

    let response = QuestionnaireResponse::new(
        invitation.tenant_id,
        campaign.id,
        invitation.id,
        body.answers,
        body.audio_url,
    )?;
    let response_id = response.id;
    services.responses.insert(response)?;

    services
        .dispatcher
        .dispatch(&DomainEvent::from(QuestionnaireResponseSubmitted {
            tenant_id: invitation.tenant_id,
            campaign_id: campaign.id,
            invitation_id: invitation.id,
            response_id,
            occurred_at: Utc::now(),
            metadata: None,
        }))?;

    info!(
        tenant_id = %invitation.tenant_id,
        campaign_id = %campaign.id,
        response_id = %response_id,
        "questionnaire response submitted"
    );
    Ok((StatusCode::ACCEPTED, Json(json!({ "response_id": response_id }))).into_response())
}
