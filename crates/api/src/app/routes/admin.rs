//! Administrator routes: companies and their users.

use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use reskill_auth::{AdminRealm, CompanyIdentity, Identity, IdentityStore, hash_password};
use reskill_core::{EmailAddress, IdentityId, TenantId};

use crate::app::errors::ApiError;
use crate::app::extract::FormOrJson;
use crate::app::services::AppServices;
use crate::app::views;
use crate::context::AdminContext;
use crate::cookies;
use crate::realm::HttpRealm;

// ─────────────────────────────────────────────────────────────────────────────
// Request DTOs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateCompanyRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCompanyUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/admin", get(dashboard))
        .route("/admin/companies", post(create_company))
        .route("/admin/companies/:id/users", post(create_company_user))
        .route(
            "/admin/companies/:id/users/:user_id/deactivate",
            post(deactivate_company_user),
        )
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /admin - Companies and their campaign counts
pub async fn dashboard(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(admin): Extension<AdminContext>,
    headers: HeaderMap,
) -> Result<Html<String>, ApiError> {
    let mut rows = Vec::new();
    for company in services.companies.list()? {
        let campaigns = services.campaigns.count_campaigns(company.id)?;
        rows.push((company, campaigns));
    }

    let presented = cookies::session_id(&headers, AdminRealm::COOKIE);
    let session = services.admin.start(presented.as_ref(), Utc::now());
    Ok(Html(views::admin_dashboard(
        admin.identity(),
        &rows,
        AdminRealm::LOGOUT_PATH,
        session.csrf_token.as_str(),
    )))
}

/// POST /admin/companies - Create a company (tenant)
pub async fn create_company(
    Extension(services): Extension<Arc<AppServices>>,
    FormOrJson(body): FormOrJson<CreateCompanyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let company = services.companies.create(body.name.trim())?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": company.id, "name": company.name })),
    ))
}

/// POST /admin/companies/:id/users - Create a login for a company
pub async fn create_company_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
    FormOrJson(body): FormOrJson<CreateCompanyUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = TenantId::new(id);
    if services.companies.get(tenant_id)?.is_none() {
        return Err(ApiError::NotFound("company"));
    }
    let email = EmailAddress::parse(body.email.trim())?;
    if body.name.trim().is_empty() {
        return Err(ApiError::Validation("name is required".into()));
    }
    if body.password.len() < 8 {
        return Err(ApiError::Validation(
            "password must be at least 8 characters".into(),
        ));
    }

    let user = CompanyIdentity::new(tenant_id, body.name.trim(), email, hash_password(&body.password)?);
    services.company_identities.insert(user.clone())?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": user.id(),
            "tenant_id": tenant_id,
            "email": user.email,
            "is_active": user.is_active,
        })),
    ))
}

/// POST /admin/companies/:id/users/:user_id/deactivate - Block a company login
///
/// Existing sessions of the user stop authenticating on their next request.
pub async fn deactivate_company_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(admin): Extension<AdminContext>,
    Path((id, user_id)): Path<(i64, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = TenantId::new(id);
    let user = services
        .company_identities
        .get(IdentityId::from_uuid(user_id))?
        .filter(|u| u.tenant_id() == tenant_id)
        .ok_or(ApiError::NotFound("user"))?;

    let user = user.deactivated();
    services.company_identities.update(user.clone())?;
    info!(
        target: "reskill::security",
        admin_id = %admin.identity().id,
        identity_id = %user.id(),
        tenant_id = %tenant_id,
        "company user deactivated"
    );
    Ok(Json(json!({ "id": user.id(), "is_active": user.is_active })))
}
