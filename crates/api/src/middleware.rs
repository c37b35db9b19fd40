//! Realm guards, the tenant fence and anti-forgery checks.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use chrono::{DateTime, Utc};
use tracing::warn;

use reskill_auth::{AdminRealm, CompanyRealm, Identity, SessionId};
use reskill_core::TenantId;

use crate::app::errors::{ApiError, json_error};
use crate::app::services::AppServices;
use crate::context::{AdminContext, CompanyContext, TenantContext};
use crate::cookies;
use crate::realm::HttpRealm;

/// Largest form body buffered while looking for `_token`.
const MAX_FORM_BYTES: usize = 64 * 1024;

/// Query parameter a request uses to name the company it acts for.
pub const TENANT_PARAM: &str = "company_id";

/// Same-site relative paths only; `//host` and backslash tricks are refused.
pub fn is_safe_redirect(target: &str) -> bool {
    target.starts_with('/') && !target.starts_with("//") && !target.contains('\\')
}

/// Send an unauthenticated visitor to the realm's login page. GET requests
/// have their path stored on the guest session for the post-login redirect.
fn redirect_to_login<R: HttpRealm>(
    services: &AppServices,
    presented: Option<&SessionId>,
    req: &Request,
    now: DateTime<Utc>,
) -> Response {
    let intended = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .filter(|target| is_safe_redirect(target));

    match intended {
        Some(target) if req.method() == Method::GET => {
            let session = R::guard(services).remember_intended(presented, target, now);
            let cookie = cookies::session_cookie(R::COOKIE, &session, services.config.secure_cookies);
            ([(header::SET_COOKIE, cookie)], Redirect::to(R::LOGIN_PATH)).into_response()
        }
        _ => ApiError::Unauthenticated(R::LOGIN_PATH).into_response(),
    }
}

/// Admin routes: require an authenticated administrator.
pub async fn admin_guard(
    State(services): State<Arc<AppServices>>,
    mut req: Request,
    next: Next,
) -> Response {
    let now = Utc::now();
    let presented = cookies::session_id(req.headers(), AdminRealm::COOKIE);

    match services.admin.user(presented.as_ref(), now) {
        Some(identity) => {
            req.extensions_mut().insert(AdminContext::new(identity));
            next.run(req).await
        }
        None => redirect_to_login::<AdminRealm>(&services, presented.as_ref(), &req, now),
    }
}

/// Company routes: require an authenticated company user and pin the request
/// to that user's tenant.
///
/// A `company_id` naming any other tenant is refused with 403 before the
/// handler runs. Without one, the user's own tenant is put in the context.
pub async fn tenant_fence(
    State(services): State<Arc<AppServices>>,
    mut req: Request,
    next: Next,
) -> Response {
    let now = Utc::now();
    let presented = cookies::session_id(req.headers(), CompanyRealm::COOKIE);

    let Some(identity) = services.company.user(presented.as_ref(), now) else {
        return redirect_to_login::<CompanyRealm>(&services, presented.as_ref(), &req, now);
    };
    let tenant_id = identity.tenant_id();

    if let Some(claimed) = mismatched_claim(req.uri().query(), tenant_id) {
        warn!(
            target: "reskill::security",
            identity_id = %identity.id(),
            tenant_id = %tenant_id,
            claimed = %claimed,
            path = %req.uri().path(),
            "tenant mismatch"
        );
        return ApiError::Forbidden.into_response();
    }

    req.extensions_mut().insert(TenantContext::new(tenant_id));
    req.extensions_mut().insert(CompanyContext::new(identity));
    next.run(req).await
}

/// The first `company_id` value in `query` that does not name `tenant_id`.
///
/// Every occurrence is checked; a value that is not a number never matches.
fn mismatched_claim(query: Option<&str>, tenant_id: TenantId) -> Option<String> {
    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key == TENANT_PARAM)
        .map(|(_, value)| value)
        .find(|value| value.trim().parse::<i64>().ok() != Some(tenant_id.get()))
        .map(|value| value.into_owned())
}

/// Unsafe methods must present the realm session's anti-forgery token, as
/// an `X-CSRF-Token` header or a `_token` form field.
pub async fn verify_csrf<R: HttpRealm>(
    State(services): State<Arc<AppServices>>,
    req: Request,
    next: Next,
) -> Response {
    if req.method().is_safe() {
        return next.run(req).await;
    }

    let presented = cookies::session_id(req.headers(), R::COOKIE);
    let header_token = req
        .headers()
        .get("x-csrf-token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let (token, req) = match header_token {
        Some(token) => (Some(token), req),
        None if is_form(req.headers()) => {
            let (parts, body) = req.into_parts();
            let Ok(bytes) = axum::body::to_bytes(body, MAX_FORM_BYTES).await else {
                return json_error(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "payload_too_large",
                    "form body is too large",
                );
            };
            let token = url::form_urlencoded::parse(&bytes)
                .find(|(key, _)| key == "_token")
                .map(|(_, value)| value.into_owned());
            (token, Request::from_parts(parts, Body::from(bytes)))
        }
        None => (None, req),
    };

    let valid = token
        .is_some_and(|t| R::guard(&services).verify_csrf(presented.as_ref(), &t, Utc::now()));
    if !valid {
        warn!(
            target: "reskill::security",
            realm = %R::KIND,
            method = %req.method(),
            path = %req.uri().path(),
            "anti-forgery token mismatch"
        );
        return ApiError::CsrfMismatch.into_response();
    }

    next.run(req).await
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().starts_with("application/x-www-form-urlencoded"))
}
