use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use reskill_auth::AuthError;
use reskill_core::DomainError;
use reskill_events::DispatchError;
use reskill_infra::RepositoryError;
use reskill_infra::mail::MailError;

use crate::app::views;

/// Status used for a stale or missing anti-forgery token ("page expired").
pub fn page_expired_status() -> StatusCode {
    StatusCode::from_u16(419).unwrap_or(StatusCode::FORBIDDEN)
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// No valid session for the realm; carries that realm's login path.
    #[error("unauthenticated")]
    Unauthenticated(&'static str),

    #[error("forbidden")]
    Forbidden,

    #[error("page expired")]
    CsrfMismatch,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    /// Defects and infrastructure failures. The detail is logged, never sent.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthenticated(login_path) => Redirect::to(login_path).into_response(),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, Html(views::forbidden_page())).into_response(),
            ApiError::CsrfMismatch => {
                (page_expired_status(), Html(views::page_expired())).into_response()
            }
            ApiError::NotFound(what) => {
                json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
            }
            ApiError::Validation(msg) => {
                json_error(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg)
            }
            ApiError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
            ApiError::Internal(detail) => {
                error!(error = %detail, "request failed");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "something went wrong",
                )
            }
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => ApiError::Validation(msg),
            DomainError::InvariantViolation(msg) => ApiError::Conflict(msg),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Domain(e) => e.into(),
            RepositoryError::NotFound(what) => ApiError::NotFound(what),
            RepositoryError::Conflict(msg) => ApiError::Conflict(msg),
            RepositoryError::Storage(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::DuplicateEmail => ApiError::Conflict(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_detail_is_not_sent() {
        let res = ApiError::from(MailError::MissingConfig("APP_PUBLIC_URL")).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn repository_errors_map_to_statuses() {
        let status = |e: RepositoryError| ApiError::from(e).into_response().status();
        assert_eq!(status(RepositoryError::NotFound("campaign")), StatusCode::NOT_FOUND);
        assert_eq!(status(RepositoryError::Conflict("taken".into())), StatusCode::CONFLICT);
        assert_eq!(
            status(DomainError::validation("name is required").into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(RepositoryError::Storage("poisoned".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn csrf_mismatch_is_419() {
        assert_eq!(ApiError::CsrfMismatch.into_response().status().as_u16(), 419);
    }
}
