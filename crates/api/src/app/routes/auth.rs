//! Login and logout, generic over the realm.

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use reskill_auth::{AuthError, Credentials, SessionId};
use reskill_core::EmailAddress;

use crate::app::errors::ApiError;
use crate::app::extract::FormOrJson;
use crate::app::services::AppServices;
use crate::app::views::{self, LoginErrors};
use crate::cookies;
use crate::middleware::is_safe_redirect;
use crate::realm::HttpRealm;

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub remember: Option<String>,
}

impl LoginForm {
    fn remember(&self) -> bool {
        matches!(
            self.remember.as_deref().map(str::trim),
            Some("1" | "on" | "true" | "yes")
        )
    }
}

fn render_login<R: HttpRealm>(
    services: &AppServices,
    presented: Option<&SessionId>,
    old_email: &str,
    errors: &LoginErrors,
    status: StatusCode,
    now: DateTime<Utc>,
) -> Response {
    let session = R::guard(services).start(presented, now);
    let html = views::login_page(
        R::KIND,
        R::LOGIN_PATH,
        session.csrf_token.as_str(),
        old_email,
        errors,
    );
    let cookie = cookies::session_cookie(R::COOKIE, &session, services.config.secure_cookies);
    (status, [(header::SET_COOKIE, cookie)], Html(html)).into_response()
}

/// GET /{realm}/login - Login form, or the realm's home when already signed in.
pub async fn show_login_form<R: HttpRealm>(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
) -> Response {
    let now = Utc::now();
    let presented = cookies::session_id(&headers, R::COOKIE);
    if R::guard(&services).check(presented.as_ref(), now) {
        return Redirect::to(R::HOME_PATH).into_response();
    }
    render_login::<R>(
        &services,
        presented.as_ref(),
        "",
        &LoginErrors::default(),
        StatusCode::OK,
        now,
    )
}

/// POST /{realm}/login - Authenticate and rotate the session.
///
/// Every rejection shows the same message under the email field.
pub async fn login<R: HttpRealm>(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    FormOrJson(form): FormOrJson<LoginForm>,
) -> Response {
    let now = Utc::now();
    let presented = cookies::session_id(&headers, R::COOKIE);

    let mut errors = LoginErrors::default();
    let email = match EmailAddress::parse(form.email.trim()) {
        Ok(email) => Some(email),
        Err(_) => {
            errors.email = Some("The email must be a valid email address.".to_string());
            None
        }
    };
    if form.password.is_empty() {
        errors.password = Some("The password field is required.".to_string());
    }
    let Some(email) = email.filter(|_| errors.is_empty()) else {
        return render_login::<R>(
            &services,
            presented.as_ref(),
            &form.email,
            &errors,
            StatusCode::UNPROCESSABLE_ENTITY,
            now,
        );
    };

    let remember = form.remember();
    let credentials = Credentials::new(email, form.password.clone());
    match R::attempt(R::guard(&services), presented.as_ref(), &credentials, remember, now) {
        Ok(auth) => {
            R::after_login(&services, &auth.identity, now);
            let target = auth
                .intended_url
                .filter(|url| is_safe_redirect(url))
                .unwrap_or_else(|| R::HOME_PATH.to_string());
            let cookie =
                cookies::session_cookie(R::COOKIE, &auth.session, services.config.secure_cookies);
            ([(header::SET_COOKIE, cookie)], Redirect::to(&target)).into_response()
        }
        Err(AuthError::InvalidCredentials) => {
            warn!(target: "reskill::security", realm = %R::KIND, "login rejected");
            let errors = LoginErrors {
                email: Some(views::INVALID_CREDENTIALS.to_string()),
                password: None,
            };
            render_login::<R>(
                &services,
                presented.as_ref(),
                &form.email,
                &errors,
                StatusCode::UNPROCESSABLE_ENTITY,
                now,
            )
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// POST /{realm}/logout - End the session. Safe when already signed out.
pub async fn logout<R: HttpRealm>(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
) -> Response {
    let presented = cookies::session_id(&headers, R::COOKIE);
    let fresh = R::guard(&services).logout(presented.as_ref(), Utc::now());
    let cookie = cookies::session_cookie(R::COOKIE, &fresh, services.config.secure_cookies);
    ([(header::SET_COOKIE, cookie)], Redirect::to(R::LOGIN_PATH)).into_response()
}
