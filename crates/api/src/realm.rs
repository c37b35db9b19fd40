//! HTTP-facing properties of each authentication realm.

use chrono::{DateTime, Utc};
use tracing::warn;

use reskill_auth::{
    AdminRealm, AuthError, Authenticated, CompanyIdentity, CompanyRealm, Credentials, Identity,
    IdentityStore, Realm, SessionGuard, SessionId,
};

use crate::app::services::AppServices;

pub trait HttpRealm: Realm + Sized {
    /// Session cookie name. Each realm has its own.
    const COOKIE: &'static str;
    const LOGIN_PATH: &'static str;
    const LOGOUT_PATH: &'static str;
    /// Where a successful login lands when no intended URL was stored.
    const HOME_PATH: &'static str;

    fn guard(services: &AppServices) -> &SessionGuard<Self>;

    fn attempt(
        guard: &SessionGuard<Self>,
        presented: Option<&SessionId>,
        credentials: &Credentials,
        remember: bool,
        now: DateTime<Utc>,
    ) -> Result<Authenticated<Self::Identity>, AuthError> {
        guard.attempt(presented, credentials, remember, now)
    }

    /// Runs after the session has been rotated.
    fn after_login(_services: &AppServices, _identity: &Self::Identity, _now: DateTime<Utc>) {}
}

impl HttpRealm for AdminRealm {
    const COOKIE: &'static str = "reskill_admin_session";
    const LOGIN_PATH: &'static str = "/admin/login";
    const LOGOUT_PATH: &'static str = "/admin/logout";
    const HOME_PATH: &'static str = "/admin";

    fn guard(services: &AppServices) -> &SessionGuard<Self> {
        &services.admin
    }
}

fn is_active(identity: &CompanyIdentity) -> bool {
    identity.is_active
}

impl HttpRealm for CompanyRealm {
    const COOKIE: &'static str = "reskill_company_session";
    const LOGIN_PATH: &'static str = "/company/login";
    const LOGOUT_PATH: &'static str = "/company/logout";
    const HOME_PATH: &'static str = "/company/dashboard";

    fn guard(services: &AppServices) -> &SessionGuard<Self> {
        &services.company
    }

    fn attempt(
        guard: &SessionGuard<Self>,
        presented: Option<&SessionId>,
        credentials: &Credentials,
        remember: bool,
        now: DateTime<Utc>,
    ) -> Result<Authenticated<CompanyIdentity>, AuthError> {
        guard.attempt_when(presented, credentials, remember, now, &[&is_active])
    }

    fn after_login(services: &AppServices, identity: &CompanyIdentity, now: DateTime<Utc>) {
        if let Err(e) = services.company_identities.record_login(identity.id(), now) {
            warn!(identity_id = %identity.id(), error = %e, "could not record last login");
        }
    }
}
