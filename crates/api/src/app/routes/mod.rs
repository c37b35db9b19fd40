use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

use reskill_auth::{AdminRealm, CompanyRealm};

use crate::app::services::AppServices;
use crate::middleware;

pub mod admin;
pub mod auth;
pub mod company;
pub mod invitations;
pub mod system;

/// Login and logout for one realm. Posts are checked for the realm's
/// anti-forgery token.
fn auth_routes<R: crate::realm::HttpRealm>(services: &Arc<AppServices>) -> Router {
    Router::new()
        .route(R::LOGIN_PATH, get(auth::show_login_form::<R>).post(auth::login::<R>))
        .route(R::LOGOUT_PATH, post(auth::logout::<R>))
        .route_layer(from_fn_with_state(services.clone(), middleware::verify_csrf::<R>))
}

/// Every route of the application.
pub fn router(services: &Arc<AppServices>) -> Router {
    // Layers run outermost-last: authentication first, then the token check.
    let admin = admin::router()
        .route_layer(from_fn_with_state(
            services.clone(),
            middleware::verify_csrf::<AdminRealm>,
        ))
        .route_layer(from_fn_with_state(services.clone(), middleware::admin_guard));

    let company = company::router()
        .route_layer(from_fn_with_state(
            services.clone(),
            middleware::verify_csrf::<CompanyRealm>,
        ))
        .route_layer(from_fn_with_state(services.clone(), middleware::tenant_fence));

    Router::new()
        .route("/health", get(system::health))
        .merge(auth_routes::<AdminRealm>(services))
        .merge(auth_routes::<CompanyRealm>(services))
        .merge(admin)
        .merge(company)
        .merge(invitations::router())
}
