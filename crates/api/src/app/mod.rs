//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: stores, guards, dispatcher and job executor
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `views.rs`: server-rendered pages
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};

pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;
pub mod views;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>) -> Router {
    routes::router(&services).layer(Extension(services))
}

pub use services::{AppServices, build_services};
