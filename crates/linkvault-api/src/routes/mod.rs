pub mod auth;
pub mod content;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::identity::IdentityGate;
use crate::lifecycle::ContentEngine;
use crate::middleware::{require_auth, resolve_identity};

/// Room for multipart framing and the text fields on top of the attachment.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Shared application state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ContentEngine>,
    pub identity: Arc<IdentityGate>,
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.engine.config().max_file_bytes as usize + MULTIPART_OVERHEAD;

    let account_routes = Router::new()
        .route("/api/me", get(auth::me))
        .route("/api/logout", post(auth::logout))
        .route("/api/my-contents", get(content::my_contents))
        .route_layer(middleware::from_fn(require_auth));

    let public_routes = Router::new()
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/upload", post(content::upload))
        .route("/api/access/{id}", post(content::access))
        .route("/api/content/{id}", get(content::peek))
        .route("/api/verify/{id}", post(content::verify))
        .route("/api/download/{id}", get(content::download))
        .route("/api/stats/{id}", post(content::stats))
        .route("/api/delete/{id}", post(content::delete));

    Router::new()
        .merge(account_routes)
        .merge(public_routes)
        .layer(middleware::from_fn_with_state(state.clone(), resolve_identity))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health — liveness check (no auth).
pub async fn health() -> &'static str {
    "ok"
}
