//! trailmark-engine - user recognition and journey engine
//!
//! Resolves inbound requests to users via session token, browser
//! fingerprint, or device id; tracks forward-only journey progression;
//! issues bounded-lifetime sessions; and aggregates per-user analytics.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use trailmark_common::config::EngineSettings;

pub mod api;
pub mod db;
pub mod error;
pub mod fingerprint;
pub mod models;
pub mod services;
pub mod sweeper;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Engine tunables loaded from the settings table at startup
    pub settings: EngineSettings,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, settings: EngineSettings) -> Self {
        Self { db, settings }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/api/recognize", post(api::recognize::recognize))
        .route("/api/register", post(api::auth::register))
        .route("/api/login", post(api::auth::login))
        .route("/api/logout", post(api::auth::logout))
        .route("/api/activity", post(api::activity::track_activity))
        .route("/api/users/:id/analytics", get(api::analytics::user_analytics))
        .merge(api::health::health_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
