//! Check-in Token Service
//!
//! Issues short-lived, single-use tokens that a student's device shows as a
//! QR code, and consumes them exactly once when a scanner presents them.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Token Store**: PostgreSQL with sqlx, or an in-memory map for development
//! - **Authentication**: optional API key with SHA-256 hashing
//! - **Notifications**: HMAC-signed webhook to the attendance recorder
//! - **Format**: JSON requests/responses

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;
pub mod store;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use chrono::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    clock::SystemClock,
    config::Config,
    middleware::auth::ApiKeys,
    services::webhook_service::CheckInNotifier,
    state::{AppState, AppStateBuilder},
    store::{MemoryTokenStore, PgTokenStore, TokenStore},
};

/// Build the HTTP router for a prepared state.
pub fn build_router(state: AppState) -> Router {
    // Token routes, behind API key authentication when keys are configured
    let api_routes = Router::new()
        .route(
            "/api/issue-token",
            post(handlers::tokens::issue_attendance_token),
        )
        .route(
            "/api/validate-token",
            post(handlers::tokens::validate_attendance_token),
        )
        .route(
            "/api/tokens/{token}",
            get(handlers::tokens::attendance_token_status),
        )
        .route(
            "/api/registration/issue-token",
            post(handlers::tokens::issue_registration_token),
        )
        .route(
            "/api/registration/validate-token",
            post(handlers::tokens::validate_registration_token),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        // Student clients run in the browser
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Assemble the application state from configuration.
///
/// Connects to PostgreSQL and runs migrations when `DATABASE_URL` is set,
/// otherwise falls back to the in-memory store.
pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let store: Arc<dyn TokenStore> = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url, config.database_max_connections).await?;
            tracing::info!("Database pool created");

            db::run_migrations(&pool).await?;
            tracing::info!("Database migrations complete");

            Arc::new(PgTokenStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, tokens are kept in memory and lost on restart");
            Arc::new(MemoryTokenStore::new())
        }
    };

    let notifier = match config.attendance_webhook() {
        Some((url, secret)) => {
            tracing::info!("Check-in webhook enabled");
            Some(CheckInNotifier::new(url, secret)?)
        }
        None => None,
    };

    let api_keys = ApiKeys::from_digests(&config.api_key_hashes);
    if !api_keys.is_enabled() {
        tracing::warn!("API_KEY_HASHES not set, token endpoints are unauthenticated");
    }

    Ok(AppStateBuilder::new(store, Arc::new(SystemClock))
        .attendance_ttl(Duration::seconds(config.attendance_token_ttl_secs.into()))
        .registration_ttl(Duration::seconds(config.registration_token_ttl_secs.into()))
        .api_keys(api_keys)
        .notifier(notifier)
        .build())
}
