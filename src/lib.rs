//! Quotation ledger service for travel operations.
//!
//! Library root: shared state and the HTTP application. The binary in
//! `main.rs` only wires configuration, storage and the listener.

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod ledger;
pub mod store;

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::auth::Credentials;
use crate::cache::CacheStats;
use crate::ledger::LedgerService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub ledger: LedgerService,
    pub credentials: Arc<Credentials>,
}

impl AppState {
    pub fn new(ledger: LedgerService, credentials: Credentials) -> Self {
        Self {
            ledger,
            credentials: Arc::new(credentials),
        }
    }
}

/// Build the application router with middleware
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(ledger::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    storage: &'static str,
    cache: CacheStats,
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let cache = state.ledger.cache().stats();

    match state.ledger.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                storage: "up",
                cache,
            }),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    storage: "down",
                    cache,
                }),
            )
        }
    }
}
