//! Mbuli's Feast Storefront library.
//!
//! Catalogue, cart, checkout and delivery-fee estimation for the farm's
//! online shop, plus the order views used by the admin and delivery
//! dashboards. The binary in `main.rs` wires this library to configuration,
//! a store and the Claude distance resolver.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod checkout;
pub mod claude;
pub mod config;
pub mod db;
pub mod delivery;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{
    Router,
    extract::State,
    http::{Request, StatusCode},
    routing::get,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the storefront router with its request tracing stack.
///
/// Sentry layers are added by the binary, outside this router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().health_check().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
