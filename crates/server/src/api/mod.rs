//! Thin HTTP handlers delegating to the core operations.

mod alerts;
mod health;
mod holidays;
mod imports;
mod resources;

use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::routing::{delete, get, post};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .server
        .cors_origin_list()
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/import", post(imports::run_import))
        .route("/import/batches", get(imports::list_batches))
        .route("/import/batches/{id}", get(imports::get_batch))
        .route("/import/baseline-versions", get(imports::list_baseline_versions))
        .route("/alerts/respond", post(alerts::respond))
        .route("/alerts/approvals", get(alerts::list_pending_approvals))
        .route("/alerts/approvals/{response_id}/approve", post(alerts::approve))
        .route("/alerts/approvals/{response_id}/reject", post(alerts::reject))
        .route("/alerts/{id}/escalation-summary", get(alerts::escalation_summary))
        .route("/resources/{id}/escalation-chain", get(resources::escalation_chain))
        .route("/holidays", get(holidays::list).post(holidays::create))
        .route("/holidays/{id}", delete(holidays::remove))
        .layer(cors)
        .with_state(state)
}
