//! Axum router construction.
//!
//! Assembles all routes into a single [`Router`] with CORS middleware
//! enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /health` -- liveness
/// - `POST /simulations` -- create a simulation
/// - `GET /simulations` -- list simulation ids
/// - `GET /simulations/{id}` -- configuration echo and lifecycle
/// - `POST /simulations/{id}/run` -- execute
/// - `GET /simulations/{id}/histograms` -- histograms
/// - `GET /simulations/{id}/distributions` -- raw distributions
/// - `GET /simulations/{id}/stats` -- per-epoch statistics
/// - `GET /swagger.json` -- OpenAPI document
///
/// CORS allows any origin so the dashboard can be served separately.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/simulations",
            post(handlers::create_simulation).get(handlers::list_simulations),
        )
        .route("/simulations/{id}", get(handlers::get_simulation))
        .route("/simulations/{id}/run", post(handlers::run_simulation))
        .route("/simulations/{id}/histograms", get(handlers::get_histograms))
        .route(
            "/simulations/{id}/distributions",
            get(handlers::get_distributions),
        )
        .route("/simulations/{id}/stats", get(handlers::get_stats))
        .route("/swagger.json", get(handlers::swagger_json))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
