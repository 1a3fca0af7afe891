//! REST API endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness and simulation count |
//! | `POST` | `/simulations` | Validate and register a configuration |
//! | `GET` | `/simulations` | List simulation ids |
//! | `GET` | `/simulations/{id}` | Configuration echo and lifecycle |
//! | `POST` | `/simulations/{id}/run` | Execute (`?wait=false` to only trigger) |
//! | `GET` | `/simulations/{id}/histograms` | Shared-edge histograms per epoch |
//! | `GET` | `/simulations/{id}/distributions` | Raw per-epoch resources |
//! | `GET` | `/simulations/{id}/stats` | Per-epoch summary statistics |
//! | `GET` | `/swagger.json` | OpenAPI document |

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use rgrr_engine::HistogramOptions;
use rgrr_types::{CreatedResponse, Normalization, SimulationId, SimulationRequest};

use crate::error::ApiError;
use crate::openapi;
use crate::state::AppState;

/// Largest `bin_count` accepted on a histogram query.
pub const MAX_BIN_COUNT: usize = 10_000;

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for `POST /simulations/{id}/run`.
#[derive(Debug, serde::Deserialize)]
pub struct RunQuery {
    /// Wait for the terminal status (default `true`).
    pub wait: Option<bool>,
}

/// Query parameters for `GET /simulations/{id}/histograms`.
#[derive(Debug, serde::Deserialize)]
pub struct HistogramQuery {
    /// Number of bins; defaults to the configured value.
    pub bin_count: Option<usize>,
    /// `count` or `density`; defaults to the configured value.
    pub normalization: Option<Normalization>,
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Report liveness and the number of registered simulations.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "simulations": state.registry.len().await,
    }))
}

// ---------------------------------------------------------------------------
// POST /simulations -- create
// ---------------------------------------------------------------------------

/// Validate a configuration and register it as a new simulation.
///
/// Malformed bodies (unknown operation types, wrong field types) are
/// reported as invalid configurations, like out-of-range values.
pub async fn create_simulation(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SimulationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::InvalidConfiguration(e.body_text()))?;
    let id = state.registry.create(&request).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

// ---------------------------------------------------------------------------
// GET /simulations -- list
// ---------------------------------------------------------------------------

/// List the ids of all simulations.
pub async fn list_simulations(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.registry.list().await)
}

// ---------------------------------------------------------------------------
// GET /simulations/{id}
// ---------------------------------------------------------------------------

/// Return the configuration echo and lifecycle of one simulation.
pub async fn get_simulation(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id_str)?;
    Ok(Json(state.registry.get(id).await?))
}

// ---------------------------------------------------------------------------
// POST /simulations/{id}/run
// ---------------------------------------------------------------------------

/// Execute a simulation.
///
/// By default the response is sent once the run reaches a terminal
/// status: `200` when completed, `500` with the recorded error when
/// failed. With `?wait=false` execution is only triggered and `202` is
/// returned with the current status.
pub async fn run_simulation(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
    query: Result<Query<RunQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id_str)?;
    let Query(query) = query.map_err(|e| ApiError::InvalidQuery(e.body_text()))?;

    if query.wait.unwrap_or(true) {
        let response = state.registry.run(id).await?;
        Ok((StatusCode::OK, Json(response)))
    } else {
        let response = state.registry.start(id).await?;
        Ok((StatusCode::ACCEPTED, Json(response)))
    }
}

// ---------------------------------------------------------------------------
// GET /simulations/{id}/histograms
// ---------------------------------------------------------------------------

/// Return per-epoch histograms over shared bin edges.
pub async fn get_histograms(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
    query: Result<Query<HistogramQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id_str)?;
    let Query(query) = query.map_err(|e| ApiError::InvalidQuery(e.body_text()))?;
    let options = histogram_options(&query, state.registry.histogram_defaults())?;
    Ok(Json(state.registry.histogram(id, options).await?))
}

// ---------------------------------------------------------------------------
// GET /simulations/{id}/distributions
// ---------------------------------------------------------------------------

/// Return the raw resource values of every node, one array per epoch.
pub async fn get_distributions(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id_str)?;
    Ok(Json(state.registry.distributions(id).await?))
}

// ---------------------------------------------------------------------------
// GET /simulations/{id}/stats
// ---------------------------------------------------------------------------

/// Return summary statistics for every epoch.
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id_str)?;
    Ok(Json(state.registry.stats(id).await?))
}

// ---------------------------------------------------------------------------
// GET /swagger.json
// ---------------------------------------------------------------------------

/// Serve the OpenAPI description of this API.
pub async fn swagger_json() -> impl IntoResponse {
    Json(openapi::document())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_id(s: &str) -> Result<SimulationId, ApiError> {
    s.parse::<SimulationId>()
        .map_err(|e| ApiError::InvalidUuid(format!("{s}: {e}")))
}

/// Resolve query overrides against the defaults; `None` when no override
/// was given.
fn histogram_options(
    query: &HistogramQuery,
    defaults: &HistogramOptions,
) -> Result<Option<HistogramOptions>, ApiError> {
    if query.bin_count.is_none() && query.normalization.is_none() {
        return Ok(None);
    }
    let bin_count = query.bin_count.unwrap_or(defaults.bin_count);
    if bin_count == 0 || bin_count > MAX_BIN_COUNT {
        return Err(ApiError::InvalidQuery(format!(
            "bin_count must be within [1, {MAX_BIN_COUNT}], got {bin_count}"
        )));
    }
    Ok(Some(HistogramOptions {
        bin_count,
        normalization: query.normalization.unwrap_or(defaults.normalization),
    }))
}
