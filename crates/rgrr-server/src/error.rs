//! Error types for the HTTP layer.
//!
//! [`ApiError`] unifies all failure modes into a single enum that can be
//! converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Every
//! error body has the shape `{"error": <message>, "status": <code>}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rgrr_core::error::RegistryError;

/// Errors that can occur in the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The submitted configuration was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A query parameter could not be used.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A simulation id could not be parsed from the request path.
    #[error("invalid UUID: {0}")]
    InvalidUuid(String),

    /// The requested simulation does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Results were requested before the simulation completed.
    #[error("not completed: {0}")]
    NotCompleted(String),

    /// Execution of the simulation failed.
    #[error("simulation failed: {0}")]
    SimulationRuntime(String),
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        let message = err.to_string();
        match err {
            RegistryError::InvalidConfiguration { .. } => Self::InvalidConfiguration(message),
            RegistryError::NotFound { .. } => Self::NotFound(message),
            RegistryError::NotCompleted { .. } => Self::NotCompleted(message),
            RegistryError::SimulationRuntime { .. } => Self::SimulationRuntime(message),
        }
    }
}

impl ApiError {
    /// HTTP status this error is reported with.
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidConfiguration(_) | Self::InvalidQuery(_) | Self::InvalidUuid(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotCompleted(_) => StatusCode::CONFLICT,
            Self::SimulationRuntime(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            Self::InvalidConfiguration(msg)
            | Self::InvalidQuery(msg)
            | Self::InvalidUuid(msg)
            | Self::NotFound(msg)
            | Self::NotCompleted(msg)
            | Self::SimulationRuntime(msg) => msg,
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
