use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use cadence_orchestrator::OrchestratorError;

/// Errors that can occur when running the Cadence server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error; refuses startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A store failure surfaced through the API.
    #[error("store error: {0}")]
    Store(#[from] cadence_store::StoreError),

    /// A tracking-loop failure surfaced through the API.
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

/// The normalized error body every surface returns.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Orchestrator(e) => match e {
                OrchestratorError::TokenExpired => (
                    StatusCode::GONE,
                    ErrorResponse::new("TokenExpired", e.to_string()),
                ),
                OrchestratorError::TokenAlreadyUsed { used_at } => {
                    let mut body = ErrorResponse::new("TokenRevoked", e.to_string());
                    body.details = used_at.map(|at| serde_json::json!({ "used_at": at }));
                    (StatusCode::CONFLICT, body)
                }
                OrchestratorError::TokenInvalid(_) => (
                    StatusCode::UNAUTHORIZED,
                    ErrorResponse::new("TokenInvalid", e.to_string()),
                ),
                OrchestratorError::AlertNotFound(_)
                | OrchestratorError::WorkItemNotFound(_)
                | OrchestratorError::ResponseNotFound(_) => (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::new("ResourceNotFound", e.to_string()),
                ),
                OrchestratorError::NotPendingApproval(_) => (
                    StatusCode::CONFLICT,
                    ErrorResponse::new("MergeConflict", e.to_string()),
                ),
                OrchestratorError::CascadeFailure { ref attempted, rolled_back, .. } => {
                    let mut body = ErrorResponse::new("CascadeFailure", e.to_string());
                    body.details = Some(serde_json::json!({
                        "attempted": attempted,
                        "rolled_back": rolled_back,
                    }));
                    (StatusCode::INTERNAL_SERVER_ERROR, body)
                }
                OrchestratorError::Store(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("StoreFailure", e.to_string()),
                ),
            },
            Self::Store(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("StoreFailure", e.to_string()),
            ),
            Self::Config(ref message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("ConfigurationError", message.clone()),
            ),
            Self::Io(ref e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("StoreFailure", e.to_string()),
            ),
        };
        (status, Json(body)).into_response()
    }
}
