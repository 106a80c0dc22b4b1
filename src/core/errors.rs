use std::path::PathBuf;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

use crate::pipeline::PipelineError;

/// Startup failures. None of these allow partial operation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
    #[error("knowledge index not found at {0}")]
    IndexMissing(PathBuf),
    #[error("knowledge index at {path} is unreadable: {reason}")]
    IndexCorrupt { path: PathBuf, reason: String },
    #[error(
        "refusing to load unverified knowledge index at {0}; pin `index.sha256` or set `index.allow_unverified: true`"
    )]
    IndexUntrusted(PathBuf),
    #[error("knowledge index digest mismatch for {path}: expected {expected}, found {actual}")]
    IndexDigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    #[error("invalid intent pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failures while searching the knowledge index. The retriever absorbs these.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("embedding request failed: {0}")]
    Embedding(String),
    #[error("query embedding has dimension {actual}, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("index store error: {0}")]
    Store(String),
}

/// Failures of the hosted generation endpoint. Never absorbed.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request timed out after {0}s")]
    Timeout(u64),
    #[error("generation endpoint rejected the credential ({0})")]
    Unauthorized(u16),
    #[error("generation endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("generation endpoint unreachable: {0}")]
    Transport(String),
    #[error("malformed generation response: {0}")]
    MalformedResponse(String),
    #[error("generation endpoint returned an empty completion")]
    EmptyCompletion,
}

impl GenerationError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Timeout(_) | GenerationError::Transport(_) => true,
            GenerationError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("upstream timeout: {0}")]
    GatewayTimeout(String),
    #[error("upstream failure: {0}")]
    BadGateway(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Timeout(_) => ApiError::GatewayTimeout(err.to_string()),
            other => ApiError::BadGateway(other.to_string()),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Generation(inner) => inner.into(),
            input => ApiError::BadRequest(input.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::GatewayTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg.clone()),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_maps_to_gateway_timeout() {
        let api: ApiError = GenerationError::Timeout(60).into();
        assert!(matches!(api, ApiError::GatewayTimeout(_)));
        assert_eq!(api.into_response().status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn other_generation_failures_map_to_bad_gateway() {
        let api: ApiError = GenerationError::Unauthorized(401).into();
        assert_eq!(api.into_response().status(), StatusCode::BAD_GATEWAY);

        let api: ApiError = GenerationError::EmptyCompletion.into();
        assert_eq!(api.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn pipeline_input_errors_map_to_bad_request() {
        let api: ApiError = PipelineError::EmptyQuery.into();
        assert_eq!(api.into_response().status(), StatusCode::BAD_REQUEST);

        let api: ApiError = PipelineError::QueryTooLong { max: 10, actual: 11 }.into();
        assert_eq!(api.into_response().status(), StatusCode::BAD_REQUEST);

        let api: ApiError = PipelineError::Generation(GenerationError::Timeout(5)).into();
        assert_eq!(api.into_response().status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn transient_classification() {
        assert!(GenerationError::Timeout(1).is_transient());
        assert!(GenerationError::Transport("reset".into()).is_transient());
        assert!(GenerationError::Status { status: 503, body: String::new() }.is_transient());
        assert!(GenerationError::Status { status: 429, body: String::new() }.is_transient());
        assert!(!GenerationError::Status { status: 400, body: String::new() }.is_transient());
        assert!(!GenerationError::Unauthorized(401).is_transient());
        assert!(!GenerationError::EmptyCompletion.is_transient());
    }
}
