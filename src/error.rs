use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;

/// Failures of the offline build pass. None of these ever publish a partial artifact set.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("Cannot build from an empty corpus")]
    EmptyCorpus,

    #[error("Catalogue of {items} items exceeds the configured ceiling of {max}")]
    TooLarge { items: usize, max: usize },

    #[error("Row alignment violated: {0}")]
    Misaligned(String),

    #[error("Build did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Build aborted: {0}")]
    Aborted(String),
}

/// Artifact store read/write failures
#[derive(thiserror::Error, Debug)]
pub enum PersistenceError {
    #[error("Artifacts not found at {0}")]
    Missing(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed artifact {path}: {message}")]
    Malformed { path: String, message: String },
}

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Build failed: {0}")]
    Build(#[from] BuildError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Recommendations are not ready: no artifact set has been built or loaded")]
    NotReady,

    #[error("A build is already in progress")]
    BuildInProgress,

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotReady => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            AppError::BuildInProgress => (StatusCode::CONFLICT, self.to_string()),
            AppError::Build(BuildError::TooLarge { .. }) => {
                (StatusCode::PAYLOAD_TOO_LARGE, self.to_string())
            }
            AppError::Build(BuildError::Timeout(_)) => {
                (StatusCode::GATEWAY_TIMEOUT, self.to_string())
            }
            AppError::Build(_)
            | AppError::Persistence(_)
            | AppError::Dataset(_)
            | AppError::Cache(_)
            | AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::ExternalApi(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
