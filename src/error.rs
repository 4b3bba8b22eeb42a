use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, warn};

/// Request-time error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InvalidInput(msg) => {
                warn!("Invalid input: {}", msg);
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::InternalError(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

/// Result type alias for request handlers
pub type AppResult<T> = Result<T, AppError>;

/// Failures while registering services. Any of these aborts startup.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid bind address {0:?}")]
    InvalidBind(String),

    #[error("CORS policy {0:?} is already registered")]
    DuplicateCorsPolicy(String),

    #[error("CORS policy {0:?} is not registered")]
    UnknownCorsPolicy(String),

    #[error("invalid CORS {kind} value {value:?}")]
    InvalidCorsValue { kind: &'static str, value: String },

    #[error("invalid culture name {0:?}")]
    InvalidCulture(String),

    #[error("failed to read resource file {path}: {source}")]
    ResourceRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse resource file {path}: {source}")]
    ResourceParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid documentation UI path {0:?}")]
    InvalidUiPath(String),

    #[error("failed to read doc comments {path}: {source}")]
    DocCommentsRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse doc comments {path}: {source}")]
    DocCommentsParse {
        path: PathBuf,
        source: crate::docs::DocCommentsError,
    },

    #[error("cannot locate executable directory: {0}")]
    ExecutableDir(std::io::Error),
}
