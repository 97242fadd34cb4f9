use std::path::PathBuf;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::models::REQUIRED_COLUMNS;

/// The uploaded table lacks at least one required column.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Invalid file format. Required columns are: {}", REQUIRED_COLUMNS.join(", "))]
pub struct SchemaError {
    pub missing: Vec<String>,
}

/// The uploaded bytes are not a readable comma-separated table.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Invalid upload: {0}")]
pub struct ParseError(pub String);

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// A single star record is structurally malformed or out of range.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Invalid star record: {0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// The classifier rejected the feature payload.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Inference failed: {0}")]
pub struct InferenceError(pub String);

impl InferenceError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// The model artifact could not be loaded. Fatal at startup.
#[derive(Debug, Error)]
#[error("model unavailable ({}): {reason}", .path.display())]
pub struct ModelUnavailableError {
    pub path: PathBuf,
    pub reason: String,
}

impl ModelUnavailableError {
    pub fn new(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Figment(#[from] figment::Error),
}

/// Everything a gateway call can fail with.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// True for errors the caller can fix by changing the request.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            GatewayError::Schema(_) | GatewayError::Parse(_) | GatewayError::Validation(_)
        )
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_columns: Option<Vec<&'static str>>,
}

impl From<&GatewayError> for ErrorBody {
    fn from(err: &GatewayError) -> Self {
        let required_columns = match err {
            GatewayError::Schema(_) => Some(REQUIRED_COLUMNS.to_vec()),
            _ => None,
        };
        Self {
            error: err.to_string(),
            required_columns,
        }
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Schema(_) | GatewayError::Parse(_) | GatewayError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::Inference(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody::from(self))
    }
}
