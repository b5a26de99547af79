//! Error handling

use axum::response::IntoResponse;

use crate::model::ModelError;
use crate::schema::SchemaError;

/// Errors raised by the flows.
#[derive(Debug)]
pub enum FlowError {
    /// The request didn't match the flow's input schema; no model call was made.
    InvalidInput(SchemaError),
    /// The model call itself failed.
    Model(ModelError),
    /// The model answered, but not in the declared shape.
    OutputShape(SchemaError),
}

impl std::fmt::Display for FlowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(err) => write!(f, "Invalid flow input: {err}"),
            Self::Model(err) => write!(f, "Model call failed: {err}"),
            Self::OutputShape(err) => write!(f, "Model output had the wrong shape: {err}"),
        }
    }
}

impl std::error::Error for FlowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidInput(err) | Self::OutputShape(err) => Some(err),
            Self::Model(err) => Some(err),
        }
    }
}

impl From<ModelError> for FlowError {
    fn from(err: ModelError) -> Self {
        FlowError::Model(err)
    }
}

/// Crate level errors for startup and the HTTP plumbing.
#[derive(Debug)]
pub enum LookbookError {
    /// When a requested resource is not found
    NotFound(String),
    /// Building the model client failed
    ModelClient(ModelError),
    /// When an internal server error occurs
    InternalServerError(String),
}

impl std::fmt::Display for LookbookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "Not found: {what}"),
            Self::ModelClient(err) => write!(f, "Model client error: {err}"),
            Self::InternalServerError(msg) => write!(f, "Internal server error: {msg}"),
        }
    }
}

impl std::error::Error for LookbookError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ModelClient(err) => Some(err),
            Self::NotFound(_) | Self::InternalServerError(_) => None,
        }
    }
}

impl From<std::io::Error> for LookbookError {
    fn from(err: std::io::Error) -> Self {
        LookbookError::InternalServerError(err.to_string())
    }
}

impl From<ModelError> for LookbookError {
    fn from(err: ModelError) -> Self {
        LookbookError::ModelClient(err)
    }
}

impl IntoResponse for LookbookError {
    fn into_response(self) -> axum::response::Response {
        match self {
            LookbookError::NotFound(what) => {
                tracing::error!("404 {what}");
                (axum::http::StatusCode::NOT_FOUND, "Not Found").into_response()
            }
            LookbookError::ModelClient(err) => {
                tracing::error!("Model client error: {}", err);
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                )
                    .into_response()
            }
            LookbookError::InternalServerError(message) => {
                tracing::error!("Internal server error: {}", message);
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                )
                    .into_response()
            }
        }
    }
}
