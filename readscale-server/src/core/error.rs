use crate::access::AccessError;
use crate::cache::KeyError;
use crate::data::DataError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Main error type for readscale operations
#[derive(Debug, Error)]
pub enum ReadscaleError {
    /// A mutation reached a read-only handle. This is a programming defect,
    /// never a business condition.
    #[error("Read-only violation: '{operation}' attempted through a read-only handle")]
    ReadOnlyViolation { operation: &'static str },

    #[error("Record not found: {collection}/{id}")]
    NotFound { collection: String, id: u64 },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Cache key error: {0}")]
    Key(#[from] KeyError),

    #[error("Data access error: {0}")]
    Data(#[from] DataError),
}

impl ReadscaleError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) | Self::Key(_) => StatusCode::BAD_REQUEST,
            Self::Data(DataError::RecordNotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Data(DataError::InvalidRecord(_)) => StatusCode::BAD_REQUEST,
            Self::Data(DataError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Data(_) | Self::ReadOnlyViolation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReadOnlyViolation { .. } => "read_only_violation",
            Self::NotFound { .. } => "not_found",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Key(_) => "cache_key",
            Self::Data(_) => "data",
        }
    }

    /// True when the error signals a defect upstream rather than bad input or
    /// an unavailable dependency.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::ReadOnlyViolation { .. })
    }
}

impl From<AccessError> for ReadscaleError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::ReadOnlyViolation { operation } => Self::ReadOnlyViolation { operation },
            AccessError::Data(e) => Self::Data(e),
        }
    }
}

/// Implement IntoResponse for Axum integration
impl IntoResponse for ReadscaleError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
            "code": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

/// Result type alias for readscale operations
pub type Result<T> = std::result::Result<T, ReadscaleError>;
