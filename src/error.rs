//! Request-level error type and its HTTP mapping.
//!
//! Every failure reaches the caller as `{"detail": "<message>"}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::multipart::MultipartError;
use crate::upstream::UpstreamError;
use crate::workspace::PersistError;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// Missing or invalid inbound field.
    #[error("{0}")]
    Validation(String),

    /// Inbound body exceeded the configured upload limit.
    #[error("{0}")]
    PayloadTooLarge(String),

    /// The backend answered with a non-2xx status.
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The backend could not be reached or did not answer in time.
    #[error("{0}")]
    Transport(String),

    /// The backend answered 2xx with a body that cannot be decoded.
    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),

    /// Local disk failure while staging or persisting.
    #[error("storage error: {0}")]
    Io(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BridgeError::Validation(_) => StatusCode::BAD_REQUEST,
            BridgeError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            BridgeError::Upstream { .. }
            | BridgeError::Transport(_)
            | BridgeError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
            BridgeError::Io(_) | BridgeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<UpstreamError> for BridgeError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Status { status, body } => BridgeError::Upstream { status, body },
            UpstreamError::Transport(msg) => BridgeError::Transport(msg),
            UpstreamError::InvalidBody(msg) => BridgeError::MalformedResponse(msg),
            UpstreamError::InvalidRequest(msg) => BridgeError::Internal(msg),
            UpstreamError::Staging(e) => BridgeError::Io(format!("failed to read staged upload: {e}")),
        }
    }
}

impl From<MultipartError> for BridgeError {
    fn from(err: MultipartError) -> Self {
        BridgeError::MalformedResponse(err.to_string())
    }
}

impl From<PersistError> for BridgeError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::Io { .. } => BridgeError::Io(err.to_string()),
            PersistError::MalformedInfo(_) => BridgeError::MalformedResponse(err.to_string()),
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Io(err.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for BridgeError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            BridgeError::PayloadTooLarge(err.body_text())
        } else {
            BridgeError::Validation(format!("invalid multipart form: {}", err.body_text()))
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        match &self {
            BridgeError::Io(_) | BridgeError::Internal(_) => {
                tracing::error!("Internal bridge error: {}", self);
            }
            BridgeError::Upstream { .. }
            | BridgeError::Transport(_)
            | BridgeError::MalformedResponse(_) => {
                tracing::warn!("Upstream failure: {}", self);
            }
            BridgeError::Validation(_) | BridgeError::PayloadTooLarge(_) => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
