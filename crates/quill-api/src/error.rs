use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use quill_types::api::MessageResponse;

/// Every handler failure. Rendered as `{"message": "..."}` with the matching
/// status code.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input, duplicate username/email.
    #[error("{0}")]
    BadRequest(String),

    /// Bad credentials, or no bearer token at all.
    #[error("{0}")]
    Unauthorized(String),

    /// A bearer token was sent but could not be verified.
    #[error("{0}")]
    InvalidToken(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Unexpected fault. The underlying message is returned to the caller.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden() -> Self {
        Self::Forbidden("Permission denied".into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidToken(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let Self::Internal(e) = &self {
            error!("Internal error: {:#}", e);
        }
        (status, Json(MessageResponse::new(self.to_string()))).into_response()
    }
}
