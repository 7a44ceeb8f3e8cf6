//! HTTP error mapping
//!
//! Every error body is `{ "success": false, "error": "..." }`. Only
//! validation messages and the fixed decryption message reach the client;
//! everything else is logged here and answered generically.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gsync_core::api::ErrorResponse;
use gsync_core::GsyncError;
use tracing::{debug, error};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Body `userId` does not match the verified identity
    #[error("user id does not match the authenticated session")]
    IdentityMismatch,

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Gsync(#[from] GsyncError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::IdentityMismatch => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Gsync(e) => match e {
                GsyncError::Authentication(_) => StatusCode::UNAUTHORIZED,
                GsyncError::Decryption | GsyncError::Validation(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Metrics label for this failure.
    pub fn outcome(&self) -> &'static str {
        match self {
            ApiError::IdentityMismatch => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Gsync(GsyncError::Authentication(_)) => "unauthenticated",
            ApiError::Gsync(GsyncError::Decryption) => "decryption_error",
            ApiError::Gsync(GsyncError::Validation(_)) => "invalid",
            ApiError::Gsync(_) => "error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            ApiError::Gsync(GsyncError::Authentication(_)) => {
                "authentication required: please log in again".into()
            }
            ApiError::Gsync(GsyncError::Decryption | GsyncError::Validation(_))
            | ApiError::IdentityMismatch
            | ApiError::NotFound(_) => self.to_string(),
            ApiError::Gsync(_) => "internal server error".into(),
        }
    }
}

/// Unreadable or incomplete request bodies are validation failures.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Gsync(GsyncError::Validation(rejection.body_text()))
    }
}

/// Outcome label for a handler result.
pub fn outcome<T>(result: &Result<T, ApiError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.outcome(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {self}");
        } else {
            debug!(status = status.as_u16(), "request rejected: {self}");
        }
        (status, Json(ErrorResponse::new(self.client_message()))).into_response()
    }
}
