// Error handling types for the API

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::fmt;
use tracing::error;

/// API error types
///
/// Every variant renders as a flat `{"error": "..."}` body; the status code is
/// the only thing that distinguishes failure classes.
#[derive(Debug)]
pub enum ApiError {
    MalformedRequest(String),
    UnresolvedIdentity(String),
    InvalidCredential(String),
    MissingServerConfig(String),
    IdentityCreationFailure(String),
    AuthenticationFailure(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::MalformedRequest(msg) => write!(f, "Malformed Request: {}", msg),
            ApiError::UnresolvedIdentity(msg) => write!(f, "Unresolved Identity: {}", msg),
            ApiError::InvalidCredential(msg) => write!(f, "Invalid Credential: {}", msg),
            ApiError::MissingServerConfig(msg) => write!(f, "Missing Server Config: {}", msg),
            ApiError::IdentityCreationFailure(msg) => {
                write!(f, "Identity Creation Failure: {}", msg)
            }
            ApiError::AuthenticationFailure(msg) => write!(f, "Authentication Failure: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MalformedRequest(_) | ApiError::UnresolvedIdentity(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::InvalidCredential(_) => StatusCode::UNAUTHORIZED,
            ApiError::MissingServerConfig(_)
            | ApiError::IdentityCreationFailure(_)
            | ApiError::AuthenticationFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();

        let error_message = match self {
            ApiError::MissingServerConfig(msg) => {
                error!(detail = %msg, "Server configuration missing");
                "Server configuration error".to_string()
            }
            ApiError::MalformedRequest(msg)
            | ApiError::UnresolvedIdentity(msg)
            | ApiError::InvalidCredential(msg)
            | ApiError::IdentityCreationFailure(msg)
            | ApiError::AuthenticationFailure(msg) => msg,
        };

        (status, Json(ErrorResponse { error: error_message })).into_response()
    }
}
