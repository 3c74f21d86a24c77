use crate::error::AuthError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// HTTP-facing error. Renders as `{ "error": "<message>" }`.
#[derive(Debug, PartialEq, Eq)]
pub enum AppError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    ServerError(String),
    BadGateway(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

/// Provider and storage details are logged where they happen, not sent to
/// the browser.
impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotAuthenticated => AppError::Unauthorized(err.to_string()),
            AuthError::NotAuthorized => AppError::Forbidden(err.to_string()),
            AuthError::AuthorizationDenied(_) => AppError::BadRequest(err.to_string()),
            AuthError::CodeExchangeFailed(_) => {
                AppError::BadGateway("Spotify authentication failed".to_string())
            }
            AuthError::TokenRefreshFailed(_) => {
                AppError::ServerError("Token refresh failed".to_string())
            }
            AuthError::Upstream(_) => AppError::ServerError("Spotify API error".to_string()),
            AuthError::Storage(_) => AppError::ServerError("Credential storage error".to_string()),
        }
    }
}
