use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::{Value, json};

/// ApiError
///
/// The full error taxonomy of the HTTP API. Every handler and repository
/// method funnels failures into one of these variants, which carry the
/// client-facing message; `IntoResponse` maps them onto status codes.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    // 400: bad input shape or a violated field constraint.
    Validation(String),
    // 401: bad/missing token or bad credentials. Always a uniform message to
    // avoid leaking which part of the check failed.
    Unauthorized(String),
    // 403: an authenticated non-manager attempting a manager-only action.
    Forbidden(String),
    // 404: missing entity.
    NotFound(String),
    // 500: store or unexpected failure. The message here is already
    // sanitized; the real cause is logged where the error is constructed.
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Validation(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Internal(msg) => msg,
        }
    }

    /// JSON response body. Matches the `{"error": ...}` shape the auth guard
    /// has always answered with.
    pub fn to_json(&self) -> Value {
        json!({ "error": self.message() })
    }

    // Constructor helpers, so call sites read like the taxonomy.

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    /// The one authentication failure the API ever shows. Missing header,
    /// bad signature, revoked token, unknown soldier: all identical.
    pub fn unauthenticated() -> Self {
        ApiError::Unauthorized("please authenticate".to_string())
    }

    /// Login failures share a single message for both unknown personal
    /// number and wrong password (enumeration hygiene).
    pub fn bad_credentials() -> Self {
        ApiError::Unauthorized("unable to login".to_string())
    }

    pub fn not_manager() -> Self {
        ApiError::Forbidden("manager role required".to_string())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal() -> Self {
        ApiError::Internal("internal server error".to_string())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::not_found("not found"),
            // Log the real error but never expose SQL details to clients.
            other => {
                tracing::error!("database error: {:?}", other);
                ApiError::internal()
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}
