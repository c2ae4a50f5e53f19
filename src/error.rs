// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::services::encryption::EncryptionError;
use crate::store::StoreError;

/// HTTP API error with appropriate status codes and client-friendly messages.
///
/// Enforcement failures map to generic bodies: internal detail is logged
/// server-side and never leaves the process.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ResourceIdMissing(String),

    // 401 Unauthorized
    AuthenticationRequired(String),
    TokenInvalid(String),

    // 403 Forbidden
    PermissionDenied(String),
    OwnershipRequired(String),

    // 404 Not Found
    NotFound(String),

    // 500 Internal Server Error
    EncryptionFailure(String),
    PersistenceFailure(String),
    InternalServerError(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ResourceIdMissing(_) => 400,
            ApiError::AuthenticationRequired(_) => 401,
            ApiError::TokenInvalid(_) => 401,
            ApiError::PermissionDenied(_) => 403,
            ApiError::OwnershipRequired(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::EncryptionFailure(_) => 500,
            ApiError::PersistenceFailure(_) => 500,
            ApiError::InternalServerError(_) => 500,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ResourceIdMissing(msg) => msg,
            ApiError::AuthenticationRequired(msg) => msg,
            ApiError::TokenInvalid(msg) => msg,
            ApiError::PermissionDenied(msg) => msg,
            ApiError::OwnershipRequired(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::EncryptionFailure(msg) => msg,
            ApiError::PersistenceFailure(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ResourceIdMissing(_) => "RESOURCE_ID_MISSING",
            ApiError::AuthenticationRequired(_) => "AUTHENTICATION_REQUIRED",
            ApiError::TokenInvalid(_) => "TOKEN_INVALID",
            ApiError::PermissionDenied(_) => "PERMISSION_DENIED",
            ApiError::OwnershipRequired(_) => "OWNERSHIP_REQUIRED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::EncryptionFailure(_) => "ENCRYPTION_FAILURE",
            ApiError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "error": true,
            "message": self.message(),
            "code": self.error_code()
        })
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn resource_id_missing(message: impl Into<String>) -> Self {
        ApiError::ResourceIdMissing(message.into())
    }

    pub fn authentication_required(message: impl Into<String>) -> Self {
        ApiError::AuthenticationRequired(message.into())
    }

    pub fn token_invalid(message: impl Into<String>) -> Self {
        ApiError::TokenInvalid(message.into())
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        ApiError::PermissionDenied(message.into())
    }

    pub fn ownership_required(message: impl Into<String>) -> Self {
        ApiError::OwnershipRequired(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }
}

// Convert other error types to ApiError
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        // Log the real error but return a generic message
        tracing::error!("Store error: {}", err);
        ApiError::PersistenceFailure("An error occurred while processing your request".to_string())
    }
}

impl From<EncryptionError> for ApiError {
    fn from(err: EncryptionError) -> Self {
        // Never expose cipher internals, plaintext or key material
        tracing::error!("Encryption error: {}", err);
        ApiError::EncryptionFailure("Failed to process protected data".to_string())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
