//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// This enum represents all possible errors that can occur in the application.
/// Each variant maps to a specific HTTP status code and error message.
///
/// # Error Categories
///
/// - **Authentication Errors**: Missing, unknown, or revoked API keys
/// - **Authorization Errors**: Valid key presented for a higher trust tier
/// - **Resource Errors**: Requested images or keys not found, traversal attempts
/// - **Settings Errors**: Rejected resource-strategy updates
/// - **Capacity Errors**: No free execution slot within the wait budget
/// - **Operational Errors**: Persistence or inference failures
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No API key was supplied in the X-API-Key header.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("API key is required in X-API-Key header")]
    MissingApiKey,

    /// The presented API key matches no known record.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// The presented API key exists but has been revoked.
    ///
    /// Revocation is permanent; the caller must obtain a fresh key.
    /// Returns HTTP 401 Unauthorized.
    #[error("API key has been revoked")]
    RevokedApiKey,

    /// A valid client key was presented where the admin master key is required.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Admin API key required")]
    InsufficientRole,

    /// Requested download path escapes the generated-images root.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid file path")]
    InvalidFilePath,

    /// Requested image does not exist under the generated-images root.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Image not found")]
    ImageNotFound,

    /// API key targeted by a revoke operation does not exist (or is the
    /// irrevocable admin key).
    ///
    /// Returns HTTP 404 Not Found.
    #[error("API key not found")]
    KeyNotFound,

    /// A settings update violated one or more validation constraints.
    ///
    /// Carries every violated constraint, not just the first.
    /// The committed settings are unchanged.
    /// Returns HTTP 400 Bad Request.
    #[error("Settings validation failed")]
    SettingsValidation(Vec<String>),

    /// No inference execution slot became available within the wait budget.
    ///
    /// This is a normal condition under load, not an operational fault.
    /// Returns HTTP 429 Too Many Requests.
    #[error("{0}")]
    Busy(String),

    /// Reading or writing a durable store failed (disk unavailable,
    /// permission denied). The atomic-replace discipline guarantees the
    /// previously persisted file survives the failed attempt.
    ///
    /// Returns HTTP 500 Internal Server Error (details hidden from client).
    #[error("Persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    /// The inference collaborator failed to produce images.
    ///
    /// Returns HTTP 500 Internal Server Error.
    #[error("Failed to generate images: {0}")]
    Inference(String),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),
}

/// Convert AppError into an HTTP response.
///
/// This implementation allows Axum handlers to return `Result<T, AppError>`
/// and have errors automatically converted to proper HTTP responses.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Settings validation failures additionally carry an `errors` array with
/// one entry per violated constraint.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Settings rejections itemize every violation for the admin caller
        if let AppError::SettingsValidation(ref errors) = self {
            let body = Json(json!({
                "error": {
                    "code": "settings_validation_failed",
                    "message": self.to_string(),
                    "errors": errors,
                }
            }));
            return (StatusCode::BAD_REQUEST, body).into_response();
        }

        // Map each error variant to (HTTP status, error code, message)
        let (status, code, message) = match self {
            AppError::MissingApiKey => (
                StatusCode::UNAUTHORIZED,
                "missing_api_key",
                self.to_string(),
            ),
            AppError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                self.to_string(),
            ),
            AppError::RevokedApiKey => (
                StatusCode::UNAUTHORIZED,
                "revoked_api_key",
                self.to_string(),
            ),
            AppError::InsufficientRole => {
                (StatusCode::FORBIDDEN, "insufficient_role", self.to_string())
            }
            AppError::InvalidFilePath => (
                StatusCode::BAD_REQUEST,
                "invalid_file_path",
                self.to_string(),
            ),
            AppError::ImageNotFound => {
                (StatusCode::NOT_FOUND, "image_not_found", self.to_string())
            }
            AppError::KeyNotFound => {
                (StatusCode::NOT_FOUND, "api_key_not_found", self.to_string())
            }
            AppError::SettingsValidation(_) => unreachable!("handled above"),
            AppError::Busy(ref msg) => {
                (StatusCode::TOO_MANY_REQUESTS, "busy", msg.clone())
            }
            AppError::Persistence(ref err) => {
                // Surface as a server-side operational error; the caller
                // cannot act on filesystem details
                tracing::error!("Persistence failure: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Inference(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "generation_failed",
                self.to_string(),
            ),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
        };

        // Build JSON response body
        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        // Return the response with status code and JSON body
        (status, body).into_response()
    }
}
