//! Admin HTTP handlers for key and settings management.
//!
//! Every route in this module sits behind the admin-tier authentication
//! middleware, so handlers can assume the master key was already presented.
//!
//! - POST /admin/keys - Issue a new client key
//! - DELETE /admin/keys/:key - Revoke a key
//! - GET /admin/keys - List all key records
//! - GET /admin/validate-key - Probe admin authentication
//! - GET /admin/settings - Current resource-strategy settings
//! - PUT /admin/settings - Update settings (full or partial)

use crate::{
    AppState,
    error::AppError,
    models::api_key::{CreateKeyResponse, ListKeysResponse, MessageResponse},
    models::settings::{ResourceStrategySettings, SettingsUpdate},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

/// Generate a new client API key.
///
/// # Endpoint
///
/// `POST /admin/keys`
///
/// # Response (201 Created)
///
/// ```json
/// {
///   "message": "API key created successfully",
///   "api_key": "3f9a...",
///   "role": "client"
/// }
/// ```
///
/// This is the only response that carries the raw key string.
pub async fn create_api_key(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CreateKeyResponse>), AppError> {
    let record = state.keys.create_key()?;

    Ok((
        StatusCode::CREATED,
        Json(CreateKeyResponse {
            message: "API key created successfully".to_string(),
            api_key: record.key,
            role: record.role,
        }),
    ))
}

/// Revoke (permanently deactivate) an existing API key.
///
/// # Endpoint
///
/// `DELETE /admin/keys/:key`
///
/// Returns 404 when the key is unknown, already revoked, or is the
/// irrevocable admin master key.
pub async fn revoke_api_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    if !state.keys.revoke_key(&key)? {
        return Err(AppError::KeyNotFound);
    }

    Ok(Json(MessageResponse {
        message: "API key revoked successfully".to_string(),
    }))
}

/// List every key record, in insertion order.
///
/// # Endpoint
///
/// `GET /admin/keys`
///
/// Revoked keys stay in the listing with their status, so the admin can
/// audit the full history.
pub async fn list_api_keys(State(state): State<AppState>) -> Json<ListKeysResponse> {
    Json(ListKeysResponse {
        api_keys: state.keys.list_keys(),
    })
}

/// Validate admin key (for testing purposes).
///
/// # Endpoint
///
/// `GET /admin/validate-key`
///
/// Reaching the handler at all means the middleware accepted the key.
pub async fn validate_admin_key() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Admin key is valid".to_string(),
    })
}

/// Current committed resource-strategy settings.
///
/// # Endpoint
///
/// `GET /admin/settings`
pub async fn get_settings(State(state): State<AppState>) -> Json<ResourceStrategySettings> {
    Json(state.settings.get())
}

/// Update the resource-strategy settings.
///
/// # Endpoint
///
/// `PUT /admin/settings`
///
/// Accepts a full or partial payload; omitted fields keep their committed
/// values. An invalid combination is rejected with every violated
/// constraint itemized, and the committed settings stay as they were:
///
/// ```json
/// {
///   "error": {
///     "code": "settings_validation_failed",
///     "message": "Settings validation failed",
///     "errors": ["int8 precision cannot be combined with sequential_offload"]
///   }
/// }
/// ```
pub async fn update_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<ResourceStrategySettings>, AppError> {
    let committed = state.settings.update(&update)?;
    Ok(Json(committed))
}
