//! API key authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the API key from the X-API-Key header
//! 2. Check it against the key table for the required trust tier
//! 3. Inject authentication context into the request
//! 4. Reject unauthorized requests with HTTP 401/403
//!
//! Rejections distinguish missing header, unknown key, revoked key, and
//! insufficient role. The distinction keeps failure classes observable and
//! independently testable even where a client-facing mapping might collapse
//! them into one status code.

use crate::{
    AppState,
    error::AppError,
    models::api_key::{KeyRole, KeyStatus},
    store::KeyStore,
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Header carrying the API key on client and admin requests.
///
/// Downloads are the one exception: their key travels as a query parameter
/// so generated links can be pasted as full URLs.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Authentication context attached to authenticated requests.
///
/// This struct is inserted into the request's extension map and can be
/// extracted by route handlers to know which key made the request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The validated key string, echoed into generated download links
    pub api_key: String,

    /// Trust tier the key authenticated at
    pub role: KeyRole,
}

/// Check a presented key against the key table for a required trust tier.
///
/// # Rejection Reasons
///
/// - `MissingApiKey`: no key was presented at all
/// - `InvalidApiKey`: the key matches no known record
/// - `RevokedApiKey`: the key exists but was revoked
/// - `InsufficientRole`: a valid client key was presented where the admin
///   master key is required
pub fn authorize(
    keys: &KeyStore,
    presented_key: Option<&str>,
    required_role: KeyRole,
) -> Result<AuthContext, AppError> {
    let key = presented_key.ok_or(AppError::MissingApiKey)?;

    if keys.is_admin_key(key) {
        // The admin master key satisfies both tiers
        return Ok(AuthContext {
            api_key: key.to_string(),
            role: KeyRole::Admin,
        });
    }

    match keys.status_of(key) {
        Some(KeyStatus::Active) => match required_role {
            KeyRole::Client => Ok(AuthContext {
                api_key: key.to_string(),
                role: KeyRole::Client,
            }),
            KeyRole::Admin => Err(AppError::InsufficientRole),
        },
        Some(KeyStatus::Revoked) => Err(AppError::RevokedApiKey),
        None => Err(AppError::InvalidApiKey),
    }
}

/// Client-tier authentication middleware for the generation endpoints.
///
/// # Flow
///
/// 1. Extract the `X-API-Key` header from the request
/// 2. Authorize it at the client tier (the admin key also passes)
/// 3. If valid: inject `AuthContext` into request, call next handler
/// 4. If not: return the matching 401 error
pub async fn require_client_key(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = header_value(&request);
    let context = authorize(&state.keys, presented.as_deref(), KeyRole::Client)?;

    // Route handlers can now extract this using Extension<AuthContext>
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

/// Admin-tier authentication middleware for key and settings management.
///
/// Only the process-configured master key passes; a valid client key is
/// rejected with 403 rather than 401 so the caller knows the credential
/// itself is fine.
pub async fn require_admin_key(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = header_value(&request);
    let context = authorize(&state.keys, presented.as_deref(), KeyRole::Admin)?;

    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

/// Pull the API key header out of a request, if present and readable.
fn header_value(request: &Request) -> Option<String> {
    request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN: &str = "test-admin-key";

    fn store(dir: &tempfile::TempDir) -> KeyStore {
        KeyStore::open(dir.path().join("api_keys.json"), ADMIN).unwrap()
    }

    #[test]
    fn missing_header_is_its_own_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let keys = store(&dir);

        let err = authorize(&keys, None, KeyRole::Client).unwrap_err();
        assert!(matches!(err, AppError::MissingApiKey));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let keys = store(&dir);

        let err = authorize(&keys, Some("bogus"), KeyRole::Client).unwrap_err();
        assert!(matches!(err, AppError::InvalidApiKey));
    }

    #[test]
    fn revoked_key_is_distinguished_from_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let keys = store(&dir);

        let record = keys.create_key().unwrap();
        keys.revoke_key(&record.key).unwrap();

        let err = authorize(&keys, Some(&record.key), KeyRole::Client).unwrap_err();
        assert!(matches!(err, AppError::RevokedApiKey));
    }

    #[test]
    fn client_key_on_admin_tier_is_insufficient_role() {
        let dir = tempfile::tempdir().unwrap();
        let keys = store(&dir);

        let record = keys.create_key().unwrap();
        let err = authorize(&keys, Some(&record.key), KeyRole::Admin).unwrap_err();
        assert!(matches!(err, AppError::InsufficientRole));
    }

    #[test]
    fn admin_key_passes_both_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let keys = store(&dir);

        let admin = authorize(&keys, Some(ADMIN), KeyRole::Admin).unwrap();
        assert_eq!(admin.role, KeyRole::Admin);

        let as_client = authorize(&keys, Some(ADMIN), KeyRole::Client).unwrap();
        assert_eq!(as_client.role, KeyRole::Admin);
    }

    #[test]
    fn issued_key_works_until_revoked() {
        let dir = tempfile::tempdir().unwrap();
        let keys = store(&dir);

        // Admin issues a key; the client generates with it
        let issued = keys.create_key().unwrap().key;
        assert!(authorize(&keys, Some(&issued), KeyRole::Client).is_ok());

        // Admin revokes it; the client's retry is rejected as revoked
        assert!(keys.revoke_key(&issued).unwrap());
        let err = authorize(&keys, Some(&issued), KeyRole::Client).unwrap_err();
        assert!(matches!(err, AppError::RevokedApiKey));
    }

    #[test]
    fn active_client_key_passes_client_tier() {
        let dir = tempfile::tempdir().unwrap();
        let keys = store(&dir);

        let record = keys.create_key().unwrap();
        let context = authorize(&keys, Some(&record.key), KeyRole::Client).unwrap();
        assert_eq!(context.role, KeyRole::Client);
        assert_eq!(context.api_key, record.key);
    }
}
