//! API key model for authentication.
//!
//! API keys are opaque bearer credentials identifying either a client or the administrator. Client keys live in the persisted key table; the single admin master key comes from process configuration and is never stored alongside them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trust tier a key belongs to.
///
/// Exactly one admin key exists. It satisfies both tiers, so admin-held
/// credentials can exercise client endpoints too. Client keys never satisfy
/// the admin tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyRole {
    Client,
    Admin,
}

/// Lifecycle state of a key.
///
/// Revocation is permanent: a revoked key never validates again and cannot
/// be reactivated. The record is kept (rather than deleted) so the admin
/// view still lists it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Active,
    Revoked,
}

/// A single API key record as held in the key table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    /// Opaque unique token (32 random bytes, hex encoded)
    pub key: String,

    /// Trust tier of this key
    pub role: KeyRole,

    /// Active or revoked
    pub status: KeyStatus,

    /// Timestamp when this key was created
    pub created_at: DateTime<Utc>,
}

/// Response when the admin creates a new API key.
///
/// # Example
///
/// ```json
/// {
///   "message": "API key created successfully",
///   "api_key": "3f9a...64 hex chars...",
///   "role": "client"
/// }
/// ```
///
/// This is the only place the raw key string is returned to the admin;
/// clients receive it out of band.
#[derive(Debug, Serialize)]
pub struct CreateKeyResponse {
    pub message: String,
    pub api_key: String,
    pub role: KeyRole,
}

/// Response listing every key record (admin-only view).
///
/// Records appear in insertion order.
#[derive(Debug, Serialize)]
pub struct ListKeysResponse {
    pub api_keys: Vec<ApiKeyRecord>,
}

/// Generic message-only response used by revoke and validate endpoints.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
