//! API key table with durable persistence.
//!
//! The store owns two things: the admin master key (process configuration,
//! never written to disk here, never revocable) and the mutable table of
//! client keys, persisted as an ordered JSON mapping from key string to
//! record. Every mutation rewrites the whole file atomically.
//!
//! # Concurrency
//!
//! A single `RwLock` guards the table. Validation takes a read lock and may
//! run fully concurrently; create and revoke take the write lock for the
//! duration of the read-modify-persist sequence and nothing longer. The
//! persist step is a small local file write, so the lock is never held
//! across network or inference I/O.

use crate::error::AppError;
use crate::models::api_key::{ApiKeyRecord, KeyRole, KeyStatus};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

/// Per-key data stored in the table (the key string itself is the map key).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredKey {
    role: KeyRole,
    status: KeyStatus,
    created_at: DateTime<Utc>,
}

/// On-disk shape of the key table.
///
/// ```json
/// {
///   "api_keys": {
///     "3f9a...": { "role": "client", "status": "active", "created_at": "..." }
///   }
/// }
/// ```
///
/// An `IndexMap` keeps insertion order both in memory and in the file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct KeyTableFile {
    api_keys: IndexMap<String, StoredKey>,
}

/// Durable registry of API keys and their role/status.
pub struct KeyStore {
    path: PathBuf,
    admin_key: String,
    table: RwLock<IndexMap<String, StoredKey>>,
}

/// Generate a new opaque API key token (32 bytes of randomness).
fn generate_api_key() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

impl KeyStore {
    /// Open the key table at `path`, loading any previously persisted keys.
    ///
    /// A missing file is an empty table, not an error.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persistence` if the file exists but cannot be read
    /// or parsed.
    pub fn open(path: impl Into<PathBuf>, admin_key: impl Into<String>) -> Result<Self, AppError> {
        let path = path.into();
        let table = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let file: KeyTableFile = serde_json::from_str(&contents)
                .map_err(std::io::Error::from)?;
            file.api_keys
        } else {
            IndexMap::new()
        };

        Ok(Self {
            path,
            admin_key: admin_key.into(),
            table: RwLock::new(table),
        })
    }

    /// Generate a new client key, append it, and persist the table.
    ///
    /// The token is regenerated until unique against both the table and the
    /// admin key, all under the write lock, so concurrent calls can never
    /// emit a duplicate. If the persist fails the insertion is rolled back
    /// and the previous durable state stands.
    pub fn create_key(&self) -> Result<ApiKeyRecord, AppError> {
        let mut table = self.table.write().expect("key table lock poisoned");

        let key = loop {
            let candidate = generate_api_key();
            if candidate != self.admin_key && !table.contains_key(&candidate) {
                break candidate;
            }
        };

        let stored = StoredKey {
            role: KeyRole::Client,
            status: KeyStatus::Active,
            created_at: Utc::now(),
        };
        table.insert(key.clone(), stored.clone());

        if let Err(err) = self.persist(&table) {
            table.shift_remove(&key);
            return Err(err);
        }

        tracing::info!("Added new API key: {}...", &key[..8]);

        Ok(ApiKeyRecord {
            key,
            role: stored.role,
            status: stored.status,
            created_at: stored.created_at,
        })
    }

    /// Mark a key as revoked and persist the table.
    ///
    /// Returns whether a record was found and changed. Revoking the admin
    /// master key is explicitly rejected, and revoking an unknown or
    /// already-revoked key is a no-op; all three return `Ok(false)`.
    /// Revocation is permanent.
    pub fn revoke_key(&self, key: &str) -> Result<bool, AppError> {
        if key == self.admin_key {
            tracing::warn!("Refusing to revoke the admin master key");
            return Ok(false);
        }

        let mut table = self.table.write().expect("key table lock poisoned");

        let Some(stored) = table.get_mut(key) else {
            return Ok(false);
        };
        if stored.status != KeyStatus::Active {
            return Ok(false);
        }
        stored.status = KeyStatus::Revoked;

        if let Err(err) = self.persist(&table) {
            // Roll back so memory matches the surviving file
            if let Some(stored) = table.get_mut(key) {
                stored.status = KeyStatus::Active;
            }
            return Err(err);
        }

        tracing::info!("Revoked API key: {}...", &key[..key.len().min(8)]);
        Ok(true)
    }

    /// Check whether `key` satisfies the required trust tier.
    ///
    /// The admin master key satisfies both tiers. Client records satisfy the
    /// client tier only while active. Never errors: a malformed or unknown
    /// key string simply fails the check.
    pub fn validate_key(&self, key: &str, required_role: KeyRole) -> bool {
        if key == self.admin_key {
            return true;
        }

        match required_role {
            KeyRole::Admin => false,
            KeyRole::Client => {
                let table = self.table.read().expect("key table lock poisoned");
                table
                    .get(key)
                    .is_some_and(|stored| stored.status == KeyStatus::Active)
            }
        }
    }

    /// Whether `key` is exactly the admin master key.
    pub fn is_admin_key(&self, key: &str) -> bool {
        key == self.admin_key
    }

    /// Lifecycle state of a client key, if the table knows it.
    pub fn status_of(&self, key: &str) -> Option<KeyStatus> {
        let table = self.table.read().expect("key table lock poisoned");
        table.get(key).map(|stored| stored.status)
    }

    /// All records in insertion order (admin-only view).
    pub fn list_keys(&self) -> Vec<ApiKeyRecord> {
        let table = self.table.read().expect("key table lock poisoned");
        table
            .iter()
            .map(|(key, stored)| ApiKeyRecord {
                key: key.clone(),
                role: stored.role,
                status: stored.status,
                created_at: stored.created_at,
            })
            .collect()
    }

    /// Write the full table to disk with atomic replace.
    fn persist(&self, table: &IndexMap<String, StoredKey>) -> Result<(), AppError> {
        let file = KeyTableFile {
            api_keys: table.clone(),
        };
        super::replace_json_file(&self.path, &file)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const ADMIN: &str = "admin-master-key";

    fn open_store(dir: &tempfile::TempDir) -> KeyStore {
        KeyStore::open(dir.path().join("api_keys.json"), ADMIN).unwrap()
    }

    #[test]
    fn created_keys_are_pairwise_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        let mut keys: Vec<String> = (0..16)
            .map(|_| store.create_key().unwrap().key)
            .collect();
        keys.sort();
        keys.dedup();

        assert_eq!(keys.len(), 16);
    }

    #[test]
    fn revoked_key_never_validates_again() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        let record = store.create_key().unwrap();
        assert!(store.validate_key(&record.key, KeyRole::Client));

        assert!(store.revoke_key(&record.key).unwrap());
        assert!(!store.validate_key(&record.key, KeyRole::Client));

        // Revoking again reports nothing changed
        assert!(!store.revoke_key(&record.key).unwrap());
    }

    #[test]
    fn admin_key_satisfies_both_tiers_and_cannot_be_revoked() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        assert!(store.validate_key(ADMIN, KeyRole::Admin));
        assert!(store.validate_key(ADMIN, KeyRole::Client));

        assert!(!store.revoke_key(ADMIN).unwrap());
        assert!(store.validate_key(ADMIN, KeyRole::Admin));
    }

    #[test]
    fn client_key_never_satisfies_admin_tier() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        let record = store.create_key().unwrap();
        assert!(!store.validate_key(&record.key, KeyRole::Admin));
    }

    #[test]
    fn unknown_key_fails_validation_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        assert!(!store.validate_key("", KeyRole::Client));
        assert!(!store.validate_key("not a key \u{1F600}", KeyRole::Client));
        assert!(!store.revoke_key("nonexistent").unwrap());
    }

    #[test]
    fn list_preserves_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        let first = store.create_key().unwrap().key;
        let second = store.create_key().unwrap().key;
        let third = store.create_key().unwrap().key;

        let listed: Vec<String> = store.list_keys().into_iter().map(|r| r.key).collect();
        assert_eq!(listed, vec![first, second, third]);
    }

    #[test]
    fn table_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_keys.json");

        let (kept, revoked) = {
            let store = KeyStore::open(&path, ADMIN).unwrap();
            let kept = store.create_key().unwrap().key;
            let revoked = store.create_key().unwrap().key;
            store.revoke_key(&revoked).unwrap();
            (kept, revoked)
        };

        let reopened = KeyStore::open(&path, ADMIN).unwrap();
        assert!(reopened.validate_key(&kept, KeyRole::Client));
        assert!(!reopened.validate_key(&revoked, KeyRole::Client));
        assert_eq!(reopened.status_of(&revoked), Some(KeyStatus::Revoked));
        assert_eq!(reopened.list_keys().len(), 2);
    }

    #[test]
    fn concurrent_creates_lose_no_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_keys.json");
        let store = Arc::new(KeyStore::open(&path, ADMIN).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..4 {
                        store.create_key().unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.list_keys().len(), 32);

        // Every record reached the durable table too
        let reopened = KeyStore::open(&path, ADMIN).unwrap();
        assert_eq!(reopened.list_keys().len(), 32);
    }

    #[test]
    fn missing_file_is_an_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        assert!(store.list_keys().is_empty());
    }
}
