//! Resource-strategy settings store.
//!
//! Holds the last committed, validated settings and persists every
//! successful mutation atomically. Readers always get a complete value;
//! rejected updates leave both the in-memory value and the file untouched.

use crate::error::AppError;
use crate::models::settings::{ResourceStrategySettings, SettingsUpdate};
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, RwLock};

/// Durable, admin-mutable configuration of model identifiers and
/// resource-offload strategy.
///
/// # Concurrency
///
/// Updates are serialized by a writer mutex and persist to disk *before*
/// publishing, so a settings read waits at most for the in-memory swap,
/// never for the file write of a concurrent reader's lock.
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<ResourceStrategySettings>,
    writer: Mutex<()>,
}

impl SettingsStore {
    /// Open the settings file at `path`.
    ///
    /// A missing file yields the built-in defaults; the file is then
    /// created on the first successful update.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persistence` if the file exists but cannot be
    /// read or parsed, and `AppError::SettingsValidation` if it parses into
    /// a combination the validator no longer accepts (e.g. after a
    /// hand-edit).
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        let settings = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let settings: ResourceStrategySettings =
                serde_json::from_str(&contents).map_err(std::io::Error::from)?;
            settings
                .validate()
                .map_err(AppError::SettingsValidation)?;
            settings
        } else {
            ResourceStrategySettings::default()
        };

        Ok(Self {
            path,
            current: RwLock::new(settings),
            writer: Mutex::new(()),
        })
    }

    /// The last committed settings.
    pub fn get(&self) -> ResourceStrategySettings {
        self.current.read().expect("settings lock poisoned").clone()
    }

    /// Apply a full or partial update.
    ///
    /// The candidate is validated against the enumerated allowed set; a
    /// rejection carries every violated constraint and commits nothing.
    /// On success the new value is persisted atomically, then published to
    /// readers, and returned.
    pub fn update(&self, update: &SettingsUpdate) -> Result<ResourceStrategySettings, AppError> {
        let _writer = self.writer.lock().expect("settings writer lock poisoned");

        let candidate = update.apply_to(&self.get());
        candidate
            .validate()
            .map_err(AppError::SettingsValidation)?;

        // Durable first: if the disk write fails the committed value stands
        super::replace_json_file(&self.path, &candidate)?;

        *self.current.write().expect("settings lock poisoned") = candidate.clone();

        tracing::info!(
            offload_mode = ?candidate.offload_mode,
            precision = ?candidate.precision,
            "Settings updated"
        );

        Ok(candidate)
    }
}
