//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `ADMIN_API_KEY` (required): the master key; authenticates every admin operation
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 8000
/// - `BASE_URL` (optional): public base URL embedded in download links, defaults to `http://localhost:8000`
/// - `DATA_DIR` (optional): directory holding the key table and settings files, defaults to the working directory
/// - `GENERATED_IMAGES_DIR` (optional): artifacts root for generated images, defaults to `generated_images`
/// - `MAX_CONCURRENT_GENERATIONS` (optional): inference execution slots, defaults to 1 (single shared accelerator)
/// - `MAX_WAITING_GENERATIONS` (optional): bounded wait queue size, 0 means unlimited, defaults to 8
/// - `MAX_GENERATION_WAIT_SECS` (optional): how long a request may wait for a slot, defaults to 120
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub admin_api_key: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_images_dir")]
    pub generated_images_dir: PathBuf,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_generations: usize,

    #[serde(default = "default_max_waiting")]
    pub max_waiting_generations: usize,

    #[serde(default = "default_max_wait_secs")]
    pub max_generation_wait_secs: u64,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    8000
}

/// Default public base URL for download links.
fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

/// Default directory for the persisted key table and settings.
fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Default artifacts root for generated images.
fn default_images_dir() -> PathBuf {
    PathBuf::from("generated_images")
}

/// One execution slot: the observed deployment shares a single accelerator.
fn default_max_concurrent() -> usize {
    1
}

/// Default bounded wait queue size.
fn default_max_waiting() -> usize {
    8
}

/// Default slot wait timeout in seconds.
fn default_max_wait_secs() -> u64 {
    120
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., ADMIN_API_KEY)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Parse environment variables into Config struct
        // Field names are automatically converted: admin_api_key -> ADMIN_API_KEY
        envy::from_env::<Config>()
    }
}
