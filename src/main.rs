//! Image Generation Service - Main Application Entry Point
//!
//! This is a REST API server fronting diffusion image generation. Clients authenticate with per-client API keys; an admin holding the master key issues and revokes those keys and tunes the resource strategy the models run under. Generated images come back as key-bound download links.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Persistence**: JSON files replaced atomically on every mutation
//! - **Authentication**: API key in the X-API-Key header, two trust tiers
//! - **Inference**: external pipeline behind a bounded-concurrency dispatcher
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Open the key table and settings stores from the data directory
//! 3. Probe the hardware and log the startup execution policy
//! 4. Build HTTP router with public, client, and admin route groups
//! 5. Start server on configured port

mod config;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;
mod store;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::dispatcher::GenerationDispatcher;
use crate::services::inference::{ImagePipeline, StubPipeline};
use crate::services::planner::{HardwareSnapshot, plan};
use crate::store::{KeyStore, SettingsStore};

/// Shared application state handed to every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    /// API key table plus the admin master key
    pub keys: Arc<KeyStore>,

    /// Committed resource-strategy settings
    pub settings: Arc<SettingsStore>,

    /// Bounded-concurrency gate in front of inference
    pub dispatcher: Arc<GenerationDispatcher>,

    /// The external inference collaborator
    pub pipeline: Arc<dyn ImagePipeline>,

    /// Artifacts root for generated images
    pub images_dir: PathBuf,

    /// Public base URL embedded in download links
    pub base_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Open durable stores
    let keys = Arc::new(KeyStore::open(
        config.data_dir.join("api_keys.json"),
        config.admin_api_key.clone(),
    )?);
    let settings = Arc::new(SettingsStore::open(
        config.data_dir.join("application_settings.json"),
    )?);
    tracing::info!("Key table and settings stores opened");

    // Log what the committed settings resolve to on this hardware
    let startup_policy = plan(&settings.get(), &HardwareSnapshot::detect());
    tracing::info!(
        device = ?startup_policy.device,
        precision = ?startup_policy.precision,
        offload_mode = ?startup_policy.offload_mode,
        "Startup execution policy"
    );

    let dispatcher = Arc::new(GenerationDispatcher::new(
        config.max_concurrent_generations,
        config.max_waiting_generations,
        Duration::from_secs(config.max_generation_wait_secs),
    ));

    let state = AppState {
        keys,
        settings,
        dispatcher,
        pipeline: Arc::new(StubPipeline),
        images_dir: config.generated_images_dir.clone(),
        base_url: config.base_url.clone(),
    };

    // Client-authenticated generation routes
    let client_routes = Router::new()
        .route(
            "/v1/generate/text-to-image",
            post(handlers::images::text_to_image),
        )
        .route(
            "/v1/generate/image-to-image",
            post(handlers::images::image_to_image),
        )
        .route("/v1/upscale/image", post(handlers::images::upscale_image))
        // Apply client-tier authentication to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_client_key,
        ));

    // Admin-authenticated management routes
    let admin_routes = Router::new()
        .route("/admin/keys", post(handlers::admin::create_api_key))
        .route("/admin/keys", get(handlers::admin::list_api_keys))
        .route("/admin/keys/{key}", delete(handlers::admin::revoke_api_key))
        .route(
            "/admin/validate-key",
            get(handlers::admin::validate_admin_key),
        )
        .route("/admin/settings", get(handlers::admin::get_settings))
        .route("/admin/settings", put(handlers::admin::update_settings))
        // Apply admin-tier authentication to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_admin_key,
        ));

    // Combine with public routes
    let app = Router::new()
        // Public routes (no header authentication required)
        .route("/health", get(handlers::health::health_check))
        // Downloads carry their key as a query parameter instead
        .route(
            "/downloads/{filename}",
            get(handlers::images::download_image),
        )
        .merge(client_routes)
        .merge(admin_routes)
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        // Download links are shared around; keep the surface open to browsers
        .layer(CorsLayer::permissive())
        // Share state with all handlers via State extraction
        .with_state(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Start serving HTTP requests
    // This blocks forever, handling requests concurrently with tokio
    axum::serve(listener, app).await?;

    Ok(())
}
