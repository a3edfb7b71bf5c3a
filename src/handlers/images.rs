//! Image generation and download HTTP handlers.
//!
//! This module implements the generation-related API endpoints:
//! - POST /v1/generate/text-to-image - Generate images from a prompt
//! - POST /v1/generate/image-to-image - Rework a reference image
//! - POST /v1/upscale/image - Upscale an image
//! - GET /downloads/:filename - Fetch a generated image
//!
//! Every generation follows the same shape: the authenticated request
//! acquires an execution slot from the dispatcher, the resource strategy is
//! planned against a fresh hardware probe, the blocking pipeline call runs
//! on the blocking pool, and the resulting PNGs land under the artifacts
//! root with key-bound download URLs pointing at them.

use crate::{
    AppState,
    error::AppError,
    middleware::auth::AuthContext,
    models::generation::{GenerationResponse, TextToImageRequest, UpscaleImageResponse},
    models::settings::ResourceStrategySettings,
    services::downloads,
    services::inference::GeneratedImage,
    services::planner::{ExecutionPolicy, HardwareSnapshot, plan},
};
use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

/// Generate images from a text prompt.
///
/// # Endpoint
///
/// `POST /v1/generate/text-to-image`
///
/// # Authentication
///
/// Requires a valid API key in the X-API-Key header (client tier).
///
/// # Request Body
///
/// ```json
/// {
///   "prompt": "a lighthouse at dusk",
///   "num_images": 1,
///   "negative_prompt": "blurry",   // optional
///   "guidance_scale": 7.5
/// }
/// ```
///
/// # Response
///
/// - **Success (200 OK)**: URLs for each generated image, each embedding
///   the caller's key so the link works stand-alone
/// - **Error (401)**: Invalid API key
/// - **Error (429)**: No execution slot within the wait budget
/// - **Error (500)**: Generation or persistence failure
pub async fn text_to_image(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<TextToImageRequest>,
) -> Result<Json<GenerationResponse>, AppError> {
    if request.num_images == 0 {
        return Err(AppError::InvalidRequest(
            "num_images must be at least 1".to_string(),
        ));
    }

    // Hold an execution slot for the duration of the pipeline call
    let _slot = state.dispatcher.acquire().await?;

    let settings = state.settings.get();
    let policy = plan_for_request(&settings);

    let pipeline = state.pipeline.clone();
    let images = tokio::task::spawn_blocking(move || {
        pipeline.text_to_image(
            &policy,
            &settings.text_to_image_model_id,
            &request.prompt,
            request.negative_prompt.as_deref(),
            request.guidance_scale,
            request.num_images,
        )
    })
    .await
    .map_err(|e| AppError::Inference(e.to_string()))?
    .map_err(|e| AppError::Inference(e.to_string()))?;

    let image_urls = save_images(&state, &auth.api_key, images).await?;

    Ok(Json(GenerationResponse {
        status: "success".to_string(),
        image_urls,
        generated_at: Utc::now(),
    }))
}

/// Modify an existing image based on a text prompt.
///
/// # Endpoint
///
/// `POST /v1/generate/image-to-image` (multipart form)
///
/// # Form Fields
///
/// - `prompt` (required): guidance text
/// - `reference_image` (required): source image file
/// - `num_images` (optional, default 1)
/// - `strength` (optional, default 0.8): how far to stray from the source
pub async fn image_to_image(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    mut multipart: Multipart,
) -> Result<Json<GenerationResponse>, AppError> {
    let mut prompt: Option<String> = None;
    let mut reference_image: Option<Vec<u8>> = None;
    let mut num_images: u32 = 1;
    let mut strength: f32 = 0.8;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?
    {
        match field.name().unwrap_or_default() {
            "prompt" => prompt = Some(read_text(field).await?),
            "reference_image" => reference_image = Some(read_bytes(field).await?),
            "num_images" => {
                num_images = read_text(field).await?.trim().parse().map_err(|_| {
                    AppError::InvalidRequest("num_images must be an integer".to_string())
                })?;
            }
            "strength" => {
                strength = read_text(field).await?.trim().parse().map_err(|_| {
                    AppError::InvalidRequest("strength must be a number".to_string())
                })?;
            }
            // Unknown form fields are ignored
            _ => {}
        }
    }

    let prompt =
        prompt.ok_or_else(|| AppError::InvalidRequest("prompt is required".to_string()))?;
    let reference_image = reference_image
        .ok_or_else(|| AppError::InvalidRequest("reference_image is required".to_string()))?;
    if num_images == 0 {
        return Err(AppError::InvalidRequest(
            "num_images must be at least 1".to_string(),
        ));
    }

    let _slot = state.dispatcher.acquire().await?;

    let settings = state.settings.get();
    let policy = plan_for_request(&settings);

    let pipeline = state.pipeline.clone();
    let images = tokio::task::spawn_blocking(move || {
        pipeline.image_to_image(
            &policy,
            &settings.image_to_image_model_id,
            &prompt,
            &reference_image,
            strength,
            num_images,
        )
    })
    .await
    .map_err(|e| AppError::Inference(e.to_string()))?
    .map_err(|e| AppError::Inference(e.to_string()))?;

    let image_urls = save_images(&state, &auth.api_key, images).await?;

    Ok(Json(GenerationResponse {
        status: "success".to_string(),
        image_urls,
        generated_at: Utc::now(),
    }))
}

/// Default upscale prompt when the form omits one.
const DEFAULT_UPSCALE_PROMPT: &str = "Make the image ultra high res";

/// Upscale an image to higher resolution.
///
/// # Endpoint
///
/// `POST /v1/upscale/image` (multipart form)
///
/// # Form Fields
///
/// - `image_to_upscale` (required): source image file
/// - `prompt` (optional): guidance text for the upscaler
pub async fn upscale_image(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    mut multipart: Multipart,
) -> Result<Json<UpscaleImageResponse>, AppError> {
    let mut prompt = DEFAULT_UPSCALE_PROMPT.to_string();
    let mut source_image: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?
    {
        match field.name().unwrap_or_default() {
            "prompt" => prompt = read_text(field).await?,
            "image_to_upscale" => source_image = Some(read_bytes(field).await?),
            _ => {}
        }
    }

    let source_image = source_image
        .ok_or_else(|| AppError::InvalidRequest("image_to_upscale is required".to_string()))?;

    let _slot = state.dispatcher.acquire().await?;

    let settings = state.settings.get();
    let policy = plan_for_request(&settings);

    let pipeline = state.pipeline.clone();
    let upscaled = tokio::task::spawn_blocking(move || {
        pipeline.upscale(&policy, &settings.upscale_model_id, &prompt, &source_image)
    })
    .await
    .map_err(|e| AppError::Inference(e.to_string()))?
    .map_err(|e| AppError::Inference(e.to_string()))?;

    let original_resolution = format!("{}x{}", upscaled.original_width, upscaled.original_height);
    let new_resolution = format!("{}x{}", upscaled.image.width, upscaled.image.height);

    let mut image_urls = save_images(&state, &auth.api_key, vec![upscaled.image]).await?;

    Ok(Json(UpscaleImageResponse {
        status: "success".to_string(),
        image_url: image_urls.remove(0),
        original_resolution,
        new_resolution,
        generated_at: Utc::now(),
    }))
}

/// Query parameters for the download endpoint.
///
/// The key travels as a query parameter here, not a header, so generated
/// links can be pasted as full URLs.
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub api_key: Option<String>,
}

/// Secure endpoint to download generated images.
///
/// # Endpoint
///
/// `GET /downloads/:filename?api_key=...`
///
/// # Response
///
/// - **Success (200 OK)**: the PNG bytes
/// - **Error (400)**: filename escapes the artifacts root
/// - **Error (401)**: missing or inactive key
/// - **Error (404)**: no such image
pub async fn download_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, AppError> {
    let filepath = downloads::authorize_download(
        &state.keys,
        &state.images_dir,
        &filename,
        query.api_key.as_deref(),
    )?;

    let bytes = tokio::fs::read(&filepath).await?;

    Ok(([(header::CONTENT_TYPE, "image/png")], bytes).into_response())
}

/// Plan the execution policy for one request against a fresh hardware probe.
fn plan_for_request(settings: &ResourceStrategySettings) -> ExecutionPolicy {
    let hardware = HardwareSnapshot::detect();
    plan(settings, &hardware)
}

/// Write generated images under the artifacts root and return their
/// key-bound download URLs.
async fn save_images(
    state: &AppState,
    api_key: &str,
    images: Vec<GeneratedImage>,
) -> Result<Vec<String>, AppError> {
    // Ensure the artifacts root exists
    tokio::fs::create_dir_all(&state.images_dir).await?;

    let mut image_urls = Vec::with_capacity(images.len());
    for image in images {
        let filename = format!("{}.png", Uuid::new_v4());
        tokio::fs::write(state.images_dir.join(&filename), &image.png_bytes).await?;
        image_urls.push(downloads::build_download_url(
            &state.base_url,
            &filename,
            api_key,
        )?);
    }

    Ok(image_urls)
}

/// Read a multipart field as text.
async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::InvalidRequest(e.to_string()))
}

/// Read a multipart field as raw bytes.
async fn read_bytes(field: axum::extract::multipart::Field<'_>) -> Result<Vec<u8>, AppError> {
    Ok(field
        .bytes()
        .await
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?
        .to_vec())
}
