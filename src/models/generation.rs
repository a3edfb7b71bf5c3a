//! Generation request and response models.
//!
//! These map the public generation endpoints' JSON bodies. Image uploads
//! (image-to-image, upscale) arrive as multipart forms and are parsed field
//! by field in the handlers, so only their response shapes live here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to generate images from a text prompt.
///
/// # Example
///
/// ```json
/// {
///   "prompt": "a lighthouse at dusk",
///   "num_images": 2,
///   "negative_prompt": "blurry",
///   "guidance_scale": 7.5
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct TextToImageRequest {
    pub prompt: String,

    #[serde(default = "default_num_images")]
    pub num_images: u32,

    pub negative_prompt: Option<String>,

    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f32,
}

/// Default number of images per generation request.
fn default_num_images() -> u32 {
    1
}

/// Default classifier-free guidance scale.
fn default_guidance_scale() -> f32 {
    7.5
}

/// Response for text-to-image and image-to-image generation.
///
/// # Example
///
/// ```json
/// {
///   "status": "success",
///   "image_urls": [
///     "http://localhost:8000/downloads/550e8400-....png?api_key=..."
///   ],
///   "generated_at": "2025-01-15T10:30:00Z"
/// }
/// ```
///
/// Each URL embeds the key that made the request, so the link works when
/// pasted as-is.
#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    pub status: String,
    pub image_urls: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Response for the upscale endpoint.
///
/// Resolutions are reported as `"{width}x{height}"` strings.
#[derive(Debug, Serialize)]
pub struct UpscaleImageResponse {
    pub status: String,
    pub image_url: String,
    pub original_resolution: String,
    pub new_resolution: String,
    pub generated_at: DateTime<Utc>,
}
