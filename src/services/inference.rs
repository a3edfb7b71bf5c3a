//! Inference collaborator abstraction.
//!
//! This module defines the `ImagePipeline` trait which abstracts the actual
//! diffusion pipelines. The model forward pass is an external collaborator:
//! the service hands it an execution policy and raw request parameters and
//! gets PNG bytes back. Calls are synchronous and thread-blocking (model
//! execution does not yield), so handlers run them under
//! `tokio::task::spawn_blocking` while holding a dispatcher slot.

use crate::services::planner::ExecutionPolicy;

pub mod stub;

pub use stub::StubPipeline;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, InferenceError>;

/// Errors surfaced by the inference collaborator.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("failed to load model '{0}'")]
    ModelLoad(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("unsupported reference image: {0}")]
    InvalidImage(String),
}

/// One generated image as returned by a pipeline.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    /// Encoded PNG bytes, ready to write to the artifacts root
    pub png_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Result of an upscale run, carrying the source dimensions the pipeline
/// decoded along the way.
#[derive(Debug, Clone)]
pub struct UpscaledImage {
    pub image: GeneratedImage,
    pub original_width: u32,
    pub original_height: u32,
}

/// The external diffusion collaborator.
///
/// Every call receives the freshly planned `ExecutionPolicy`; the pipeline
/// decides internally how to honor device placement, precision, offload,
/// and retention.
pub trait ImagePipeline: Send + Sync {
    /// Generate `num_images` images from a text prompt.
    fn text_to_image(
        &self,
        policy: &ExecutionPolicy,
        model_id: &str,
        prompt: &str,
        negative_prompt: Option<&str>,
        guidance_scale: f32,
        num_images: u32,
    ) -> Result<Vec<GeneratedImage>>;

    /// Generate `num_images` variations of a reference image.
    fn image_to_image(
        &self,
        policy: &ExecutionPolicy,
        model_id: &str,
        prompt: &str,
        reference_png: &[u8],
        strength: f32,
        num_images: u32,
    ) -> Result<Vec<GeneratedImage>>;

    /// Upscale a source image.
    fn upscale(
        &self,
        policy: &ExecutionPolicy,
        model_id: &str,
        prompt: &str,
        source_png: &[u8],
    ) -> Result<UpscaledImage>;
}
