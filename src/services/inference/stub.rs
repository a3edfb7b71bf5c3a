//! Stub pipeline implementation.
//!
//! Produces fixed placeholder PNGs without touching any model weights.
//! Useful for development, tests, and deployments where the real pipelines
//! are wired in separately.

use crate::services::inference::{
    GeneratedImage, ImagePipeline, InferenceError, Result, UpscaledImage,
};
use crate::services::planner::ExecutionPolicy;

/// Smallest valid PNG (1x1 pixel) used as the placeholder artifact.
const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Nominal output edge for generated placeholders.
const OUTPUT_EDGE: u32 = 1024;

/// Upscale factor of the x4 upscaler the stub stands in for.
const UPSCALE_FACTOR: u32 = 4;

/// Pipeline stand-in returning placeholder PNGs.
pub struct StubPipeline;

impl StubPipeline {
    fn placeholder(&self, policy: &ExecutionPolicy, model_id: &str) -> GeneratedImage {
        tracing::debug!(
            model_id,
            device = ?policy.device,
            precision = ?policy.precision,
            offload_mode = ?policy.offload_mode,
            "Stub pipeline producing placeholder image"
        );
        GeneratedImage {
            png_bytes: PLACEHOLDER_PNG.to_vec(),
            width: OUTPUT_EDGE,
            height: OUTPUT_EDGE,
        }
    }
}

impl ImagePipeline for StubPipeline {
    fn text_to_image(
        &self,
        policy: &ExecutionPolicy,
        model_id: &str,
        _prompt: &str,
        _negative_prompt: Option<&str>,
        _guidance_scale: f32,
        num_images: u32,
    ) -> Result<Vec<GeneratedImage>> {
        Ok((0..num_images)
            .map(|_| self.placeholder(policy, model_id))
            .collect())
    }

    fn image_to_image(
        &self,
        policy: &ExecutionPolicy,
        model_id: &str,
        _prompt: &str,
        reference_png: &[u8],
        _strength: f32,
        num_images: u32,
    ) -> Result<Vec<GeneratedImage>> {
        if reference_png.is_empty() {
            return Err(InferenceError::InvalidImage(
                "reference image is empty".to_string(),
            ));
        }

        Ok((0..num_images)
            .map(|_| self.placeholder(policy, model_id))
            .collect())
    }

    fn upscale(
        &self,
        policy: &ExecutionPolicy,
        model_id: &str,
        _prompt: &str,
        source_png: &[u8],
    ) -> Result<UpscaledImage> {
        if source_png.is_empty() {
            return Err(InferenceError::InvalidImage(
                "source image is empty".to_string(),
            ));
        }

        let mut image = self.placeholder(policy, model_id);
        image.width = OUTPUT_EDGE * UPSCALE_FACTOR;
        image.height = OUTPUT_EDGE * UPSCALE_FACTOR;

        Ok(UpscaledImage {
            image,
            original_width: OUTPUT_EDGE,
            original_height: OUTPUT_EDGE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::settings::ResourceStrategySettings;
    use crate::services::planner::{HardwareSnapshot, plan};

    fn policy() -> ExecutionPolicy {
        let snapshot = HardwareSnapshot {
            accelerator: None,
            total_memory_bytes: 0,
        };
        plan(&ResourceStrategySettings::default(), &snapshot)
    }

    #[test]
    fn returns_the_requested_number_of_images() {
        let images = StubPipeline
            .text_to_image(&policy(), "model", "prompt", None, 7.5, 3)
            .unwrap();
        assert_eq!(images.len(), 3);
        assert!(images.iter().all(|img| !img.png_bytes.is_empty()));
    }

    #[test]
    fn empty_reference_image_is_rejected() {
        let err = StubPipeline
            .image_to_image(&policy(), "model", "prompt", &[], 0.8, 1)
            .unwrap_err();
        assert!(matches!(err, InferenceError::InvalidImage(_)));
    }

    #[test]
    fn upscale_reports_both_resolutions() {
        let upscaled = StubPipeline
            .upscale(&policy(), "model", "prompt", PLACEHOLDER_PNG)
            .unwrap();
        assert_eq!(upscaled.image.width, upscaled.original_width * 4);
        assert_eq!(upscaled.image.height, upscaled.original_height * 4);
    }
}
