//! Resource-strategy settings model.
//!
//! These settings decide which model checkpoints the service runs and how
//! their working sets are shared between accelerator and host memory. They
//! are a closed, enumerated type: every field is validated against an
//! allowed set before being committed, and update payloads carrying unknown
//! fields are rejected outright.

use serde::{Deserialize, Serialize};

/// Strategy controlling how much of a model's working set resides off the
/// accelerator to conserve memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffloadMode {
    /// Entire pipeline stays resident on the execution device
    None,
    /// Whole sub-models are moved to host memory between pipeline stages
    CpuOffload,
    /// Individual layers stream through the accelerator one at a time
    SequentialOffload,
}

/// Numeric precision the pipelines are loaded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Fp16,
    Fp32,
    /// Quantized weights; requires the CUDA quantization backend
    Int8,
}

/// Whether a loaded pipeline is kept in memory between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRetention {
    /// Cache the loaded pipeline for the next request
    Keep,
    /// Drop the pipeline after each request to reclaim memory
    Reload,
}

/// The committed resource-strategy configuration.
///
/// Lifecycle: loaded from durable storage at process start (built-in
/// defaults when the file is absent), mutated only through the
/// admin-authenticated settings endpoint, persisted atomically on every
/// successful mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStrategySettings {
    /// Checkpoint used for text-to-image generation
    pub text_to_image_model_id: String,

    /// Checkpoint used for image-to-image generation
    pub image_to_image_model_id: String,

    /// Checkpoint used for upscaling
    pub upscale_model_id: String,

    /// Accelerator memory offload strategy
    pub offload_mode: OffloadMode,

    /// Requested numeric precision
    pub precision: Precision,

    /// Pipeline caching behavior between requests
    pub model_retention: ModelRetention,
}

impl Default for ResourceStrategySettings {
    fn default() -> Self {
        Self {
            text_to_image_model_id: "stabilityai/stable-diffusion-3.5-large".to_string(),
            image_to_image_model_id: "stabilityai/stable-diffusion-3.5-large".to_string(),
            upscale_model_id: "stabilityai/stable-diffusion-x4-upscaler".to_string(),
            offload_mode: OffloadMode::None,
            precision: Precision::Fp16,
            model_retention: ModelRetention::Keep,
        }
    }
}

impl ResourceStrategySettings {
    /// Validate the candidate against the enumerated allowed set.
    ///
    /// Returns every violated constraint, not just the first, so the admin
    /// can fix a bad payload in one round trip.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.text_to_image_model_id.trim().is_empty() {
            errors.push("text_to_image_model_id must not be empty".to_string());
        }
        if self.image_to_image_model_id.trim().is_empty() {
            errors.push("image_to_image_model_id must not be empty".to_string());
        }
        if self.upscale_model_id.trim().is_empty() {
            errors.push("upscale_model_id must not be empty".to_string());
        }

        // The quantization backend manages device placement itself and
        // cannot stream layers through the accelerator
        if self.precision == Precision::Int8 && self.offload_mode == OffloadMode::SequentialOffload {
            errors.push(
                "int8 precision cannot be combined with sequential_offload".to_string(),
            );
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Partial update payload for the settings endpoint.
///
/// Absent fields keep their committed value. Unknown fields fail
/// deserialization, so arbitrary keys can never reach the store.
///
/// # Example
///
/// ```json
/// {
///   "offload_mode": "sequential_offload",
///   "precision": "fp32"
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsUpdate {
    pub text_to_image_model_id: Option<String>,
    pub image_to_image_model_id: Option<String>,
    pub upscale_model_id: Option<String>,
    pub offload_mode: Option<OffloadMode>,
    pub precision: Option<Precision>,
    pub model_retention: Option<ModelRetention>,
}

impl SettingsUpdate {
    /// Merge this partial payload over the committed settings.
    pub fn apply_to(&self, base: &ResourceStrategySettings) -> ResourceStrategySettings {
        ResourceStrategySettings {
            text_to_image_model_id: self
                .text_to_image_model_id
                .clone()
                .unwrap_or_else(|| base.text_to_image_model_id.clone()),
            image_to_image_model_id: self
                .image_to_image_model_id
                .clone()
                .unwrap_or_else(|| base.image_to_image_model_id.clone()),
            upscale_model_id: self
                .upscale_model_id
                .clone()
                .unwrap_or_else(|| base.upscale_model_id.clone()),
            offload_mode: self.offload_mode.unwrap_or(base.offload_mode),
            precision: self.precision.unwrap_or(base.precision),
            model_retention: self.model_retention.unwrap_or(base.model_retention),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ResourceStrategySettings::default().validate().is_ok());
    }

    #[test]
    fn int8_with_sequential_offload_is_rejected() {
        let settings = ResourceStrategySettings {
            precision: Precision::Int8,
            offload_mode: OffloadMode::SequentialOffload,
            ..Default::default()
        };

        let errors = settings.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("int8"));
    }

    #[test]
    fn validation_reports_every_violation() {
        let settings = ResourceStrategySettings {
            text_to_image_model_id: "".to_string(),
            upscale_model_id: "   ".to_string(),
            precision: Precision::Int8,
            offload_mode: OffloadMode::SequentialOffload,
            ..Default::default()
        };

        let errors = settings.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn partial_update_keeps_unset_fields() {
        let base = ResourceStrategySettings::default();
        let update = SettingsUpdate {
            offload_mode: Some(OffloadMode::CpuOffload),
            ..Default::default()
        };

        let merged = update.apply_to(&base);
        assert_eq!(merged.offload_mode, OffloadMode::CpuOffload);
        assert_eq!(merged.precision, base.precision);
        assert_eq!(merged.text_to_image_model_id, base.text_to_image_model_id);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let payload = serde_json::json!({
            "offload_mode": "cpu_offload",
            "use_cpu_offloading": true
        });

        assert!(serde_json::from_value::<SettingsUpdate>(payload).is_err());
    }

    #[test]
    fn unknown_enum_values_are_rejected() {
        let payload = serde_json::json!({ "precision": "int4" });

        assert!(serde_json::from_value::<SettingsUpdate>(payload).is_err());
    }
}
