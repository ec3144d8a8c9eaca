use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::client::DEFAULT_API_BASE;
use crate::model_types::{ImageModel, ImageQuality};
use crate::poller::{PollPolicy, DEFAULT_MAX_POLL_ATTEMPTS};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// How a multi-image request runs its cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    #[default]
    Concurrent,
    Sequential,
}

/// What happens to finished images when another cycle of the same batch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchFailurePolicy {
    #[default]
    AbortOnFirstError,
    KeepPartial,
}

/// User preferences, persisted as JSON. Every field has a default so older
/// files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_token: String,
    pub api_base: String,
    pub images_per_call: u32,
    pub max_images_per_call: u32,
    pub quality: ImageQuality,
    /// Overrides the quality preset when set
    pub num_inference_steps: Option<u32>,
    pub guidance_scale: Option<f32>,
    pub default_model: ImageModel,
    pub auto_save: bool,
    /// Records kept in the image store, oldest dropped first
    pub max_images: usize,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    pub request_timeout_secs: u64,
    pub batch_mode: BatchMode,
    pub batch_failure_policy: BatchFailurePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            images_per_call: 1,
            max_images_per_call: 4,
            quality: ImageQuality::default(),
            num_inference_steps: None,
            guidance_scale: None,
            default_model: ImageModel::default(),
            auto_save: true,
            max_images: 50,
            poll_interval_ms: 1000,
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            request_timeout_secs: 30,
            batch_mode: BatchMode::default(),
            batch_failure_policy: BatchFailurePolicy::default(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&data)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_images_per_call == 0 {
            return Err(SettingsError::Invalid {
                field: "max_images_per_call",
                reason: "must be at least 1".into(),
            });
        }
        if self.images_per_call == 0 || self.images_per_call > self.max_images_per_call {
            return Err(SettingsError::Invalid {
                field: "images_per_call",
                reason: format!("must be between 1 and {}", self.max_images_per_call),
            });
        }
        if self.max_poll_attempts == 0 {
            return Err(SettingsError::Invalid {
                field: "max_poll_attempts",
                reason: "must be at least 1".into(),
            });
        }
        if let Some(scale) = self.guidance_scale {
            if !scale.is_finite() || scale < 0.0 {
                return Err(SettingsError::Invalid {
                    field: "guidance_scale",
                    reason: format!("{scale} is not a valid guidance scale"),
                });
            }
        }
        Ok(())
    }

    pub fn inference_steps(&self) -> u32 {
        self.num_inference_steps.unwrap_or_else(|| self.quality.inference_steps())
    }

    pub fn guidance_scale(&self) -> f32 {
        self.guidance_scale.unwrap_or_else(|| self.quality.guidance_scale())
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.max_poll_attempts,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
