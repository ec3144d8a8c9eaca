use serde::{Deserialize, Serialize};

/// Remote models the app knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageModel {
    #[default]
    DisposableCamera,
    FaceRestoration,
}

impl ImageModel {
    /// Model name for display
    pub fn name(&self) -> &str {
        match self {
            Self::DisposableCamera => "Disposable Camera",
            Self::FaceRestoration => "Face Restoration",
        }
    }

    /// Version identifier sent as `version` when creating a prediction
    pub fn version(&self) -> &str {
        match self {
            Self::DisposableCamera => {
                "levelsio/disposable-camera:4c8511f55da3561433a89774d0a5c5281594772ecc83130a52c07c6f72a4e550"
            }
            Self::FaceRestoration => {
                "tencentarc/gfpgan:9283608cc6b7be6b65a8e44983db012355fde4132009bf99d976b2f0896856a3"
            }
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::DisposableCamera => "Film look text-to-image, like a throwaway camera snapshot",
            Self::FaceRestoration => "GFPGAN face restoration for old or blurry photos",
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Self::DisposableCamera => ModelKind::Generation,
            Self::FaceRestoration => ModelKind::Restoration,
        }
    }

    /// All available models
    pub fn all() -> [ImageModel; 2] {
        [Self::DisposableCamera, Self::FaceRestoration]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Generation,
    Restoration,
}

/// What produced an image, stored with every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    Generated,
    Restored,
}

impl ModelKind {
    pub fn image_type(&self) -> ImageType {
        match self {
            Self::Generation => ImageType::Generated,
            Self::Restoration => ImageType::Restored,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    #[default]
    Square,
    Landscape,
    Portrait,
}

impl AspectRatio {
    /// Value of the `aspect_ratio` input field
    pub fn as_param(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "square" | "1:1" => Some(Self::Square),
            "landscape" | "16:9" => Some(Self::Landscape),
            "portrait" | "9:16" => Some(Self::Portrait),
            _ => None,
        }
    }
}

/// Quality presets exposed in settings. Each maps to a step count and
/// guidance scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl ImageQuality {
    pub fn inference_steps(&self) -> u32 {
        match self {
            Self::Low => 20,
            Self::Medium => 30,
            Self::High => 50,
        }
    }

    pub fn guidance_scale(&self) -> f32 {
        match self {
            Self::Low => 7.0,
            Self::Medium => 7.5,
            Self::High => 8.0,
        }
    }
}
