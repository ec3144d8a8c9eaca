pub mod client;
pub mod error;
pub mod events;
pub mod export;
pub mod generator;
mod model_types;
pub mod poller;
pub mod prediction;
pub mod settings;
pub mod store;
#[cfg(test)]
mod test_support;

pub use client::{PredictionApi, PredictionInput, ReplicateClient};
pub use error::{Error, Result};
pub use events::{EventSink, GenerationEvent};
pub use generator::{GenerationMetadata, GenerationResult, Generator, GeneratorStatus};
pub use model_types::{AspectRatio, ImageModel, ImageQuality, ImageType, ModelKind};
pub use prediction::{PredictionJob, PredictionOutput, PredictionStatus};
pub use settings::Settings;
