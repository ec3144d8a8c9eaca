use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No API token configured. Set REPLICATE_API_TOKEN or add `api_token` to {0}")]
    MissingToken(PathBuf),

    #[error("No image with id {0}")]
    NotFound(Uuid),

    #[error("{0}")]
    Generation(String),
}
