use std::env;
use std::path::PathBuf;
use ir_core::Settings;
use crate::error::AppError;

const DEFAULT_DATA_DIR: &str = "outputs";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub settings_path: PathBuf,
    pub api_token: Option<String>,
    pub api_base: Option<String>,
}

impl AppConfig {
    /// Reads configuration from the environment, after loading `.env` if present.
    pub fn load() -> Result<Self, AppError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(AppError::Config(format!("Failed to read .env: {e}")));
            }
        }

        let data_dir = env::var("IMAGER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));

        let settings_path = env::var("IMAGER_SETTINGS")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("settings.json"));

        let api_token = non_empty_env("REPLICATE_API_TOKEN").or_else(|| non_empty_env("REPLICATE_API_KEY"));

        Ok(Self {
            data_dir,
            settings_path,
            api_token,
            api_base: non_empty_env("IMAGER_API_BASE"),
        })
    }

    pub fn records_path(&self) -> PathBuf {
        self.data_dir.join("images.json")
    }

    pub fn album_dir(&self) -> PathBuf {
        self.data_dir.join("album")
    }

    /// Settings file with environment overrides applied.
    pub fn settings(&self) -> Result<Settings, AppError> {
        let mut settings = Settings::load(&self.settings_path)
            .map_err(|e| AppError::Config(e.to_string()))?;

        if let Some(token) = &self.api_token {
            settings.api_token = token.clone();
        }
        if let Some(base) = &self.api_base {
            settings.api_base = base.clone();
        }

        Ok(settings)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
