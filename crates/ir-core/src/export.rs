use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use image::ImageFormat;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Photo access is not authorized for {0}")]
    NotAuthorized(PathBuf),

    #[error("Failed to download the image: {0}")]
    DownloadFailed(String),

    #[error("The image data could not be processed: {0}")]
    InvalidImageData(#[from] image::ImageError),

    #[error("Failed to save photo: {0}")]
    SaveFailed(#[from] std::io::Error),
}

impl ExportError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotAuthorized(_) => "Photo access is not authorized. Please grant access in Settings.",
            Self::DownloadFailed(_) => "Failed to download the image. Please check your internet connection.",
            Self::InvalidImageData(_) => "The image data could not be processed.",
            Self::SaveFailed(_) => "Failed to save to photo library",
        }
    }
}

/// Saves result images into the local album directory as PNG.
#[derive(Debug, Clone)]
pub struct PhotoExporter {
    http: reqwest::Client,
    album_dir: PathBuf,
}

impl PhotoExporter {
    pub fn new(album_dir: impl Into<PathBuf>) -> Result<Self, ExportError> {
        let http = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| ExportError::DownloadFailed(e.to_string()))?;

        Ok(Self {
            http,
            album_dir: album_dir.into(),
        })
    }

    pub fn album_dir(&self) -> &Path {
        &self.album_dir
    }

    /// Downloads `url`, re-encodes it as PNG and writes it into the album.
    /// Returns the path of the saved file.
    pub async fn save_to_album(&self, url: &Url) -> Result<PathBuf, ExportError> {
        self.authorize()?;

        debug!("Downloading {url}");
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ExportError::DownloadFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::DownloadFailed(format!("HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ExportError::DownloadFailed(e.to_string()))?;
        debug!("Downloaded {} bytes", bytes.len());

        let path = self.album_dir.join(format!("{}.png", Uuid::new_v4()));
        let target = path.clone();
        let (width, height) = tokio::task::spawn_blocking(move || write_png(&bytes, &target))
            .await
            .map_err(|e| ExportError::SaveFailed(std::io::Error::other(e)))??;

        info!("Saved {}x{} image to {}", width, height, path.display());
        Ok(path)
    }

    fn authorize(&self) -> Result<(), ExportError> {
        std::fs::create_dir_all(&self.album_dir).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => ExportError::NotAuthorized(self.album_dir.clone()),
            _ => ExportError::SaveFailed(e),
        })
    }
}

/// Decodes `bytes` and writes them to `path` as PNG. Blocking.
fn write_png(bytes: &[u8], path: &Path) -> Result<(u32, u32), ExportError> {
    let decoded = image::load_from_memory(bytes)?;
    decoded.save_with_format(path, ImageFormat::Png).map_err(|e| match e {
        image::ImageError::IoError(io) => ExportError::SaveFailed(io),
        other => ExportError::InvalidImageData(other),
    })?;
    Ok((decoded.width(), decoded.height()))
}
