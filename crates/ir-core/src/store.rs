use std::path::PathBuf;
use std::sync::Mutex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;
use crate::generator::{GenerationMetadata, GenerationResult};
use crate::model_types::ImageType;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to write image records: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode image records: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// A finished image the user kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub id: Uuid,
    pub url: Url,
    pub prompt: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub image_type: ImageType,
    pub size: Option<ImageSize>,
    #[serde(default)]
    pub metadata: Option<GenerationMetadata>,
}

impl GeneratedImage {
    pub fn new(url: Url, prompt: Option<String>, image_type: ImageType) -> Self {
        Self {
            id: Uuid::new_v4(),
            url,
            prompt,
            created_at: Utc::now(),
            image_type,
            size: None,
            metadata: None,
        }
    }
}

impl From<GenerationResult> for GeneratedImage {
    fn from(result: GenerationResult) -> Self {
        let mut image = GeneratedImage::new(result.url, result.prompt, result.image_type);
        image.metadata = result.metadata;
        image
    }
}

/// Flat list of image records, persisted as a JSON array.
///
/// Every mutation rewrites the whole file under the lock, so concurrent
/// appends never lose records.
#[derive(Debug)]
pub struct ImageStore {
    path: Option<PathBuf>,
    images: Mutex<Vec<GeneratedImage>>,
}

impl ImageStore {
    /// Open the store at `path`. A missing file is an empty store; a corrupt
    /// one is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let images = if path.exists() {
            let data = std::fs::read(&path)?;
            match serde_json::from_slice::<Vec<GeneratedImage>>(&data) {
                Ok(images) => images,
                Err(e) => {
                    warn!("Ignoring unreadable image records at {}: {}", path.display(), e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        info!("Loaded {} image records from {}", images.len(), path.display());

        Ok(Self {
            path: Some(path),
            images: Mutex::new(images),
        })
    }

    /// Store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            images: Mutex::new(Vec::new()),
        }
    }

    pub fn append(&self, image: GeneratedImage) -> Result<(), StoreError> {
        let mut images = self.lock();
        images.push(image);
        self.persist(&images)
    }

    /// Returns whether a record was removed.
    pub fn remove(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut images = self.lock();
        let before = images.len();
        images.retain(|image| image.id != id);
        if images.len() == before {
            return Ok(false);
        }
        self.persist(&images)?;
        Ok(true)
    }

    pub fn get(&self, id: Uuid) -> Option<GeneratedImage> {
        self.lock().iter().find(|image| image.id == id).cloned()
    }

    /// All records, oldest first.
    pub fn all(&self) -> Vec<GeneratedImage> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drops the oldest records until at most `max` remain. Returns the
    /// removed records.
    pub fn enforce_limit(&self, max: usize) -> Result<Vec<GeneratedImage>, StoreError> {
        let mut images = self.lock();
        if images.len() <= max {
            return Ok(Vec::new());
        }
        let excess = images.len() - max;
        let removed: Vec<_> = images.drain(..excess).collect();
        self.persist(&images)?;
        info!("Removed {} old image records (limit {})", removed.len(), max);
        Ok(removed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<GeneratedImage>> {
        // A panic mid-write leaves the list itself intact.
        self.images.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, images: &[GeneratedImage]) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(images)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::model_types::AspectRatio;

    fn image(n: u32) -> GeneratedImage {
        GeneratedImage::new(
            Url::parse(&format!("https://cdn/{n}.png")).unwrap(),
            Some(format!("prompt {n}")),
            ImageType::Generated,
        )
    }

    #[test]
    fn test_append_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images.json");

        let store = ImageStore::open(&path).unwrap();
        assert!(store.is_empty());
        let first = image(1);
        store.append(first.clone()).unwrap();
        store.append(image(2)).unwrap();

        let reopened = ImageStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.all()[0], first);
        assert_eq!(reopened.get(first.id), Some(first));
    }

    #[test]
    fn test_remove_by_id() {
        let store = ImageStore::in_memory();
        let kept = image(1);
        let dropped = image(2);
        store.append(kept.clone()).unwrap();
        store.append(dropped.clone()).unwrap();

        assert!(store.remove(dropped.id).unwrap());
        assert!(!store.remove(dropped.id).unwrap());
        assert_eq!(store.all(), vec![kept]);
    }

    #[test]
    fn test_enforce_limit_drops_oldest() {
        let store = ImageStore::in_memory();
        let images: Vec<_> = (0..5).map(image).collect();
        for img in &images {
            store.append(img.clone()).unwrap();
        }

        let removed = store.enforce_limit(3).unwrap();
        assert_eq!(removed, images[..2].to_vec());
        assert_eq!(store.all(), images[2..].to_vec());
        assert!(store.enforce_limit(3).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = ImageStore::open(&path).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_appends_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ImageStore::open(dir.path().join("images.json")).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..10 {
                        store.append(image(n * 100 + i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 80);
        assert_eq!(ImageStore::open(dir.path().join("images.json")).unwrap().len(), 80);
    }

    #[test]
    fn test_record_from_result_keeps_metadata() {
        let metadata = GenerationMetadata {
            num_inference_steps: 20,
            guidance_scale: 7.0,
            aspect_ratio: AspectRatio::Portrait,
        };
        let record = GeneratedImage::from(GenerationResult {
            prediction_id: "p1".into(),
            url: Url::parse("https://cdn/out.png").unwrap(),
            prompt: Some("cat".into()),
            image_type: ImageType::Generated,
            metadata: Some(metadata),
        });

        assert_eq!(record.metadata, Some(metadata));
        assert_eq!(record.prompt.as_deref(), Some("cat"));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "generated");
        assert!(json.get("createdAt").is_some());
    }
}
