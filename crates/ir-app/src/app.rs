use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;
use ir_core::export::PhotoExporter;
use ir_core::store::{GeneratedImage, ImageStore};
use ir_core::{
    AspectRatio, EventSink, GenerationEvent, GenerationResult, Generator, ImageModel, ReplicateClient, Settings,
};
use crate::config::AppConfig;
use crate::error::AppError;

pub struct App {
    config: AppConfig,
    settings: Settings,
    store: ImageStore,
}

impl App {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let settings = config.settings()?;
        let store = ImageStore::open(config.records_path())?;

        Ok(Self {
            config,
            settings,
            store,
        })
    }

    pub async fn generate(&self, prompt: &str, aspect_ratio: AspectRatio, count: Option<u32>) -> anyhow::Result<()> {
        let count = count.unwrap_or(self.settings.images_per_call);
        let (generator, notifier) = self.generator()?;

        let results = generator.generate_images(prompt, aspect_ratio, count).await;
        let status = generator.status();
        drop(generator);
        let _ = notifier.await;

        if let Some(message) = status.error_message() {
            if results.is_empty() {
                return Err(AppError::Generation(message).into());
            }
            warn!("Some images failed: {}", message);
        }

        self.keep(results).await
    }

    pub async fn restore(&self, path: &Path) -> anyhow::Result<()> {
        let bytes = tokio::fs::read(path).await?;
        let (generator, notifier) = self.generator()?;

        let result = generator.restore_image(&bytes).await;
        let status = generator.status();
        drop(generator);
        let _ = notifier.await;

        match result {
            Some(result) => self.keep(vec![result]).await,
            None => Err(AppError::Generation(
                status.error_message().unwrap_or_else(|| "Restoration failed".to_string()),
            )
            .into()),
        }
    }

    pub fn list(&self) {
        let images = self.store.all();
        if images.is_empty() {
            println!("No saved images");
            return;
        }
        for image in images {
            println!(
                "{}  {:<9} {}  {}  {}",
                image.id,
                format!("{:?}", image.image_type).to_lowercase(),
                image.created_at.format("%Y-%m-%d %H:%M"),
                image.url,
                image.prompt.as_deref().unwrap_or("-"),
            );
        }
    }

    pub fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        if !self.store.remove(id)? {
            return Err(AppError::NotFound(id).into());
        }
        println!("Deleted {id}");
        Ok(())
    }

    pub async fn export(&self, id: Uuid) -> anyhow::Result<()> {
        let image = self.store.get(id).ok_or(AppError::NotFound(id))?;
        let exporter = PhotoExporter::new(self.config.album_dir())?;

        match exporter.save_to_album(&image.url).await {
            Ok(path) => {
                println!("Saved to {}", path.display());
                Ok(())
            }
            Err(e) => {
                warn!("Export failed: {}", e);
                Err(AppError::Generation(e.user_message().to_string()).into())
            }
        }
    }

    pub fn models(&self) {
        for model in ImageModel::all() {
            let marker = if model == self.settings.default_model { "*" } else { " " };
            println!("{} {:<18} {}", marker, model.name(), model.description());
        }
    }

    fn generator(&self) -> anyhow::Result<(Generator, JoinHandle<()>)> {
        if self.settings.api_token.trim().is_empty() {
            return Err(AppError::MissingToken(self.config.settings_path.clone()).into());
        }
        let client = ReplicateClient::with_options(
            &self.settings.api_token,
            &self.settings.api_base,
            self.settings.request_timeout(),
        )?;

        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = tokio::spawn(notify(rx));
        let generator = Generator::new(Arc::new(client), self.settings.clone()).with_events(EventSink::new(tx));

        Ok((generator, notifier))
    }

    /// Store the results, export them when auto-save is on, and trim the store.
    async fn keep(&self, results: Vec<GenerationResult>) -> anyhow::Result<()> {
        let exporter = if self.settings.auto_save {
            Some(PhotoExporter::new(self.config.album_dir())?)
        } else {
            None
        };

        for result in results {
            let record = GeneratedImage::from(result);
            println!("{}  {}", record.id, record.url);

            if let Some(exporter) = &exporter {
                match exporter.save_to_album(&record.url).await {
                    Ok(path) => info!("Saved {} to {}", record.id, path.display()),
                    Err(e) => warn!("Could not save {} to the album: {}", record.id, e.user_message()),
                }
            }
            self.store.append(record)?;
        }

        let removed = self.store.enforce_limit(self.settings.max_images)?;
        if !removed.is_empty() {
            info!("Dropped {} old images to stay under {}", removed.len(), self.settings.max_images);
        }

        Ok(())
    }
}

/// Prints a notification line when a prediction finishes.
async fn notify(mut rx: mpsc::UnboundedReceiver<GenerationEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            GenerationEvent::Submitted { id, model } => info!("Started {} ({})", model.name(), id),
            GenerationEvent::Progress { id, status, attempt } => {
                tracing::debug!("{} is {} (check {})", id, status, attempt)
            }
            GenerationEvent::Completed { id, .. } => println!("🔔 Image ready ({id})"),
            GenerationEvent::Failed { message, .. } => println!("🔔 Generation failed: {message}"),
        }
    }
}
