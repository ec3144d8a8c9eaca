use std::sync::Arc;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use tracing::{error, info, warn};
use url::Url;
use crate::client::{PredictionApi, PredictionInput};
use crate::error::{Error, Result};
use crate::events::EventSink;
use crate::model_types::{AspectRatio, ImageModel, ImageType, ModelKind};
use crate::poller::JobPoller;
use crate::settings::{BatchFailurePolicy, BatchMode, Settings};

const RESTORATION_MODEL_VERSION: &str = "v1.4";
const RESTORATION_SCALE: u32 = 2;
const LORA_SCALE: f32 = 0.8;

/// Parameters that produced a generated image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub num_inference_steps: u32,
    pub guidance_scale: f32,
    pub aspect_ratio: AspectRatio,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestSource {
    Prompt(String),
    Image(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: ImageModel,
    pub source: RequestSource,
    pub metadata: GenerationMetadata,
}

impl GenerationRequest {
    pub fn text(model: ImageModel, prompt: &str, aspect_ratio: AspectRatio, settings: &Settings) -> Self {
        Self {
            model,
            source: RequestSource::Prompt(prompt.trim().to_string()),
            metadata: GenerationMetadata {
                num_inference_steps: settings.inference_steps(),
                guidance_scale: settings.guidance_scale(),
                aspect_ratio,
            },
        }
    }

    pub fn restoration(image: Vec<u8>, settings: &Settings) -> Self {
        Self {
            model: ImageModel::FaceRestoration,
            source: RequestSource::Image(image),
            metadata: GenerationMetadata {
                num_inference_steps: settings.inference_steps(),
                guidance_scale: settings.guidance_scale(),
                aspect_ratio: AspectRatio::default(),
            },
        }
    }

    /// Model inputs for `POST /predictions`.
    pub fn to_input(&self) -> Result<PredictionInput> {
        let mut input = PredictionInput::new();
        match &self.source {
            RequestSource::Prompt(prompt) => {
                if prompt.is_empty() {
                    return Err(Error::InvalidRequest("Please enter a prompt".into()));
                }
                input.insert("prompt".into(), json!(prompt));
                input.insert("num_outputs".into(), json!(1));
                input.insert("aspect_ratio".into(), json!(self.metadata.aspect_ratio.as_param()));
                input.insert("num_inference_steps".into(), json!(self.metadata.num_inference_steps));
                input.insert("guidance_scale".into(), json!(self.metadata.guidance_scale));
                input.insert("extra_lora_scale".into(), json!(LORA_SCALE));
            }
            RequestSource::Image(bytes) => {
                if bytes.is_empty() {
                    return Err(Error::InvalidRequest("The selected image is empty".into()));
                }
                input.insert("img".into(), json!(image_data_uri(bytes)));
                input.insert("version".into(), json!(RESTORATION_MODEL_VERSION));
                input.insert("scale".into(), json!(RESTORATION_SCALE));
            }
        }
        Ok(input)
    }
}

/// `data:` URI for raw image bytes, mime type sniffed from the content.
pub fn image_data_uri(bytes: &[u8]) -> String {
    let mime = image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("image/jpeg");
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// One finished image. Handed to the caller, which decides whether to store it.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub prediction_id: String,
    pub url: Url,
    pub prompt: Option<String>,
    pub image_type: ImageType,
    /// Only set for text-to-image results
    pub metadata: Option<GenerationMetadata>,
}

/// State the UI observes while requests run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratorStatus {
    pub is_loading: bool,
    /// Most recent failure, cleared when a new request starts
    pub last_error: Option<Error>,
    in_flight: usize,
}

impl GeneratorStatus {
    pub fn error_message(&self) -> Option<String> {
        self.last_error.as_ref().map(Error::user_message)
    }
}

/// Keeps `is_loading` true for as long as a request is outstanding, including
/// when its future is dropped early.
struct InFlight<'a> {
    status: &'a watch::Sender<GeneratorStatus>,
}

impl<'a> InFlight<'a> {
    fn start(status: &'a watch::Sender<GeneratorStatus>) -> Self {
        status.send_modify(|s| {
            s.in_flight += 1;
            s.is_loading = true;
            s.last_error = None;
        });
        Self { status }
    }

    fn fail(&self, err: Error) {
        self.status.send_modify(|s| s.last_error = Some(err));
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.status.send_modify(|s| {
            s.in_flight = s.in_flight.saturating_sub(1);
            s.is_loading = s.in_flight > 0;
        });
    }
}

/// Entry point for UI code: turns prompts and photos into finished images.
pub struct Generator {
    poller: JobPoller,
    settings: Settings,
    status: watch::Sender<GeneratorStatus>,
}

impl Generator {
    pub fn new(api: Arc<dyn PredictionApi>, settings: Settings) -> Self {
        let poller = JobPoller::new(api, settings.poll_policy());
        let (status, _) = watch::channel(GeneratorStatus::default());

        Self {
            poller,
            settings,
            status,
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.poller = self.poller.with_events(events);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn status(&self) -> GeneratorStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GeneratorStatus> {
        self.status.subscribe()
    }

    /// Model used for text-to-image; the configured default when it can
    /// generate, otherwise the disposable camera model.
    pub fn generation_model(&self) -> ImageModel {
        match self.settings.default_model.kind() {
            ModelKind::Generation => self.settings.default_model,
            ModelKind::Restoration => ImageModel::DisposableCamera,
        }
    }

    /// Generates `count` images for `prompt`. Never fails: on error the result
    /// is empty and the error is published in [`GeneratorStatus::last_error`].
    pub async fn generate_images(&self, prompt: &str, aspect_ratio: AspectRatio, count: u32) -> Vec<GenerationResult> {
        let guard = InFlight::start(&self.status);

        let (results, failure) = match self.validate_count(count) {
            Ok(()) => {
                let request = GenerationRequest::text(self.generation_model(), prompt, aspect_ratio, &self.settings);
                self.run_batch(&request, count).await
            }
            Err(e) => (Vec::new(), Some(e)),
        };

        if let Some(e) = failure {
            self.report(&guard, e);
        }
        results
    }

    /// Restores a photo. `None` on failure, see [`GeneratorStatus::last_error`].
    pub async fn restore_image(&self, image: &[u8]) -> Option<GenerationResult> {
        let guard = InFlight::start(&self.status);

        match self.try_restore_image(image).await {
            Ok(result) => Some(result),
            Err(e) => {
                self.report(&guard, e);
                None
            }
        }
    }

    /// Like [`Generator::generate_images`] but returns the error instead of
    /// publishing it. Under [`BatchFailurePolicy::KeepPartial`] a batch with at
    /// least one finished image is `Ok`.
    pub async fn try_generate_images(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
        count: u32,
    ) -> Result<Vec<GenerationResult>> {
        self.validate_count(count)?;
        let request = GenerationRequest::text(self.generation_model(), prompt, aspect_ratio, &self.settings);

        match self.run_batch(&request, count).await {
            (results, None) => Ok(results),
            (results, Some(_)) if !results.is_empty() => Ok(results),
            (_, Some(e)) => Err(e),
        }
    }

    pub async fn try_restore_image(&self, image: &[u8]) -> Result<GenerationResult> {
        let request = GenerationRequest::restoration(image.to_vec(), &self.settings);
        self.run_cycle(&request).await
    }

    fn validate_count(&self, count: u32) -> Result<()> {
        let max = self.settings.max_images_per_call;
        if count == 0 || count > max {
            return Err(Error::InvalidRequest(format!(
                "Between 1 and {max} images can be generated at once"
            )));
        }
        Ok(())
    }

    fn report(&self, guard: &InFlight<'_>, e: Error) {
        if e.is_terminal_job_state() {
            warn!("Generation failed: {}", e);
        } else {
            error!("Generation failed: {}", e);
        }
        guard.fail(e);
    }

    /// Runs `count` independent cycles. Returns the finished images and the
    /// first error, if any.
    async fn run_batch(&self, request: &GenerationRequest, count: u32) -> (Vec<GenerationResult>, Option<Error>) {
        let abort = self.settings.batch_failure_policy == BatchFailurePolicy::AbortOnFirstError;
        info!(
            "Generating {} image(s) with {} ({:?}, {:?})",
            count,
            request.model.name(),
            self.settings.batch_mode,
            self.settings.batch_failure_policy
        );

        match self.settings.batch_mode {
            BatchMode::Sequential => {
                let mut results = Vec::new();
                let mut first_error = None;
                for _ in 0..count {
                    match self.run_cycle(request).await {
                        Ok(result) => results.push(result),
                        Err(e) if abort => return (Vec::new(), Some(e)),
                        Err(e) => {
                            if first_error.is_none() {
                                first_error = Some(e);
                            }
                        }
                    }
                }
                (results, first_error)
            }
            BatchMode::Concurrent => {
                let cycles = (0..count).map(|_| self.run_cycle(request));
                if abort {
                    // Dropping the remaining cycles stops their polling.
                    match try_join_all(cycles).await {
                        Ok(results) => (results, None),
                        Err(e) => (Vec::new(), Some(e)),
                    }
                } else {
                    let mut results = Vec::new();
                    let mut first_error = None;
                    for outcome in join_all(cycles).await {
                        match outcome {
                            Ok(result) => results.push(result),
                            Err(e) => {
                                if first_error.is_none() {
                                    first_error = Some(e);
                                }
                            }
                        }
                    }
                    (results, first_error)
                }
            }
        }
    }

    async fn run_cycle(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let input = request.to_input()?;
        let resolved = self.poller.run(request.model, input).await?;

        let (prompt, metadata) = match &request.source {
            RequestSource::Prompt(prompt) => (Some(prompt.clone()), Some(request.metadata)),
            RequestSource::Image(_) => (None, None),
        };

        Ok(GenerationResult {
            prediction_id: resolved.id,
            url: resolved.urls[0].clone(),
            prompt,
            image_type: request.model.kind().image_type(),
            metadata,
        })
    }
}
