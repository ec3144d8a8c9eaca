use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use crate::client::{PredictionApi, PredictionInput};
use crate::error::{Error, Result};
use crate::events::{EventSink, GenerationEvent};
use crate::model_types::ImageModel;
use crate::prediction::{PredictionJob, PredictionStatus};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Wait before each fetch
    pub interval: Duration,
    /// Fetches allowed before giving up
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }
}

/// A prediction that reached `succeeded` with a usable output.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedJob {
    pub id: String,
    pub urls: Vec<Url>,
}

/// Drives a single prediction from submission to a terminal outcome.
///
/// Fetches are strictly sequential with `policy.interval` between them. Nothing
/// is retried here: transport and API errors surface immediately, and a job
/// still running after `policy.max_attempts` fetches is reported as
/// [`Error::JobTimedOut`].
#[derive(Clone)]
pub struct JobPoller {
    api: Arc<dyn PredictionApi>,
    policy: PollPolicy,
    events: EventSink,
}

impl JobPoller {
    pub fn new(api: Arc<dyn PredictionApi>, policy: PollPolicy) -> Self {
        Self {
            api,
            policy,
            events: EventSink::none(),
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub async fn run(&self, model: ImageModel, input: PredictionInput) -> Result<ResolvedJob> {
        let submitted = match self.api.submit(model.version(), input).await {
            Ok(job) => job,
            Err(e) => {
                self.events.emit(GenerationEvent::Failed { id: None, message: e.to_string() });
                return Err(e);
            }
        };

        let id = submitted.id.clone();
        info!("Submitted {} prediction {} ({})", model.name(), id, submitted.status);
        self.events.emit(GenerationEvent::Submitted { id: id.clone(), model });

        let result = self.drive(&id, submitted).await;

        match &result {
            Ok(resolved) => {
                info!("Prediction {} succeeded: {}", id, resolved.urls[0]);
                self.events.emit(GenerationEvent::Completed {
                    id: id.clone(),
                    url: resolved.urls[0].clone(),
                });
            }
            Err(e) => {
                warn!("Prediction {} did not succeed: {}", id, e);
                self.events.emit(GenerationEvent::Failed {
                    id: Some(id.clone()),
                    message: e.to_string(),
                });
            }
        }

        result
    }

    async fn drive(&self, id: &str, submitted: PredictionJob) -> Result<ResolvedJob> {
        // The service may answer synchronously.
        if let Some(outcome) = resolve(&submitted) {
            return outcome.map(|urls| ResolvedJob { id: id.to_string(), urls });
        }

        if id.is_empty() {
            return Err(Error::Decoding("submitted prediction has no id".into()));
        }

        for attempt in 1..=self.policy.max_attempts {
            tokio::time::sleep(self.policy.interval).await;

            let job = self.api.fetch(id).await?;
            debug!("Prediction {} attempt {}/{}: {}", id, attempt, self.policy.max_attempts, job.status);

            if let PredictionStatus::Unknown(raw) = &job.status {
                debug!("Unrecognized status {:?} for {}, continuing to poll", raw, id);
            }

            self.events.emit(GenerationEvent::Progress {
                id: id.to_string(),
                status: job.status.clone(),
                attempt,
            });

            if let Some(outcome) = resolve(&job) {
                return outcome.map(|urls| ResolvedJob { id: id.to_string(), urls });
            }
        }

        Err(Error::JobTimedOut { attempts: self.policy.max_attempts })
    }
}

/// `None` while the job should keep being polled.
///
/// A non-empty error message fails the job whatever the status says.
fn resolve(job: &PredictionJob) -> Option<Result<Vec<Url>>> {
    if let Some(message) = job.failure_message() {
        return Some(Err(Error::JobFailed(message.to_string())));
    }

    match job.status {
        PredictionStatus::Succeeded => Some(job.result_urls()),
        PredictionStatus::Failed => Some(Err(Error::JobFailed("The prediction failed".into()))),
        PredictionStatus::Starting | PredictionStatus::Processing | PredictionStatus::Unknown(_) => None,
    }
}
