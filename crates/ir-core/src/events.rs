use tokio::sync::mpsc::UnboundedSender;
use url::Url;
use crate::model_types::ImageModel;
use crate::prediction::PredictionStatus;

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    Submitted {
        id: String,
        model: ImageModel,
    },
    Progress {
        id: String,
        status: PredictionStatus,
        attempt: u32,
    },
    Completed {
        id: String,
        url: Url,
    },
    Failed {
        id: Option<String>,
        message: String,
    },
}

/// Optional listener for job progress. Sending never fails the job; a dropped
/// receiver is ignored.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<GenerationEvent>>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<GenerationEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: GenerationEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
