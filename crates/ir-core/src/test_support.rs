use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use async_trait::async_trait;
use serde_json::Value;
use crate::client::{PredictionApi, PredictionInput};
use crate::error::{Error, Result};
use crate::prediction::PredictionJob;

pub fn job(value: Value) -> PredictionJob {
    serde_json::from_value(value).unwrap()
}

/// In-memory `PredictionApi` that replays scripted responses.
pub struct ScriptedApi {
    submit_response: Mutex<VecDeque<Result<PredictionJob>>>,
    default_submit: PredictionJob,
    fetches: Mutex<VecDeque<Result<PredictionJob>>>,
    fetches_by_id: Mutex<HashMap<String, VecDeque<Result<PredictionJob>>>>,
    fallback: Option<PredictionJob>,
    submitted: Mutex<Vec<(String, PredictionInput)>>,
    fetched: Mutex<Vec<String>>,
}

impl ScriptedApi {
    pub fn new(submit: PredictionJob) -> Self {
        Self {
            submit_response: Mutex::new(VecDeque::new()),
            default_submit: submit,
            fetches: Mutex::new(VecDeque::new()),
            fetches_by_id: Mutex::new(HashMap::new()),
            fallback: None,
            submitted: Mutex::new(Vec::new()),
            fetched: Mutex::new(Vec::new()),
        }
    }

    /// Response for every fetch once the script runs out.
    pub fn with_fallback(mut self, job: PredictionJob) -> Self {
        self.fallback = Some(job);
        self
    }

    pub fn push_submit(&self, response: Result<PredictionJob>) {
        self.submit_response.lock().unwrap().push_back(response);
    }

    pub fn push_fetch(&self, job: PredictionJob) {
        self.fetches.lock().unwrap().push_back(Ok(job));
    }

    pub fn push_fetch_error(&self, err: Error) {
        self.fetches.lock().unwrap().push_back(Err(err));
    }

    /// Scripted fetch for one prediction id, consulted before the shared script.
    pub fn push_fetch_for(&self, id: &str, response: Result<PredictionJob>) {
        self.fetches_by_id
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }

    pub fn fetched_ids(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn submissions(&self) -> Vec<(String, PredictionInput)> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl PredictionApi for ScriptedApi {
    async fn submit(&self, model_version: &str, input: PredictionInput) -> Result<PredictionJob> {
        self.submitted.lock().unwrap().push((model_version.to_string(), input));
        match self.submit_response.lock().unwrap().pop_front() {
            Some(response) => response,
            None => Ok(self.default_submit.clone()),
        }
    }

    async fn fetch(&self, id: &str) -> Result<PredictionJob> {
        self.fetched.lock().unwrap().push(id.to_string());
        let by_id = self
            .fetches_by_id
            .lock()
            .unwrap()
            .get_mut(id)
            .and_then(VecDeque::pop_front);
        if let Some(response) = by_id {
            return response;
        }
        let next = self.fetches.lock().unwrap().pop_front();
        match next {
            Some(response) => response,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| Error::Transport(format!("no scripted response for {id}"))),
        }
    }
}
