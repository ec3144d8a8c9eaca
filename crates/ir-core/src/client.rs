use std::time::Duration;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Response, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;
use crate::error::{Error, Result};
use crate::prediction::PredictionJob;

pub const DEFAULT_API_BASE: &str = "https://api.replicate.com/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
// Keep error bodies short, they end up in user-facing state.
const MAX_ERROR_BODY: usize = 512;

/// Key/value inputs for a model, keys are model specific.
pub type PredictionInput = Map<String, Value>;

/// Creates and reads prediction jobs on the remote service.
#[async_trait]
pub trait PredictionApi: Send + Sync {
    async fn submit(&self, model_version: &str, input: PredictionInput) -> Result<PredictionJob>;

    async fn fetch(&self, id: &str) -> Result<PredictionJob>;
}

#[derive(Serialize)]
struct CreatePredictionRequest<'a> {
    version: &'a str,
    input: PredictionInput,
}

/// HTTP client for a Replicate-compatible predictions API.
#[derive(Debug, Clone)]
pub struct ReplicateClient {
    http: reqwest::Client,
    api_base: Url,
}

impl ReplicateClient {
    pub fn new(api_token: &str) -> Result<Self> {
        Self::with_options(api_token, DEFAULT_API_BASE, DEFAULT_TIMEOUT)
    }

    pub fn with_options(api_token: &str, api_base: &str, timeout: Duration) -> Result<Self> {
        let token = api_token.trim();
        if token.is_empty() {
            return Err(Error::InvalidRequest("An API token is required".into()));
        }

        let mut auth = HeaderValue::from_str(&format!("Token {token}"))
            .map_err(|e| Error::InvalidRequest(format!("Invalid API token: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("Failed to create HTTP client: {e}")))?;

        let api_base = Url::parse(api_base.trim())
            .map_err(|e| Error::InvalidRequest(format!("Invalid API base URL {api_base:?}: {e}")))?;
        if api_base.cannot_be_a_base() {
            return Err(Error::InvalidRequest(format!("Invalid API base URL {api_base}")));
        }

        Ok(Self { http, api_base })
    }

    /// `<base>/predictions` followed by `segments`, each escaped as a single path segment.
    fn predictions_url(&self, segments: &[&str]) -> Url {
        let mut url = self.api_base.clone();
        // The base was checked in `with_options`, so it always has a path.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("predictions").extend(segments);
        }
        url
    }

    async fn decode(response: Response, accepted: &[StatusCode]) -> Result<PredictionJob> {
        let status = response.status();
        if !accepted.contains(&status) {
            let body = response.text().await.unwrap_or_default();
            let body = match body.char_indices().nth(MAX_ERROR_BODY) {
                Some((cut, _)) => body[..cut].to_string(),
                None => body,
            };
            return Err(Error::Api { status: status.as_u16(), body });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| Error::Decoding(e.to_string()))
    }
}

#[async_trait]
impl PredictionApi for ReplicateClient {
    async fn submit(&self, model_version: &str, input: PredictionInput) -> Result<PredictionJob> {
        let url = self.predictions_url(&[]);
        debug!("POST {url} (version {model_version})");

        let response = self
            .http
            .post(url)
            .json(&CreatePredictionRequest { version: model_version, input })
            .send()
            .await?;

        Self::decode(response, &[StatusCode::OK, StatusCode::CREATED]).await
    }

    async fn fetch(&self, id: &str) -> Result<PredictionJob> {
        let url = self.predictions_url(&[id]);
        debug!("GET {url}");

        let response = self.http.get(url).send().await?;

        Self::decode(response, &[StatusCode::OK]).await
    }
}
