use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;
use crate::error::{Error, Result};

/// Lifecycle status reported by the prediction service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum PredictionStatus {
    Starting,
    #[default]
    Processing,
    Succeeded,
    Failed,
    /// Anything the service sends that we don't know. Polled like `Processing`.
    Unknown(String),
}

impl PredictionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Starting => "starting",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Unknown(raw) => raw,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl From<String> for PredictionStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "starting" => Self::Starting,
            "processing" => Self::Processing,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            _ => Self::Unknown(raw),
        }
    }
}

impl std::fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `output` field of a prediction. Models disagree on its shape.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PredictionOutput {
    Single(String),
    Sequence(Vec<Value>),
    Keyed(Map<String, Value>),
    Other(Value),
}

impl PredictionOutput {
    /// Normalizes the output into the list of result URLs.
    ///
    /// Only the first element of a sequence is used, and a mapping contributes
    /// its `output` field. Every other shape is rejected.
    pub fn result_urls(&self) -> Result<Vec<Url>> {
        let raw = match self {
            Self::Single(url) => url.as_str(),
            Self::Sequence(items) => match items.first() {
                Some(Value::String(url)) => url.as_str(),
                Some(other) => {
                    return Err(Error::UnexpectedOutputShape(format!(
                        "first output element is not a string: {other}"
                    )));
                }
                None => {
                    return Err(Error::UnexpectedOutputShape("empty output list".into()));
                }
            },
            Self::Keyed(map) => match map.get("output") {
                Some(Value::String(url)) => url.as_str(),
                _ => {
                    return Err(Error::UnexpectedOutputShape(
                        "object output has no string `output` field".into(),
                    ));
                }
            },
            Self::Other(value) => {
                return Err(Error::UnexpectedOutputShape(value.to_string()));
            }
        };

        let url = Url::parse(raw.trim())
            .map_err(|e| Error::UnexpectedOutputShape(format!("invalid result URL {raw:?}: {e}")))?;

        Ok(vec![url])
    }
}

/// A prediction job as returned by `POST /predictions` and `GET /predictions/{id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictionJob {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Option<PredictionOutput>,
    #[serde(default, rename = "error")]
    pub error_message: Option<String>,
}

impl PredictionJob {
    /// The service's error text, if it sent a non-empty one.
    pub fn failure_message(&self) -> Option<&str> {
        self.error_message.as_deref().filter(|msg| !msg.is_empty())
    }

    pub fn result_urls(&self) -> Result<Vec<Url>> {
        match &self.output {
            Some(output) => output.result_urls(),
            None => Err(Error::UnexpectedOutputShape("prediction has no output".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(value: Value) -> PredictionJob {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_sequence_output_uses_first_url() {
        let job = job(json!({
            "id": "p1",
            "status": "succeeded",
            "output": ["https://x/a.png", "https://x/ignored.png"]
        }));
        let urls = job.result_urls().unwrap();
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].as_str(), "https://x/a.png");
    }

    #[test]
    fn test_string_output() {
        let job = job(json!({"id": "p1", "status": "succeeded", "output": "https://x/b.png"}));
        assert_eq!(job.result_urls().unwrap()[0].as_str(), "https://x/b.png");
    }

    #[test]
    fn test_keyed_output() {
        let job = job(json!({"id": "p1", "status": "succeeded", "output": {"output": "https://x/c.png"}}));
        assert_eq!(job.result_urls().unwrap()[0].as_str(), "https://x/c.png");
    }

    #[test]
    fn test_rejected_output_shapes() {
        for output in [json!({}), json!(42), json!([]), json!([7, "https://x/a.png"]), json!({"output": 3})] {
            let job = job(json!({"id": "p1", "status": "succeeded", "output": output}));
            assert!(
                matches!(job.result_urls(), Err(Error::UnexpectedOutputShape(_))),
                "output {:?} should be rejected",
                job.output
            );
        }
    }

    #[test]
    fn test_missing_or_null_output() {
        let missing = job(json!({"id": "p1", "status": "succeeded"}));
        let null = job(json!({"id": "p1", "status": "succeeded", "output": null}));
        assert!(missing.output.is_none());
        assert!(null.output.is_none());
        assert!(matches!(missing.result_urls(), Err(Error::UnexpectedOutputShape(_))));
    }

    #[test]
    fn test_unparseable_url() {
        let job = job(json!({"id": "p1", "status": "succeeded", "output": "not a url"}));
        assert!(matches!(job.result_urls(), Err(Error::UnexpectedOutputShape(_))));
    }

    #[test]
    fn test_normalization_is_repeatable() {
        let job = job(json!({"id": "p1", "status": "succeeded", "output": ["https://x/a.png"]}));
        assert_eq!(job.result_urls().unwrap(), job.result_urls().unwrap());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(PredictionStatus::from("starting".to_string()), PredictionStatus::Starting);
        assert_eq!(PredictionStatus::from("succeeded".to_string()), PredictionStatus::Succeeded);
        assert_eq!(PredictionStatus::from("failed".to_string()), PredictionStatus::Failed);

        for raw in ["queued", "canceled", "Succeeded", " failed "] {
            let unknown = PredictionStatus::from(raw.to_string());
            assert_eq!(unknown, PredictionStatus::Unknown(raw.into()));
            assert!(!unknown.is_terminal(), "{raw:?} must not end polling");
            assert_eq!(unknown.as_str(), raw);
        }
    }

    #[test]
    fn test_missing_id_and_status_defaults() {
        let job = job(json!({"status": "processing"}));
        assert_eq!(job.id, "");
        assert_eq!(job.status, PredictionStatus::Processing);

        let job = serde_json::from_value::<PredictionJob>(json!({})).unwrap();
        assert_eq!(job.status, PredictionStatus::Processing);
    }

    #[test]
    fn test_failure_message_only_ignores_empty() {
        let empty = job(json!({"id": "p1", "status": "processing", "error": ""}));
        assert_eq!(empty.failure_message(), None);

        let blank = job(json!({"id": "p1", "status": "processing", "error": "  "}));
        assert_eq!(blank.failure_message(), Some("  "));

        let set = job(json!({"id": "p1", "status": "processing", "error": "quota exceeded"}));
        assert_eq!(set.failure_message(), Some("quota exceeded"));
    }
}
