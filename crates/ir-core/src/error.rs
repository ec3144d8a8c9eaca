use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Failed to reach prediction service: {0}")]
    Transport(String),

    #[error("Prediction service returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to decode prediction: {0}")]
    Decoding(String),

    #[error("Prediction failed: {0}")]
    JobFailed(String),

    #[error("Prediction timed out after {attempts} polling attempts")]
    JobTimedOut { attempts: u32 },

    #[error("Unexpected output format: {0}")]
    UnexpectedOutputShape(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// Single message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(_) | Self::Decoding(_) | Self::UnexpectedOutputShape(_) => {
                "Something went wrong while creating your image. Please try again.".to_string()
            }
            Self::Api { status, .. } => {
                format!("The image service rejected the request (status code {status}).")
            }
            Self::JobFailed(message) => message.clone(),
            Self::JobTimedOut { .. } => {
                "The image took too long to generate. Please try again later.".to_string()
            }
            Self::InvalidRequest(reason) => reason.clone(),
        }
    }

    /// Whether the job reached a terminal outcome (failed or ran out of polls),
    /// as opposed to a transport, decoding or request problem.
    pub fn is_terminal_job_state(&self) -> bool {
        matches!(self, Self::JobFailed(_) | Self::JobTimedOut { .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decoding(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}
