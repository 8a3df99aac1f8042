//! Generative model access: the raw backend seam and the validating invoker.

mod invoker;
mod openai;

pub use invoker::ModelInvoker;
pub use openai::OpenAiChatBackend;

use thiserror::Error;

/// One request to the backend. Stages always send temperature 0.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub instruction: String,
    pub task: String,
    pub temperature: f32,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response envelope: {0}")]
    MalformedEnvelope(String),
    #[error("API key variable `{0}` is not set")]
    MissingApiKey(String),
}

impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ModelError::Timeout
        } else {
            ModelError::Transport(e.to_string())
        }
    }
}

/// A generative backend: instruction + task in, free text out.
pub trait ModelBackend: Send + Sync {
    fn complete(&self, request: &ModelRequest) -> Result<String, ModelError>;
}
