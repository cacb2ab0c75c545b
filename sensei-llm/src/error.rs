use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

/// Non-success HTTP status, transport failure and an unexpected payload shape
/// all collapse into the same backend-failure kind: the caller can only react
/// one way to any of them.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model backend failure: {0}")]
    Backend(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(e: serde_json::Error) -> Self {
        Self::Backend(e.to_string())
    }
}
