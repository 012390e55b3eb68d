//! Error types for the review pipeline and the LLM clients.

use thiserror::Error;

/// Errors raised while fetching a page of reviews.
///
/// Input errors (`InvalidSubject`, `InvalidFilter`) are never retried.
/// `Upstream` is transient: the collection is left untouched, so retrying
/// the same call is always safe.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Invalid subject id '{0}': expected a numeric app id")]
    InvalidSubject(String),

    #[error("Invalid filter value for {option}: '{value}'")]
    InvalidFilter { option: &'static str, value: String },

    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl FetchError {
    pub fn invalid_filter(option: &'static str, value: impl Into<String>) -> Self {
        FetchError::InvalidFilter {
            option,
            value: value.into(),
        }
    }

    /// Whether a manual retry of the same call makes sense.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Upstream(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Upstream(format!("request timed out: {}", err))
        } else if err.is_connect() {
            FetchError::Upstream(format!("cannot reach review source: {}", err))
        } else if err.is_decode() {
            FetchError::Upstream(format!("malformed payload: {}", err))
        } else {
            FetchError::Upstream(err.to_string())
        }
    }
}

/// Errors raised by the language-model clients.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Unsupported AI provider: {0} (expected 'openai' or 'anthropic')")]
    UnsupportedProvider(String),

    #[error("No API key configured for {0}")]
    MissingApiKey(&'static str),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("{0} returned no text content")]
    EmptyResponse(&'static str),

    #[error("Review {0} is not in the collected set")]
    ReviewNotFound(u64),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Request(format!("timed out: {}", err))
        } else {
            LlmError::Request(err.to_string())
        }
    }
}
