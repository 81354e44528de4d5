//! Error types for provider calls and the fallback service.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while talking to an LLM provider.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No provider is registered with the service.
    #[error("no LLM providers available")]
    NoProvidersAvailable,

    /// The provider cannot accept this media type.
    #[error("media type {mime_type} not supported by {provider}")]
    UnsupportedMedia { provider: String, mime_type: String },

    /// The provider answered with a non-success HTTP status.
    #[error("{provider} returned status {status}: {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    /// The request never produced an HTTP response.
    #[error("{provider} request failed: {source}")]
    Transport {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    /// The provider answered 2xx but the body did not match the expected shape.
    #[error("{provider} returned an unexpected response: {message}")]
    InvalidResponse { provider: String, message: String },

    /// A media file could not be read from disk.
    #[error("failed to read media file {}: {message}", path.display())]
    MediaRead { path: PathBuf, message: String },

    /// Provider construction was given invalid parameters.
    #[error("invalid provider configuration: {message}")]
    InvalidConfig { message: String },
}

impl LlmError {
    pub(crate) fn transport(provider: &str, source: reqwest::Error) -> Self {
        LlmError::Transport {
            provider: provider.to_string(),
            source,
        }
    }

    pub(crate) fn api(provider: &str, status: u16, message: String) -> Self {
        LlmError::Api {
            provider: provider.to_string(),
            status,
            message,
        }
    }

    pub(crate) fn invalid_response(provider: &str, message: impl Into<String>) -> Self {
        LlmError::InvalidResponse {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}
