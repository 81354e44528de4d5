//! LLM provider trait: the polymorphic seam the fallback service works over.
//!
//! Every backend (Gemini, OpenRouter, …) implements this trait. The service
//! never inspects concrete provider types; it drives generation and failure
//! classification entirely through this interface.

use std::path::Path;

use async_trait::async_trait;
use genrelay_core::LlmResponse;

use crate::error::LlmError;

/// Trait that all LLM providers must implement.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Registry name for lookup and logging (e.g. `"gemini"`).
    fn name(&self) -> &str;

    /// The default model for this provider instance.
    fn default_model(&self) -> &str;

    /// Generate text from a prompt.
    ///
    /// # Arguments
    /// * `prompt` — User prompt text.
    /// * `model`  — Model identifier (e.g. `"gemini-2.5-pro-exp-03-25"`).
    ///
    /// # Returns
    /// An `LlmResponse` whose `text` is never null; a completion with no
    /// extractable text yields an empty string with the raw payload intact.
    async fn generate(&self, prompt: &str, model: &str) -> Result<LlmResponse, LlmError>;

    /// Generate text from a prompt plus a media file.
    ///
    /// Providers that cannot accept the file's media type return
    /// [`LlmError::UnsupportedMedia`] without contacting the backend, so the
    /// caller can degrade to a text-only request.
    async fn generate_with_media(
        &self,
        prompt: &str,
        media: &Path,
        model: &str,
    ) -> Result<LlmResponse, LlmError>;

    /// Whether `error` looks like throttling for this provider.
    ///
    /// Classification is textual: each provider matches its own phrase list
    /// against the rendered error message. Rate-limited failures are the only
    /// ones the fallback service moves past.
    fn is_rate_limited(&self, error: &LlmError) -> bool;
}
