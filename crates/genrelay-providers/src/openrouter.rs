//! OpenRouter provider (OpenAI-compatible `/chat/completions` API).
//!
//! One HTTP shape covers every model OpenRouter fronts. Media support is
//! limited to images, sent inline as base64 data URLs; anything else is
//! rejected before a byte leaves the process so the caller can degrade to a
//! text-only request.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use genrelay_core::{GenerationParams, LlmResponse, ProviderSettings};

use crate::classify::is_rate_limit_message;
use crate::error::LlmError;
use crate::media;
use crate::traits::LlmProvider;

/// Public OpenRouter API base.
pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";

const PROVIDER_NAME: &str = "openrouter";
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Lowercase fragments that mark an OpenRouter failure as throttling.
const RATE_LIMIT_PHRASES: &[&str] = &["rate limit", "too many requests", "429", "quota exceeded"];

// ─────────────────────────────────────────────
// OpenRouterProvider
// ─────────────────────────────────────────────

/// LLM provider backed by OpenRouter's OpenAI-compatible API.
pub struct OpenRouterProvider {
    /// HTTP client (shared, connection-pooled).
    client: reqwest::Client,
    /// API base URL, swappable for tests and proxies.
    api_base: String,
    /// API key for Bearer authentication.
    api_key: String,
    /// Default model for this provider instance.
    default_model: String,
    /// Sampling parameters applied to every request.
    params: GenerationParams,
    /// Optional system message prepended to every conversation.
    system_prompt: Option<String>,
}

impl std::fmt::Debug for OpenRouterProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterProvider")
            .field("api_base", &self.api_base)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl OpenRouterProvider {
    /// Create a new OpenRouterProvider.
    ///
    /// # Arguments
    /// * `api_key`       — OpenRouter API key
    /// * `model`         — Default model identifier (e.g. `"google/gemini-2.5-pro-exp-03-25:free"`)
    /// * `params`        — Sampling parameters (validated here)
    /// * `system_prompt` — Optional system message
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        params: GenerationParams,
        system_prompt: Option<String>,
    ) -> Result<Self, LlmError> {
        params
            .validate()
            .map_err(|message| LlmError::InvalidConfig { message })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| LlmError::transport(PROVIDER_NAME, e))?;

        Ok(OpenRouterProvider {
            client,
            api_base: OPENROUTER_API_BASE.to_string(),
            api_key: api_key.into(),
            default_model: model.into(),
            params,
            system_prompt,
        })
    }

    /// Replace the API base URL (tests, proxies).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Build a provider from config, or `None` when no API key is set.
    pub fn from_settings(
        settings: &ProviderSettings,
        global_system_prompt: &str,
    ) -> Result<Option<Self>, LlmError> {
        if !settings.is_configured() {
            return Ok(None);
        }
        let mut provider = OpenRouterProvider::new(
            settings.api_key.clone(),
            settings.model.clone(),
            settings.params,
            settings.effective_system_prompt(global_system_prompt),
        )?;
        if let Some(base) = &settings.api_base {
            provider = provider.with_api_base(base.clone());
        }
        Ok(Some(provider))
    }

    /// Build the full chat completions URL.
    fn completions_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{}/chat/completions", base)
    }

    /// Prepend the system message (when set) to a user turn.
    fn build_messages(&self, content: MessageContent) -> Vec<Message> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(Message::system(system.clone()));
        }
        messages.push(Message {
            role: "user",
            content,
        });
        messages
    }

    /// Send a chat completion request and extract the response text.
    async fn run_chat(&self, messages: Vec<Message>, model: &str) -> Result<LlmResponse, LlmError> {
        let request_body = ChatCompletionRequest {
            model,
            messages,
            temperature: self.params.temperature,
            top_p: self.params.top_p,
            max_tokens: self.params.max_output_tokens,
        };

        debug!(provider = PROVIDER_NAME, model = %model, "Calling LLM");

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| LlmError::transport(PROVIDER_NAME, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                provider = PROVIDER_NAME,
                status = %status,
                body = %body,
                "API error"
            );
            return Err(LlmError::api(PROVIDER_NAME, status.as_u16(), body));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| LlmError::transport(PROVIDER_NAME, e))?;
        let parsed: ChatCompletionResponse = serde_json::from_value(raw.clone())
            .map_err(|e| LlmError::invalid_response(PROVIDER_NAME, e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        debug!(provider = PROVIDER_NAME, chars = text.len(), "LLM response received");
        Ok(LlmResponse::new(text, raw))
    }
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn generate(&self, prompt: &str, model: &str) -> Result<LlmResponse, LlmError> {
        let messages = self.build_messages(MessageContent::Text(prompt.to_string()));
        self.run_chat(messages, model).await
    }

    async fn generate_with_media(
        &self,
        prompt: &str,
        media: &Path,
        model: &str,
    ) -> Result<LlmResponse, LlmError> {
        // Only images can go inline; refuse everything else before any I/O.
        let mime_type = media::guess_mime(media);
        if !media::is_image(&mime_type) {
            return Err(LlmError::UnsupportedMedia {
                provider: PROVIDER_NAME.to_string(),
                mime_type,
            });
        }

        let encoded = media::read_base64(media).await?;
        let parts = vec![
            ContentPart::Text {
                text: prompt.to_string(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:{};base64,{}", mime_type, encoded),
                },
            },
        ];
        let messages = self.build_messages(MessageContent::Parts(parts));
        self.run_chat(messages, model).await
    }

    fn is_rate_limited(&self, error: &LlmError) -> bool {
        is_rate_limit_message(&error.to_string(), RATE_LIMIT_PHRASES)
    }
}

// ─────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f64,
    top_p: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: MessageContent,
}

impl Message {
    fn system(text: String) -> Self {
        Message {
            role: "system",
            content: MessageContent::Text(text),
        }
    }
}

/// Either a plain string or the multi-part form used for images.
#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
