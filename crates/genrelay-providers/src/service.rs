//! Provider registry and fallback orchestration.
//!
//! The service owns every registered provider and walks an ordered candidate
//! list per request:
//!
//! 1. The starting provider's models for the requested tier
//! 2. When fallback is enabled, every other provider in registration order
//!
//! Attempts are strictly sequential and the first success wins. Only
//! rate-limited failures move the walk forward; any other failure surfaces
//! immediately, unchanged. A provider that rejects a media file gets one
//! text-only retry before the walk continues.

use std::path::Path;

use tracing::{debug, error, info, warn};

use genrelay_core::{resolve_models, LlmResponse, ModelTier, RelayConfig, TierModels};

use crate::error::LlmError;
use crate::gemini::GeminiProvider;
use crate::openrouter::OpenRouterProvider;
use crate::traits::LlmProvider;

/// Prompt prefix for the text-only retry after a provider rejects media.
pub const DEGRADED_MEDIA_PREFIX: &str = "[Media described in prompt] ";

// ─────────────────────────────────────────────
// GenerateOptions
// ─────────────────────────────────────────────

/// Per-call routing options.
#[derive(Clone, Debug)]
pub struct GenerateOptions {
    /// Provider to start with; unset or unknown uses the default.
    pub provider: Option<String>,
    /// Whether rate limits escalate to the remaining providers.
    pub fallback: bool,
    /// Model tier to draw candidates from.
    pub tier: Option<ModelTier>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        GenerateOptions {
            provider: None,
            fallback: true,
            tier: None,
        }
    }
}

// ─────────────────────────────────────────────
// LlmService
// ─────────────────────────────────────────────

struct RegisteredProvider {
    provider: Box<dyn LlmProvider>,
    tiers: TierModels,
}

/// Registry of LLM providers with sequential rate-limit fallback.
pub struct LlmService {
    /// Providers in registration order; that order is the fallback order.
    providers: Vec<RegisteredProvider>,
    /// Index of the default provider, set by the first registration.
    default_index: Option<usize>,
}

/// One unit of work, carried through the candidate walk.
#[derive(Clone, Copy)]
enum Payload<'a> {
    Text { prompt: &'a str },
    Media { prompt: &'a str, media: &'a Path },
}

impl Default for LlmService {
    fn default() -> Self {
        LlmService::new()
    }
}

impl LlmService {
    /// Create an empty service.
    pub fn new() -> Self {
        LlmService {
            providers: Vec::new(),
            default_index: None,
        }
    }

    /// Build a service from config.
    ///
    /// Providers without an API key are skipped; a provider that fails to
    /// initialize is logged and skipped so the rest can still serve.
    pub fn from_config(config: &RelayConfig) -> Self {
        let mut service = LlmService::new();

        match GeminiProvider::from_settings(&config.gemini, &config.system_prompt) {
            Ok(Some(provider)) => service.register(provider, config.gemini.tiers.clone()),
            Ok(None) => debug!("Gemini provider not configured"),
            Err(e) => error!(error = %e, "Failed to initialize Gemini provider"),
        }
        match OpenRouterProvider::from_settings(&config.openrouter, &config.system_prompt) {
            Ok(Some(provider)) => service.register(provider, config.openrouter.tiers.clone()),
            Ok(None) => debug!("OpenRouter provider not configured"),
            Err(e) => error!(error = %e, "Failed to initialize OpenRouter provider"),
        }

        if service.is_empty() {
            error!("No LLM providers configured");
        } else {
            service.set_default(&config.default_provider);
        }
        service
    }

    /// Register a provider with its tier model lists.
    ///
    /// The first registered provider becomes the default.
    pub fn register(&mut self, provider: impl LlmProvider + 'static, tiers: TierModels) {
        info!(
            provider = provider.name(),
            model = provider.default_model(),
            "Registered LLM provider"
        );
        self.providers.push(RegisteredProvider {
            provider: Box::new(provider),
            tiers,
        });
        if self.default_index.is_none() {
            self.default_index = Some(self.providers.len() - 1);
        }
    }

    /// Change the default provider, keeping the current one when `name` is
    /// not registered.
    pub fn set_default(&mut self, name: &str) {
        match self.find(name) {
            Some(index) => {
                self.default_index = Some(index);
                info!(provider = name, "Using default LLM provider");
            }
            None => {
                warn!(
                    requested = name,
                    substitute = self.default_name().unwrap_or("none"),
                    "Default provider not available, keeping current"
                );
            }
        }
    }

    /// Names of all registered providers, in registration order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers
            .iter()
            .map(|entry| entry.provider.name())
            .collect()
    }

    /// Name of the current default provider.
    pub fn default_name(&self) -> Option<&str> {
        self.default_index
            .map(|index| self.providers[index].provider.name())
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Generate text from a prompt.
    pub async fn generate_content(
        &self,
        prompt: &str,
        opts: &GenerateOptions,
    ) -> Result<LlmResponse, LlmError> {
        self.run(Payload::Text { prompt }, opts).await
    }

    /// Generate text from a prompt plus a media file.
    pub async fn generate_content_with_media(
        &self,
        prompt: &str,
        media: &Path,
        opts: &GenerateOptions,
    ) -> Result<LlmResponse, LlmError> {
        self.run(Payload::Media { prompt, media }, opts).await
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.providers
            .iter()
            .position(|entry| entry.provider.name() == name)
    }

    /// Resolve the provider a request starts from.
    fn starting_index(&self, requested: Option<&str>) -> Result<usize, LlmError> {
        let Some(default_index) = self.default_index else {
            return Err(LlmError::NoProvidersAvailable);
        };
        let Some(name) = requested else {
            return Ok(default_index);
        };
        match self.find(name) {
            Some(index) => Ok(index),
            None => {
                warn!(
                    requested = name,
                    substitute = self.providers[default_index].provider.name(),
                    "Requested provider not available, using default"
                );
                Ok(default_index)
            }
        }
    }

    /// Flatten the walk into `(provider index, model)` pairs: the starting
    /// provider's models first, then every other provider's in registration
    /// order when fallback is enabled.
    fn candidate_list(
        &self,
        start: usize,
        tier: Option<ModelTier>,
        fallback: bool,
    ) -> Vec<(usize, String)> {
        let mut candidates = Vec::new();
        self.push_candidates(&mut candidates, start, tier);
        if fallback {
            for index in 0..self.providers.len() {
                if index != start {
                    self.push_candidates(&mut candidates, index, tier);
                }
            }
        }
        candidates
    }

    fn push_candidates(
        &self,
        candidates: &mut Vec<(usize, String)>,
        index: usize,
        tier: Option<ModelTier>,
    ) {
        let entry = &self.providers[index];
        for model in resolve_models(&entry.tiers, tier, entry.provider.default_model()) {
            candidates.push((index, model));
        }
    }

    /// Walk the candidate list until an attempt succeeds or a terminal
    /// failure surfaces.
    async fn run(
        &self,
        payload: Payload<'_>,
        opts: &GenerateOptions,
    ) -> Result<LlmResponse, LlmError> {
        let start = self.starting_index(opts.provider.as_deref())?;
        let candidates = self.candidate_list(start, opts.tier, opts.fallback);

        let total = candidates.len();
        for (position, (index, model)) in candidates.iter().enumerate() {
            let provider = self.providers[*index].provider.as_ref();
            let remaining = total - position - 1;

            debug!(
                provider = provider.name(),
                model = %model,
                attempt = position + 1,
                of = total,
                "Attempting generation"
            );

            let result = match payload {
                Payload::Text { prompt } => provider.generate(prompt, model).await,
                Payload::Media { prompt, media } => {
                    provider.generate_with_media(prompt, media, model).await
                }
            };

            let err = match result {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            error!(
                provider = provider.name(),
                model = %model,
                error = %err,
                "Generation attempt failed"
            );

            // A media rejection gets one text-only retry on the same
            // provider, but only while another candidate could still take
            // over; with nothing left the rejection surfaces as-is.
            if let Payload::Media { prompt, .. } = payload {
                if matches!(err, LlmError::UnsupportedMedia { .. }) && remaining > 0 {
                    match self.degraded_text_retry(provider, prompt, model).await {
                        Ok(response) => return Ok(response),
                        Err(retry_err) if provider.is_rate_limited(&retry_err) => {
                            warn!(
                                provider = provider.name(),
                                model = %model,
                                "Degraded text retry rate limited, trying next candidate"
                            );
                            continue;
                        }
                        Err(retry_err) => return Err(retry_err),
                    }
                }
            }

            let rate_limited = provider.is_rate_limited(&err);
            debug!(
                provider = provider.name(),
                rate_limited, "Classified failure"
            );

            if rate_limited && remaining > 0 {
                let (next_index, next_model) = &candidates[position + 1];
                warn!(
                    provider = provider.name(),
                    model = %model,
                    next_provider = self.providers[*next_index].provider.name(),
                    next_model = %next_model,
                    "Rate limited, falling back"
                );
                continue;
            }

            return Err(err);
        }

        Err(LlmError::NoProvidersAvailable)
    }

    /// Retry a rejected media request as text, marking the prompt so the
    /// model knows the media was described rather than attached.
    async fn degraded_text_retry(
        &self,
        provider: &dyn LlmProvider,
        prompt: &str,
        model: &str,
    ) -> Result<LlmResponse, LlmError> {
        warn!(
            provider = provider.name(),
            model = %model,
            "Provider rejected media, retrying text-only"
        );
        let degraded = format!("{}{}", DEGRADED_MEDIA_PREFIX, prompt);
        provider.generate(&degraded, model).await
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
