//! Configuration schema: per-provider settings plus service defaults.
//!
//! Hierarchy: `RelayConfig` → one `ProviderSettings` per backend.
//! Serialized form uses **camelCase** keys; Rust uses snake_case.

use serde::{Deserialize, Serialize};

use crate::tiers::TierModels;
use crate::types::GenerationParams;

/// Model used by the Gemini provider when none is configured.
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.5-pro-exp-03-25";
/// Model used by the OpenRouter provider when none is configured.
pub const OPENROUTER_DEFAULT_MODEL: &str = "google/gemini-2.5-pro-exp-03-25:free";

// ─────────────────────────────────────────────
// Root config
// ─────────────────────────────────────────────

/// Root configuration, built once at startup and read-only afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelayConfig {
    /// Name of the provider tried first when a call names none.
    pub default_provider: String,
    /// System prompt applied to every provider unless it overrides one.
    /// Empty means unset.
    pub system_prompt: String,
    pub gemini: ProviderSettings,
    pub openrouter: ProviderSettings,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            default_provider: "gemini".to_string(),
            system_prompt: String::new(),
            gemini: ProviderSettings::gemini_defaults(),
            openrouter: ProviderSettings::openrouter_defaults(),
        }
    }
}

// ─────────────────────────────────────────────
// Per-provider settings
// ─────────────────────────────────────────────

/// Settings for a single LLM backend.
///
/// A provider without an API key stays out of the registry; that is normal
/// operation, not an error.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderSettings {
    /// API key for authentication. Empty means not configured.
    pub api_key: String,
    /// Default model when no tier list applies.
    pub model: String,
    /// Sampling parameters bound to every request from this provider.
    pub params: GenerationParams,
    /// Per-provider system prompt; overrides the global one when non-empty.
    pub system_prompt: String,
    /// Heavy/light model lists for tiered calls.
    pub tiers: TierModels,
    /// Endpoint override (tests, proxies, self-hosted gateways).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl ProviderSettings {
    pub fn gemini_defaults() -> Self {
        Self {
            model: GEMINI_DEFAULT_MODEL.to_string(),
            params: GenerationParams {
                top_k: Some(40),
                ..GenerationParams::default()
            },
            ..Self::default()
        }
    }

    pub fn openrouter_defaults() -> Self {
        Self {
            model: OPENROUTER_DEFAULT_MODEL.to_string(),
            ..Self::default()
        }
    }

    /// Whether this provider has a configured API key.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// System prompt this provider should send, if any: its own override
    /// first, the global prompt second.
    pub fn effective_system_prompt(&self, global: &str) -> Option<String> {
        if !self.system_prompt.is_empty() {
            Some(self.system_prompt.clone())
        } else if !global.is_empty() {
            Some(global.to_string())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_published_values() {
        let config = RelayConfig::default();
        assert_eq!(config.default_provider, "gemini");
        assert_eq!(config.gemini.model, GEMINI_DEFAULT_MODEL);
        assert_eq!(config.openrouter.model, OPENROUTER_DEFAULT_MODEL);
        assert_eq!(config.gemini.params.top_k, Some(40));
        assert_eq!(config.openrouter.params.top_k, None);
        assert_eq!(config.gemini.params.temperature, 1.0);
        assert_eq!(config.gemini.params.max_output_tokens, 8192);
    }

    #[test]
    fn test_is_configured_requires_non_empty_key() {
        let mut settings = ProviderSettings::gemini_defaults();
        assert!(!settings.is_configured());
        settings.api_key = "key".to_string();
        assert!(settings.is_configured());
    }

    #[test]
    fn test_provider_prompt_overrides_global() {
        let mut settings = ProviderSettings::gemini_defaults();
        assert_eq!(settings.effective_system_prompt(""), None);
        assert_eq!(
            settings.effective_system_prompt("global prompt"),
            Some("global prompt".to_string())
        );
        settings.system_prompt = "provider prompt".to_string();
        assert_eq!(
            settings.effective_system_prompt("global prompt"),
            Some("provider prompt".to_string())
        );
    }
}
