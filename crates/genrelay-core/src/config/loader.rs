//! Config loader: defaults overlaid with environment variables.
//!
//! # Loading precedence
//! 1. Defaults (from `RelayConfig::default()`)
//! 2. Environment variables (`GEMINI_API_KEY`, `OPENROUTER_MODEL`, …)
//!
//! Malformed numeric values keep the default with a warning; startup never
//! fails on a bad variable. The lookup is injectable so tests run without
//! touching process env.

use std::str::FromStr;

use tracing::warn;

use super::schema::{ProviderSettings, RelayConfig};

/// Load configuration from process environment variables.
pub fn load_from_env() -> RelayConfig {
    load_with(|key| std::env::var(key).ok())
}

/// Load configuration through an arbitrary variable lookup.
pub fn load_with<F>(lookup: F) -> RelayConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = RelayConfig::default();

    if let Some(value) = lookup("DEFAULT_LLM_PROVIDER") {
        if !value.is_empty() {
            config.default_provider = value;
        }
    }
    if let Some(value) = lookup("SYSTEM_PROMPT") {
        config.system_prompt = value;
    }

    apply_provider_env(&mut config.gemini, "GEMINI", &lookup);
    apply_provider_env(&mut config.openrouter, "OPENROUTER", &lookup);

    config
}

/// Overlay one provider's settings with `<PREFIX>_*` variables.
fn apply_provider_env<F>(settings: &mut ProviderSettings, prefix: &str, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(&format!("{prefix}_API_KEY")) {
        settings.api_key = value;
    }
    if let Some(value) = lookup(&format!("{prefix}_MODEL")) {
        if !value.is_empty() {
            settings.model = value;
        }
    }
    if let Some(value) = lookup(&format!("{prefix}_TEMPERATURE")) {
        settings.params.temperature =
            parse_or_keep(&value, prefix, "TEMPERATURE", settings.params.temperature);
    }
    if let Some(value) = lookup(&format!("{prefix}_TOP_P")) {
        settings.params.top_p = parse_or_keep(&value, prefix, "TOP_P", settings.params.top_p);
    }
    if let Some(value) = lookup(&format!("{prefix}_TOP_K")) {
        match value.parse::<u32>() {
            Ok(top_k) => settings.params.top_k = Some(top_k),
            Err(_) => warn!("Invalid value for {}_TOP_K: {}", prefix, value),
        }
    }
    if let Some(value) = lookup(&format!("{prefix}_MAX_TOKENS")) {
        settings.params.max_output_tokens = parse_or_keep(
            &value,
            prefix,
            "MAX_TOKENS",
            settings.params.max_output_tokens,
        );
    }
    if let Some(value) = lookup(&format!("{prefix}_HEAVY_MODELS")) {
        settings.tiers.heavy = split_models(&value);
    }
    if let Some(value) = lookup(&format!("{prefix}_LIGHT_MODELS")) {
        settings.tiers.light = split_models(&value);
    }
    if let Some(value) = lookup(&format!("{prefix}_SYSTEM_PROMPT")) {
        settings.system_prompt = value;
    }
    if let Some(value) = lookup(&format!("{prefix}_API_BASE")) {
        if !value.is_empty() {
            settings.api_base = Some(value);
        }
    }
}

/// Parse a numeric override, keeping the current value on failure.
fn parse_or_keep<T>(raw: &str, prefix: &str, field: &str, current: T) -> T
where
    T: FromStr + Copy,
{
    match raw.parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!("Invalid value for {}_{}: {}", prefix, field, raw);
            current
        }
    }
}

/// Split a comma-separated model list, trimming entries and dropping blanks.
fn split_models(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(String::from)
        .collect()
}
