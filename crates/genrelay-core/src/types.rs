//! Shared value types for the generation contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────
// LlmResponse
// ─────────────────────────────────────────────

/// Uniform success value returned by every provider call.
///
/// `text` is the extracted content; `raw` is the provider-native reply kept
/// only for diagnostics. Both always come from the same backend call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Extracted generated text. Empty when the backend returned no
    /// content; never optional.
    pub text: String,
    /// Provider-native reply body. Nothing downstream depends on its shape.
    pub raw: Value,
}

impl LlmResponse {
    pub fn new(text: impl Into<String>, raw: Value) -> Self {
        Self {
            text: text.into(),
            raw,
        }
    }
}

// ─────────────────────────────────────────────
// GenerationParams
// ─────────────────────────────────────────────

/// Sampling parameters bound to one provider at construction time.
///
/// Each provider maps these onto its own wire format; `top_k` is omitted by
/// backends that do not take it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationParams {
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
    /// Nucleus sampling cutoff (0.0 – 1.0).
    pub top_p: f64,
    /// Top-k cutoff, for backends that accept one.
    pub top_k: Option<u32>,
    /// Upper bound on generated tokens.
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_p: 0.95,
            top_k: None,
            max_output_tokens: 8192,
        }
    }
}

impl GenerationParams {
    /// Check every field against the ranges the backends accept.
    ///
    /// Returns a description of the first offending field, suitable for a
    /// configuration error message.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "temperature {} outside supported range 0.0..=2.0",
                self.temperature
            ));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(format!(
                "top_p {} outside supported range 0.0..=1.0",
                self.top_p
            ));
        }
        if self.top_k == Some(0) {
            return Err("top_k must be at least 1".to_string());
        }
        if self.max_output_tokens == 0 {
            return Err("max_output_tokens must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── LlmResponse ──

    #[test]
    fn test_response_keeps_text_and_raw_together() {
        let raw = serde_json::json!({"candidates": [{"content": {"parts": [{"text": "hi"}]}}]});
        let response = LlmResponse::new("hi", raw.clone());
        assert_eq!(response.text, "hi");
        assert_eq!(response.raw, raw);
    }

    #[test]
    fn test_empty_text_is_valid() {
        let response = LlmResponse::new("", Value::Null);
        assert!(response.text.is_empty());
    }

    // ── GenerationParams ──

    #[test]
    fn test_default_params_validate() {
        assert!(GenerationParams::default().validate().is_ok());
    }

    #[test]
    fn test_range_edges_are_accepted() {
        let params = GenerationParams {
            temperature: 2.0,
            top_p: 0.0,
            top_k: Some(1),
            max_output_tokens: 1,
        };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_temperature_is_rejected() {
        let params = GenerationParams {
            temperature: 2.5,
            ..Default::default()
        };
        let message = params.validate().unwrap_err();
        assert!(message.contains("temperature"));
    }

    #[test]
    fn test_out_of_range_top_p_is_rejected() {
        let params = GenerationParams {
            top_p: 1.5,
            ..Default::default()
        };
        assert!(params.validate().unwrap_err().contains("top_p"));
    }

    #[test]
    fn test_zero_top_k_and_zero_max_tokens_are_rejected() {
        let params = GenerationParams {
            top_k: Some(0),
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = GenerationParams {
            max_output_tokens: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_partial_config_json_fills_defaults() {
        let params: GenerationParams = serde_json::from_str(r#"{"temperature": 0.5}"#).unwrap();
        assert_eq!(params.temperature, 0.5);
        assert_eq!(params.top_p, 0.95);
        assert_eq!(params.max_output_tokens, 8192);
        assert_eq!(params.top_k, None);
    }
}
