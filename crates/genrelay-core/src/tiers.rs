//! Model tiers: mapping a task weight to candidate models per provider.
//!
//! Callers tag a request "heavy" (long transcripts, full articles) or
//! "light" (titles, slugs); each provider configures an ordered model list
//! per tier. Resolution is pure: it never touches a provider.

use serde::{Deserialize, Serialize};

/// Logical task weight used to pick among configured models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Heavy,
    Light,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Heavy => "heavy",
            ModelTier::Light => "light",
        }
    }
}

/// Ordered model identifiers per tier for one provider.
///
/// Ordering is significant: the first entry is primary, later entries are
/// same-provider fallbacks tried before any other provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TierModels {
    pub heavy: Vec<String>,
    pub light: Vec<String>,
}

impl TierModels {
    pub fn for_tier(&self, tier: ModelTier) -> &[String] {
        match tier {
            ModelTier::Heavy => &self.heavy,
            ModelTier::Light => &self.light,
        }
    }
}

/// Resolve the ordered candidate models for one provider.
///
/// No tier, or a tier with no configured list, falls back to the provider's
/// single default model.
pub fn resolve_models(
    tiers: &TierModels,
    tier: Option<ModelTier>,
    default_model: &str,
) -> Vec<String> {
    match tier {
        Some(tier) => {
            let configured = tiers.for_tier(tier);
            if configured.is_empty() {
                vec![default_model.to_string()]
            } else {
                configured.to_vec()
            }
        }
        None => vec![default_model.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tiers() -> TierModels {
        TierModels {
            heavy: vec!["model-a".to_string(), "model-b".to_string()],
            light: vec!["model-lite".to_string()],
        }
    }

    #[test]
    fn test_no_tier_uses_default_model() {
        let models = resolve_models(&sample_tiers(), None, "default-model");
        assert_eq!(models, vec!["default-model"]);
    }

    #[test]
    fn test_heavy_tier_preserves_configured_order() {
        let models = resolve_models(&sample_tiers(), Some(ModelTier::Heavy), "default-model");
        assert_eq!(models, vec!["model-a", "model-b"]);
    }

    #[test]
    fn test_light_tier_uses_light_list() {
        let models = resolve_models(&sample_tiers(), Some(ModelTier::Light), "default-model");
        assert_eq!(models, vec!["model-lite"]);
    }

    #[test]
    fn test_unconfigured_tier_falls_back_to_default_model() {
        let models = resolve_models(&TierModels::default(), Some(ModelTier::Heavy), "default-model");
        assert_eq!(models, vec!["default-model"]);
    }

    #[test]
    fn test_tier_names() {
        assert_eq!(ModelTier::Heavy.as_str(), "heavy");
        assert_eq!(ModelTier::Light.as_str(), "light");
    }
}
