//! Core types and configuration for Genrelay.
//!
//! This crate holds everything the provider implementations share:
//!
//! - **Types**: the response envelope and generation parameters
//! - **Tiers**: heavy/light model tiers and the model resolver
//! - **Config**: defaults overlaid with environment variables

pub mod config;
pub mod tiers;
pub mod types;

// Re-export main types for convenience
pub use config::{load_from_env, ProviderSettings, RelayConfig};
pub use tiers::{resolve_models, ModelTier, TierModels};
pub use types::{GenerationParams, LlmResponse};
