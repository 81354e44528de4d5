//! Configuration for providers and routing.

pub mod loader;
pub mod schema;

// Re-export main types for convenience
pub use loader::{load_from_env, load_with};
pub use schema::{ProviderSettings, RelayConfig, GEMINI_DEFAULT_MODEL, OPENROUTER_DEFAULT_MODEL};
