//! LLM provider layer for Genrelay.
//!
//! Uniform text generation over interchangeable backends, with sequential
//! fallback when one of them is throttled.
//!
//! # Architecture
//!
//! - [`traits::LlmProvider`] — trait that all providers implement
//! - [`gemini::GeminiProvider`] — Google Generative Language API client
//! - [`openrouter::OpenRouterProvider`] — OpenAI-compatible OpenRouter client
//! - [`service::LlmService`] — provider registry and fallback orchestration
//! - [`classify`] — phrase-based rate-limit detection
//! - [`media`] — MIME guessing and file helpers shared by providers

pub mod classify;
pub mod error;
pub mod gemini;
pub mod media;
pub mod openrouter;
pub mod service;
pub mod traits;

// Re-export main types for convenience
pub use error::LlmError;
pub use gemini::GeminiProvider;
pub use openrouter::OpenRouterProvider;
pub use service::{GenerateOptions, LlmService, DEGRADED_MEDIA_PREFIX};
pub use traits::LlmProvider;
