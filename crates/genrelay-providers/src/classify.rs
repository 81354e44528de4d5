//! Rate-limit classification over provider failure text.
//!
//! Providers do not agree on how they report throttling, so classification
//! works on the rendered error message: lowercase it, then look for any of
//! the provider's known phrases. Only the text matters; no status codes or
//! headers are inspected here.

/// Returns true when `message` contains any of `phrases`, case-insensitively.
///
/// Phrases must already be lowercase.
pub fn is_rate_limit_message(message: &str, phrases: &[&str]) -> bool {
    let lowered = message.to_lowercase();
    phrases.iter().any(|phrase| lowered.contains(phrase))
}
