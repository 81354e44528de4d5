//! Google Gemini provider (`generateContent` API).
//!
//! Talks to the Generative Language API directly via `reqwest`: text prompts
//! go straight to `models/{model}:generateContent`, media files are first
//! pushed through the resumable-upload endpoint and then referenced by URI.

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

/// Public Generative Language API base.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const PROVIDER_NAME: &str = "gemini";
const RESPONSE_MIME_TYPE: &str = "text/plain";
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Lowercase fragments that mark a Gemini failure as throttling.
const RATE_LIMIT_PHRASES: &[&str] = &[
    "quota exceeded",
    "resource exhausted",
    "rate limit",
    "too many requests",
];

// ─────────────────────────────────────────────
// GeminiProvider
// ─────────────────────────────────────────────

/// LLM provider backed by Google's Generative Language API.
pub struct GeminiProvider {
    /// HTTP client (shared, connection-pooled).
    client: reqwest::Client,
    /// API base URL, swappable for tests and proxies.
    api_base: String,
    /// API key sent via the `x-goog-api-key` header.
    api_key: String,
    /// Default model for this provider instance.
    default_model: String,
    /// Sampling parameters applied to every request.
    params: GenerationParams,
    /// Optional system instruction.
    system_prompt: Option<String>,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("api_base", &self.api_base)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl GeminiProvider {
    /// Create a new GeminiProvider.
    ///
    /// # Arguments
    /// * `api_key`       — Generative Language API key
    /// * `model`         — Default model identifier
    /// * `params`        — Sampling parameters (validated here)
    /// * `system_prompt` — Optional system instruction
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

        Ok(GeminiProvider {
            client,
            api_base: GEMINI_API_BASE.to_string(),
            api_key: api_key.into(),
            default_model: model.into(),
            params,
            system_prompt,
        })
    }

    /// Replace the API base URL (tests, regional endpoints).
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
        let mut provider = GeminiProvider::new(
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

    /// Build the generateContent URL for a model.
    fn generate_url(&self, model: &str) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{}/models/{}:generateContent", base, model)
    }

    /// Build the media upload URL (the upload endpoint lives under
    /// `/upload/v1beta` rather than `/v1beta`).
    fn upload_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!(
            "{}/files?uploadType=multipart",
            base.replacen("/v1beta", "/upload/v1beta", 1)
        )
    }

    /// Send a generateContent request and extract the response text.
    async fn run_generate(
        &self,
        contents: Vec<Content>,
        model: &str,
    ) -> Result<LlmResponse, LlmError> {
        let request_body = GenerateContentRequest {
            contents,
            system_instruction: self.system_prompt.as_deref().map(Content::system),
            generation_config: GenerationConfig::from_params(&self.params),
        };

        debug!(provider = PROVIDER_NAME, model = %model, "Calling LLM");

        let response = self
            .client
            .post(self.generate_url(model))
            .header("x-goog-api-key", &self.api_key)
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
        let parsed: GenerateContentResponse = serde_json::from_value(raw.clone())
            .map_err(|e| LlmError::invalid_response(PROVIDER_NAME, e.to_string()))?;

        let text = parsed
            .candidates
            .first()
            .map(Candidate::joined_text)
            .unwrap_or_default();

        debug!(provider = PROVIDER_NAME, chars = text.len(), "LLM response received");
        Ok(LlmResponse::new(text, raw))
    }

    /// Upload a media file, returning its `(uri, mime_type)` for reference
    /// from a generateContent request.
    async fn upload_media(&self, media: &Path) -> Result<(String, String), LlmError> {
        let mime_type = media::guess_mime(media);
        let bytes = media::read_bytes(media).await?;
        let display_name = media::file_name(media);

        let metadata = serde_json::json!({ "file": { "display_name": display_name.clone() } });
        let metadata_part = reqwest::multipart::Part::text(metadata.to_string())
            .mime_str("application/json")
            .map_err(|e| LlmError::transport(PROVIDER_NAME, e))?;
        let file_part = reqwest::multipart::Part::bytes(bytes)
            .file_name(display_name)
            .mime_str(&mime_type)
            .map_err(|e| LlmError::transport(PROVIDER_NAME, e))?;
        let form = reqwest::multipart::Form::new()
            .part("metadata", metadata_part)
            .part("file", file_part);

        debug!(provider = PROVIDER_NAME, mime_type = %mime_type, "Uploading media file");

        let response = self
            .client
            .post(self.upload_url())
            .header("x-goog-api-key", &self.api_key)
            .multipart(form)
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
                "Media upload failed"
            );
            return Err(LlmError::api(PROVIDER_NAME, status.as_u16(), body));
        }

        let upload: FileUploadResponse = response
            .json()
            .await
            .map_err(|e| LlmError::invalid_response(PROVIDER_NAME, e.to_string()))?;

        Ok((upload.file.uri, upload.file.mime_type.unwrap_or(mime_type)))
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn generate(&self, prompt: &str, model: &str) -> Result<LlmResponse, LlmError> {
        let contents = vec![Content::user(vec![Part::Text {
            text: prompt.to_string(),
        }])];
        self.run_generate(contents, model).await
    }

    async fn generate_with_media(
        &self,
        prompt: &str,
        media: &Path,
        model: &str,
    ) -> Result<LlmResponse, LlmError> {
        let (file_uri, mime_type) = self.upload_media(media).await?;
        // The file reference goes before the prompt text.
        let contents = vec![Content::user(vec![
            Part::FileData {
                file_data: FileData {
                    mime_type,
                    file_uri,
                },
            },
            Part::Text {
                text: prompt.to_string(),
            },
        ])];
        self.run_generate(contents, model).await
    }

    fn is_rate_limited(&self, error: &LlmError) -> bool {
        is_rate_limit_message(&error.to_string(), RATE_LIMIT_PHRASES)
    }
}

// ─────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    top_p: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

impl GenerationConfig {
    fn from_params(params: &GenerationParams) -> Self {
        GenerationConfig {
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            max_output_tokens: params.max_output_tokens,
            response_mime_type: RESPONSE_MIME_TYPE,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn user(parts: Vec<Part>) -> Self {
        Content {
            role: Some("user".to_string()),
            parts,
        }
    }

    /// System instructions carry no role on the wire.
    fn system(text: &str) -> Self {
        Content {
            role: None,
            parts: vec![Part::Text {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    FileData {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl Candidate {
    /// Concatenate the candidate's text parts; non-text parts are skipped.
    fn joined_text(&self) -> String {
        let Some(content) = &self.content else {
            return String::new();
        };
        content
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct FileUploadResponse {
    file: UploadedFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadedFile {
    uri: String,
    mime_type: Option<String>,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_provider(api_key: &str, system_prompt: Option<&str>) -> GeminiProvider {
        GeminiProvider::new(
            api_key,
            "gemini-2.5-pro-exp-03-25",
            GenerationParams::default(),
            system_prompt.map(String::from),
        )
        .unwrap()
    }

    // ── Unit tests ──

    #[test]
    fn test_generate_url_trailing_slash() {
        let provider =
            make_provider("key", None).with_api_base("http://localhost:9999/v1beta/");
        assert_eq!(
            provider.generate_url("gemini-2.5-pro-exp-03-25"),
            "http://localhost:9999/v1beta/models/gemini-2.5-pro-exp-03-25:generateContent"
        );
    }

    #[test]
    fn test_upload_url_rewrites_path() {
        let provider = make_provider("key", None);
        assert_eq!(
            provider.upload_url(),
            "https://generativelanguage.googleapis.com/upload/v1beta/files?uploadType=multipart"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::Text {
                text: "hi".to_string(),
            }])],
            system_instruction: Some(Content::system("be brief")),
            generation_config: GenerationConfig::from_params(&GenerationParams::default()),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "be brief");
        assert!(value["systemInstruction"].get("role").is_none());
        assert_eq!(value["generationConfig"]["temperature"], 1.0);
        assert_eq!(value["generationConfig"]["topP"], 0.95);
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 8192);
        assert_eq!(value["generationConfig"]["responseMimeType"], "text/plain");
    }

    #[test]
    fn test_file_part_serialization() {
        let part = Part::FileData {
            file_data: FileData {
                mime_type: "audio/mpeg".to_string(),
                file_uri: "https://example.com/files/abc".to_string(),
            },
        };
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["fileData"]["mimeType"], "audio/mpeg");
        assert_eq!(value["fileData"]["fileUri"], "https://example.com/files/abc");
    }

    #[test]
    fn test_response_parsing_concatenates_parts() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"text": "Hello "}, {"text": "world"}]
                }
            }]
        }))
        .unwrap();
        assert_eq!(response.candidates[0].joined_text(), "Hello world");
    }

    #[test]
    fn test_response_parsing_tolerates_empty_shapes() {
        let no_candidates: GenerateContentResponse =
            serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(no_candidates.candidates.is_empty());

        let no_content: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }))
        .unwrap();
        assert_eq!(no_content.candidates[0].joined_text(), "");
    }

    #[test]
    fn test_upload_response_parsing() {
        let upload: FileUploadResponse = serde_json::from_value(serde_json::json!({
            "file": {
                "name": "files/abc123",
                "uri": "https://example.com/v1beta/files/abc123",
                "mimeType": "audio/mpeg"
            }
        }))
        .unwrap();
        assert_eq!(upload.file.uri, "https://example.com/v1beta/files/abc123");
        assert_eq!(upload.file.mime_type.as_deref(), Some("audio/mpeg"));

        // mimeType is optional in the upload reply; the caller falls back to
        // the guessed type.
        let bare: FileUploadResponse = serde_json::from_value(serde_json::json!({
            "file": {"uri": "https://example.com/v1beta/files/def456"}
        }))
        .unwrap();
        assert!(bare.file.mime_type.is_none());
    }

    #[test]
    fn test_is_rate_limited_matches_quota_body() {
        let provider = make_provider("key", None);
        let err = LlmError::api(
            "gemini",
            429,
            "Quota exceeded for quota metric 'Generate requests'".to_string(),
        );
        assert!(provider.is_rate_limited(&err));
    }

    #[test]
    fn test_is_rate_limited_ignores_bare_status() {
        let provider = make_provider("key", None);
        // "429" alone is not in the Gemini phrase list.
        let err = LlmError::api("gemini", 429, "upstream busy".to_string());
        assert!(!provider.is_rate_limited(&err));

        let auth = LlmError::api("gemini", 401, "API key not valid".to_string());
        assert!(!provider.is_rate_limited(&auth));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = GenerationParams {
            temperature: 9.0,
            ..GenerationParams::default()
        };
        let err = GeminiProvider::new("key", "model", params, None).unwrap_err();
        assert!(matches!(err, LlmError::InvalidConfig { .. }));
    }

    #[test]
    fn test_from_settings_requires_api_key() {
        let settings = ProviderSettings::gemini_defaults();
        assert!(GeminiProvider::from_settings(&settings, "").unwrap().is_none());

        let mut configured = ProviderSettings::gemini_defaults();
        configured.api_key = "g-key".to_string();
        let provider = GeminiProvider::from_settings(&configured, "global prompt")
            .unwrap()
            .unwrap();
        assert_eq!(provider.default_model(), "gemini-2.5-pro-exp-03-25");
        assert_eq!(provider.system_prompt.as_deref(), Some("global prompt"));
    }

    #[test]
    fn test_debug_omits_api_key() {
        let provider = make_provider("super-secret", None);
        let rendered = format!("{:?}", provider);
        assert!(!rendered.contains("super-secret"));
    }

    // ── Integration tests with mock server ──

    #[tokio::test]
    async fn test_generate_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-pro-exp-03-25:generateContent"))
            .and(header("x-goog-api-key", "test-key-123"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{"role": "user", "parts": [{"text": "Hello"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {
                        "role": "model",
                        "parts": [{"text": "Hi there!"}]
                    },
                    "finishReason": "STOP"
                }]
            })))
            .mount(&mock_server)
            .await;

        let provider = make_provider("test-key-123", None)
            .with_api_base(format!("{}/v1beta", mock_server.uri()));

        let resp = provider
            .generate("Hello", "gemini-2.5-pro-exp-03-25")
            .await
            .unwrap();
        assert_eq!(resp.text, "Hi there!");
        assert_eq!(resp.raw["candidates"][0]["finishReason"], "STOP");
    }

    #[tokio::test]
    async fn test_generate_sends_system_instruction() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-pro-exp-03-25:generateContent"))
            .and(body_partial_json(serde_json::json!({
                "systemInstruction": {"parts": [{"text": "Answer in one word"}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "ok"}]}}]
            })))
            .mount(&mock_server)
            .await;

        let provider = make_provider("key", Some("Answer in one word"))
            .with_api_base(format!("{}/v1beta", mock_server.uri()));

        let resp = provider
            .generate("Hello", "gemini-2.5-pro-exp-03-25")
            .await
            .unwrap();
        assert_eq!(resp.text, "ok");
    }

    #[tokio::test]
    async fn test_generate_api_error_preserves_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-pro-exp-03-25:generateContent"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {
                    "code": 429,
                    "message": "Quota exceeded for quota metric 'Generate requests'",
                    "status": "RESOURCE_EXHAUSTED"
                }
            })))
            .mount(&mock_server)
            .await;

        let provider = make_provider("key", None)
            .with_api_base(format!("{}/v1beta", mock_server.uri()));

        let err = provider
            .generate("Hello", "gemini-2.5-pro-exp-03-25")
            .await
            .unwrap_err();
        match &err {
            LlmError::Api { status, message, .. } => {
                assert_eq!(*status, 429);
                assert!(message.contains("Quota exceeded"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
        assert!(provider.is_rate_limited(&err));
    }

    #[tokio::test]
    async fn test_generate_empty_candidates_yields_empty_text() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-pro-exp-03-25:generateContent"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"candidates": []})),
            )
            .mount(&mock_server)
            .await;

        let provider = make_provider("key", None)
            .with_api_base(format!("{}/v1beta", mock_server.uri()));

        let resp = provider
            .generate("Hello", "gemini-2.5-pro-exp-03-25")
            .await
            .unwrap();
        assert_eq!(resp.text, "");
        assert_eq!(resp.raw["candidates"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_generate_with_media_uploads_then_references_file() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/upload/v1beta/files"))
            .and(query_param("uploadType", "multipart"))
            .and(header("x-goog-api-key", "test-key-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "file": {
                    "name": "files/abc123",
                    "uri": "https://example.com/v1beta/files/abc123",
                    "mimeType": "audio/mpeg"
                }
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-pro-exp-03-25:generateContent"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{
                    "parts": [
                        {"fileData": {
                            "mimeType": "audio/mpeg",
                            "fileUri": "https://example.com/v1beta/files/abc123"
                        }},
                        {"text": "Summarize this episode"}
                    ]
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "An episode about Rust."}]}}]
            })))
            .mount(&mock_server)
            .await;

        let mut file = tempfile::Builder::new().suffix(".mp3").tempfile().unwrap();
        file.write_all(b"fake mp3 bytes").unwrap();

        let provider = make_provider("test-key-123", None)
            .with_api_base(format!("{}/v1beta", mock_server.uri()));

        let resp = provider
            .generate_with_media(
                "Summarize this episode",
                file.path(),
                "gemini-2.5-pro-exp-03-25",
            )
            .await
            .unwrap();
        assert_eq!(resp.text, "An episode about Rust.");
    }

    #[tokio::test]
    async fn test_upload_failure_propagates() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/upload/v1beta/files"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upload backend down"))
            .mount(&mock_server)
            .await;

        let mut file = tempfile::Builder::new().suffix(".mp3").tempfile().unwrap();
        file.write_all(b"fake mp3 bytes").unwrap();

        let provider = make_provider("key", None)
            .with_api_base(format!("{}/v1beta", mock_server.uri()));

        let err = provider
            .generate_with_media("Summarize", file.path(), "gemini-2.5-pro-exp-03-25")
            .await
            .unwrap_err();
        match err {
            LlmError::Api { status, message, .. } => {
                assert_eq!(status, 500);
                assert_eq!(message, "upload backend down");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }
}
