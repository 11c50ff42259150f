//! Gemini provider implementation
//!
//! This module implements the LLMProvider trait for Google's Gemini
//! `generateContent` API. The persona travels in the dedicated
//! `systemInstruction` field and the analysis prompt is sent as a single
//! user turn.
//! See: https://ai.google.dev/api/generate-content

use crate::{
    CompletionRequest, CompletionResponse, LLMError, LLMProvider, Message, Result, Role,
    StopReason, TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Requests are aborted client-side after this long
pub const GEMINI_TIMEOUT_SECS: u64 = 120;

/// Configuration for the Gemini provider
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key for authentication
    pub api_key: String,

    /// Base URL for the API (default: "https://generativelanguage.googleapis.com/v1beta")
    pub api_base: String,
}

impl GeminiConfig {
    /// Create a new config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
        }
    }

    /// Create config from environment variable
    ///
    /// Reads the API key from `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
            LLMError::ConfigurationError("GEMINI_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self::new(api_key))
    }

    /// Set custom API base URL (proxies, regional endpoints)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

/// Gemini provider
///
/// Works with any `generateContent` model, e.g.:
/// - gemini-2.5-flash
/// - gemini-2.0-flash
/// - gemini-3-flash-preview
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    /// Create a new Gemini provider with custom configuration
    pub fn with_config(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(GEMINI_TIMEOUT_SECS))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a new Gemini provider with API key and default settings
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(GeminiConfig::new(api_key))
    }

    /// Create a provider from environment variable
    pub fn from_env() -> Result<Self> {
        Self::with_config(GeminiConfig::from_env()?)
    }

    /// Get the current configuration
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        debug!("Sending request to Gemini API");

        let model = request.model.clone();
        let gemini_request = build_gemini_request(request);

        let response = self
            .client
            .post(format!(
                "{}/models/{model}:generateContent",
                self.config.api_base
            ))
            .header("x-goog-api-key", &self.config.api_key)
            .header("content-type", "application/json")
            .json(&gemini_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(LLMError::from_status(status.as_u16(), &model, error_text));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            LLMError::UnexpectedResponse(format!("Failed to parse response: {e}"))
        })?;

        parse_gemini_response(gemini_response)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

// Gemini-specific request/response types
// These match the generateContent wire format

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_output_tokens: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
}

fn text_content(role: Option<&str>, text: String) -> GeminiContent {
    GeminiContent {
        role: role.map(str::to_string),
        parts: vec![GeminiPart { text }],
    }
}

/// Build the wire request: persona into `systemInstruction`, turns into `contents`
fn build_gemini_request(request: CompletionRequest) -> GeminiRequest {
    let mut system = request.system;
    let mut contents = Vec::with_capacity(request.messages.len());

    for msg in request.messages {
        match msg.role {
            // A system message in the list is folded into the instruction
            Role::System => {
                system = Some(match system.take() {
                    Some(existing) => format!("{existing}\n\n{}", msg.content),
                    None => msg.content,
                });
            }
            Role::User => contents.push(text_content(Some("user"), msg.content)),
            Role::Assistant => contents.push(text_content(Some("model"), msg.content)),
        }
    }

    GeminiRequest {
        system_instruction: system.map(|s| text_content(None, s)),
        contents,
        generation_config: GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_tokens,
        },
    }
}

/// Concatenate the text parts of the first candidate
fn parse_gemini_response(response: GeminiResponse) -> Result<CompletionResponse> {
    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        LLMError::UnexpectedResponse("No candidates in response".to_string())
    })?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    let finish_reason = candidate.finish_reason.unwrap_or_default();
    let usage = response.usage_metadata.map(|u| TokenUsage {
        input_tokens: u.prompt_token_count,
        output_tokens: u.candidates_token_count,
    });

    debug!(
        "Received response - finish_reason: {}, chars: {}",
        finish_reason,
        text.chars().count()
    );

    Ok(CompletionResponse {
        message: Message::assistant(text),
        stop_reason: map_finish_reason(&finish_reason),
        usage,
    })
}

fn map_finish_reason(reason: &str) -> StopReason {
    match reason {
        "STOP" | "" => StopReason::EndTurn,
        "MAX_TOKENS" => StopReason::MaxTokens,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" => StopReason::ContentFilter,
        _ => {
            debug!("Unknown finish reason: {}", reason);
            StopReason::EndTurn
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_creation() {
        let provider = GeminiProvider::new("test-key").unwrap();
        assert_eq!(provider.name(), "gemini");
        assert_eq!(provider.config().api_key, "test-key");
        assert_eq!(provider.config().api_base, DEFAULT_GEMINI_API_BASE);
    }

    #[test]
    fn test_custom_api_base() {
        let config = GeminiConfig::new("test-key").with_api_base("http://localhost:9000/v1beta");
        let provider = GeminiProvider::with_config(config).unwrap();
        assert_eq!(provider.config().api_base, "http://localhost:9000/v1beta");
    }

    #[test]
    fn test_request_wire_format() {
        let request = CompletionRequest::builder("gemini-2.5-flash")
            .system("persona")
            .add_message(Message::user("prompt"))
            .max_tokens(8192)
            .temperature(0.7)
            .build();

        let value = serde_json::to_value(build_gemini_request(request)).unwrap();
        assert_eq!(
            value,
            json!({
                "systemInstruction": {"parts": [{"text": "persona"}]},
                "contents": [{"role": "user", "parts": [{"text": "prompt"}]}],
                "generationConfig": {"temperature": 0.7_f32, "maxOutputTokens": 8192}
            })
        );
    }

    #[test]
    fn test_system_message_folded_into_instruction() {
        let request = CompletionRequest::builder("m")
            .add_message(Message::system("extra rules"))
            .add_message(Message::user("prompt"))
            .build();

        let wire = build_gemini_request(request);
        assert_eq!(wire.contents.len(), 1);
        let instruction = wire.system_instruction.unwrap();
        assert_eq!(instruction.parts[0].text, "extra rules");
    }

    #[test]
    fn test_parse_response_concatenates_parts() {
        let raw = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "{\"a\":"}, {"text": " 1}"}]},
                "finishReason": "MAX_TOKENS"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5}
        });
        let response: GeminiResponse = serde_json::from_value(raw).unwrap();
        let completion = parse_gemini_response(response).unwrap();

        assert_eq!(completion.text(), "{\"a\": 1}");
        assert_eq!(completion.stop_reason, StopReason::MaxTokens);
        assert_eq!(completion.usage.unwrap().total(), 15);
    }

    #[test]
    fn test_parse_response_without_candidates() {
        let response: GeminiResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(
            parse_gemini_response(response),
            Err(LLMError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(map_finish_reason("STOP"), StopReason::EndTurn);
        assert_eq!(map_finish_reason("MAX_TOKENS"), StopReason::MaxTokens);
        assert_eq!(map_finish_reason("SAFETY"), StopReason::ContentFilter);
        assert_eq!(map_finish_reason("SOMETHING_NEW"), StopReason::EndTurn);
    }
}
