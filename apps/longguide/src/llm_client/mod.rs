/// LLM Client: the single point of entry for hosted model calls in LongGuide.
///
/// Everything that talks to a model goes through a `GenerationBackend`. The
/// network implementation is `LlmClient`; `FakeBackend` stands in for it in
/// tests and dry runs. Retries, timeouts and rate limiting live in the
/// generation runner, so a backend makes exactly one attempt per call.
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::errors::FailureKind;

pub mod fake;
pub mod prompts;
pub mod rate_limit;
pub mod retry;

pub use fake::FakeBackend;
pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GenerationError {
    /// Worth retrying: rate limits, timeouts, connection drops, 5xx.
    #[error("transient generation failure: {0}")]
    Transient(String),

    /// Retrying the same request will not help.
    #[error("permanent generation failure: {0}")]
    Permanent(String),
}

impl GenerationError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GenerationError::Transient(_))
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            GenerationError::Transient(_) => FailureKind::TransientGeneration,
            GenerationError::Permanent(_) => FailureKind::PermanentGeneration,
        }
    }

    /// 408, 429 and 5xx are retryable; every other non-success status is not.
    pub fn from_status(status: u16, message: String) -> Self {
        let message = format!("API error (status {status}): {message}");
        if status == 408 || status == 429 || (500..600).contains(&status) {
            GenerationError::Transient(message)
        } else {
            GenerationError::Permanent(message)
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() || e.is_builder() {
            GenerationError::Permanent(format!("HTTP error: {e}"))
        } else {
            GenerationError::Transient(format!("HTTP error: {e}"))
        }
    }
}

/// A single prompt to send to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// The opaque prompt → text capability the pipeline is built around.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn model_name(&self) -> &str;

    /// One attempt. An empty completion is returned as `Ok("")` and left to
    /// the evaluator to reject.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl Provider {
    /// Claude models go to the Anthropic messages API; everything else is
    /// treated as an OpenAI-compatible chat completions endpoint.
    pub fn detect(model_name: &str) -> Self {
        if model_name.to_lowercase().contains("claude") {
            Provider::Anthropic
        } else {
            Provider::OpenAi
        }
    }

    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    fn default_base(&self) -> &'static str {
        match self {
            Provider::OpenAi => OPENAI_API_BASE,
            Provider::Anthropic => ANTHROPIC_API_BASE,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicResponse {
    fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Both providers wrap error text in `{"error": {"message": ...}}`.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Network backend
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    model: String,
    provider: Provider,
    api_base: String,
}

impl LlmClient {
    pub fn new(
        model: String,
        api_key: String,
        api_base: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let provider = Provider::detect(&model);
        let api_base = api_base
            .unwrap_or_else(|| provider.default_base().to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            model,
            provider,
            api_base,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    async fn call_anthropic(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/messages", self.api_base))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let response = check_status(response).await?;
        let parsed: AnthropicResponse = response.json().await?;

        if let Some(usage) = &parsed.usage {
            debug!(
                "LLM call succeeded: input_tokens={}, output_tokens={}",
                usage.input_tokens, usage.output_tokens
            );
        }

        Ok(parsed.text().unwrap_or_default().to_string())
    }

    async fn call_openai(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = OpenAiRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let response = check_status(response).await?;
        let parsed: OpenAiResponse = response.json().await?;

        if let Some(usage) = &parsed.usage {
            debug!(
                "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

#[async_trait]
impl GenerationBackend for LlmClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        match self.provider {
            Provider::Anthropic => self.call_anthropic(request).await,
            Provider::OpenAi => self.call_openai(request).await,
        }
    }
}

/// Maps non-success responses onto the transient/permanent split.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GenerationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);

    let err = GenerationError::from_status(status.as_u16(), message);
    if err.is_transient() {
        warn!("LLM API returned {status}");
    }
    Err(err)
}

// ────────────────────────────────────────────────────────────────────────────
// Structured output helpers
// ────────────────────────────────────────────────────────────────────────────

fn json_block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("valid regex"))
}

/// Pulls the first ```json fenced block out of free-form model output.
/// Falls back to fence stripping when the whole answer is one block.
pub fn extract_json_block(text: &str) -> &str {
    match json_block_pattern().captures(text).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => strip_json_fences(text),
    }
}

/// Deserializes the JSON payload of a model answer, if there is one.
pub fn parse_json_block<T: DeserializeOwned>(text: &str) -> Option<T> {
    serde_json::from_str(extract_json_block(text)).ok()
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_extract_json_block_inside_prose() {
        let answer = "Sure! Here are the metrics:\n```json\n[\"Accuracy\", \"Clarity\"]\n```\nHope it helps.";
        assert_eq!(extract_json_block(answer), "[\"Accuracy\", \"Clarity\"]");
        let parsed: Vec<String> = parse_json_block(answer).unwrap();
        assert_eq!(parsed, vec!["Accuracy", "Clarity"]);
    }

    #[test]
    fn test_parse_json_block_rejects_garbage() {
        assert!(parse_json_block::<Vec<String>>("no json here").is_none());
    }

    #[test]
    fn test_status_classification() {
        assert!(GenerationError::from_status(429, "slow down".into()).is_transient());
        assert!(GenerationError::from_status(503, "overloaded".into()).is_transient());
        assert!(GenerationError::from_status(408, "timeout".into()).is_transient());
        assert!(!GenerationError::from_status(400, "bad request".into()).is_transient());
        assert!(!GenerationError::from_status(401, "bad key".into()).is_transient());
    }

    #[test]
    fn test_provider_detection() {
        assert_eq!(Provider::detect("claude-3-5-sonnet"), Provider::Anthropic);
        assert_eq!(Provider::detect("gpt-4o-mini"), Provider::OpenAi);
        assert_eq!(Provider::detect("llama-3.3-70b-instruct"), Provider::OpenAi);
    }

    #[test]
    fn test_client_trims_custom_api_base() {
        let client = LlmClient::new(
            "gpt-4o-mini".to_string(),
            "key".to_string(),
            Some("http://localhost:8000/v1/".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.api_base, "http://localhost:8000/v1");
        assert_eq!(client.provider(), Provider::OpenAi);
    }

    #[test]
    fn test_anthropic_response_text() {
        let json = r#"{"content":[{"type":"text","text":"hello"}],"usage":{"input_tokens":3,"output_tokens":1}}"#;
        let parsed: AnthropicResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.text(), Some("hello"));
    }

    #[test]
    fn test_openai_response_shape() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"hi"}}]}"#;
        let parsed: OpenAiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hi"));
        assert!(parsed.usage.is_none());
    }
}
