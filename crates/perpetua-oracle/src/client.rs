//! HTTP backends for the decision oracle.
//!
//! Enum-based dispatch over concrete backends, avoiding the
//! dyn-compatibility issues with async methods. Implementations exist for
//! OpenAI-compatible chat completions APIs and the Anthropic Messages API;
//! both communicate over HTTP via `reqwest` and report token usage so the
//! caller can meter cost.

use serde::Deserialize;

use crate::error::OracleError;

/// Which HTTP backend flavor to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// OpenAI-compatible chat completions API.
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
}

/// Connection settings for one HTTP backend.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Backend flavor.
    pub kind: BackendKind,
    /// Base API URL, without a trailing slash.
    pub api_url: String,
    /// API key.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
}

/// A completion returned by a backend, with token usage for metering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// The raw response text.
    pub text: String,
    /// Prompt tokens consumed.
    pub input_tokens: u64,
    /// Completion tokens produced.
    pub output_tokens: u64,
}

/// An HTTP backend that turns a prompt pair into a completion.
pub enum OracleBackend {
    /// OpenAI-compatible chat completions API.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
}

impl OracleBackend {
    /// Build a backend from configuration.
    pub fn from_config(config: &BackendConfig) -> Self {
        match config.kind {
            BackendKind::OpenAi => Self::OpenAi(OpenAiBackend::new(config)),
            BackendKind::Anthropic => Self::Anthropic(AnthropicBackend::new(config)),
        }
    }

    /// Send a prompt pair and return the completion.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Backend`] if the HTTP call fails or the
    /// response cannot be extracted.
    pub async fn complete(&self, system: &str, user: &str) -> Result<Completion, OracleError> {
        match self {
            Self::OpenAi(backend) => backend.complete(system, user).await,
            Self::Anthropic(backend) => backend.complete(system, user).await,
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OpenAi(_) => "openai-compatible",
            Self::Anthropic(_) => "anthropic",
        }
    }
}

/// Backend for OpenAI-compatible chat completions APIs.
///
/// Works with OpenAI, DeepSeek, and Ollama endpoints. Sends requests to
/// `{api_url}/chat/completions`.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiBackend {
    /// Create a new OpenAI-compatible backend.
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    async fn complete(&self, system: &str, user: &str) -> Result<Completion, OracleError> {
        let url = format!("{}/chat/completions", self.api_url);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": 0.7,
            "max_tokens": 1024,
            "response_format": {"type": "json_object"}
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Backend(format!("OpenAI request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(OracleError::Backend(format!(
                "OpenAI returned {status}: {error_body}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OracleError::Backend(format!("OpenAI response parse failed: {e}")))?;

        extract_openai_completion(&json)
    }
}

/// Extract text and usage from an OpenAI chat completions response.
fn extract_openai_completion(json: &serde_json::Value) -> Result<Completion, OracleError> {
    let text = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            OracleError::Backend("OpenAI response missing choices[0].message.content".to_owned())
        })?;

    Ok(Completion {
        text,
        input_tokens: usage_field(json, "prompt_tokens"),
        output_tokens: usage_field(json, "completion_tokens"),
    })
}

/// Backend for the Anthropic Messages API.
///
/// Anthropic uses a different request format from OpenAI:
/// - `x-api-key` header instead of `Authorization: Bearer`
/// - system prompt is a top-level field, not a message
/// - response structure is `content[0].text`, usage is
///   `usage.input_tokens`/`usage.output_tokens`
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl AnthropicBackend {
    /// Create a new Anthropic Messages API backend.
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    async fn complete(&self, system: &str, user: &str) -> Result<Completion, OracleError> {
        let url = format!("{}/messages", self.api_url);

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 1024,
            "system": system,
            "messages": [
                {"role": "user", "content": user}
            ]
        });

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Backend(format!("Anthropic request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(OracleError::Backend(format!(
                "Anthropic returned {status}: {error_body}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OracleError::Backend(format!("Anthropic response parse failed: {e}")))?;

        extract_anthropic_completion(&json)
    }
}

/// Extract text and usage from an Anthropic Messages API response.
fn extract_anthropic_completion(json: &serde_json::Value) -> Result<Completion, OracleError> {
    let text = json
        .get("content")
        .and_then(|c| c.get(0))
        .and_then(|b| b.get("text"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            OracleError::Backend("Anthropic response missing content[0].text".to_owned())
        })?;

    Ok(Completion {
        text,
        input_tokens: usage_field(json, "input_tokens"),
        output_tokens: usage_field(json, "output_tokens"),
    })
}

/// Read a token count from the response's `usage` object, defaulting to
/// zero when the backend omits usage.
fn usage_field(json: &serde_json::Value, field: &str) -> u64 {
    json.get("usage")
        .and_then(|u| u.get(field))
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0)
}
