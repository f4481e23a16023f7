//! Language-model client: OpenAI-compatible chat completions.
//!
//! Two call shapes are used by the pipeline:
//! - **function call**: a forced tool call whose JSON arguments are returned raw
//!   for the caller to validate (parameter extraction)
//! - **completion**: plain assistant text (answer synthesis)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LlmConfig;

// ============================================================================
// LanguageModel trait
// ============================================================================

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Free-text completion. Returns the assistant message content.
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, LlmError>;

    /// Forced call of `function`. Returns the raw JSON arguments string.
    async fn call_function(
        &self,
        model: &str,
        messages: &[ChatMessage],
        function: &FunctionSpec,
        temperature: f32,
    ) -> Result<String, LlmError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error + message types
// ============================================================================

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Response contained no choices")]
    NoChoices,

    #[error("Response message has no content")]
    MissingContent,

    #[error("Response did not call {function}: {raw}")]
    MissingToolCall { function: String, raw: String },

    #[error("Missing API key")]
    MissingApiKey,
}

impl LlmError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LlmError::Http(e) if e.is_timeout())
    }

    /// The model service itself failed, as opposed to answering badly.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            LlmError::Http(_) | LlmError::Api { .. } | LlmError::MissingApiKey
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// A callable function declared to the model, with its JSON-schema parameters.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

// ============================================================================
// Wire structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolSpec<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice<'a>>,
}

#[derive(Debug, Serialize)]
struct ToolSpec<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a FunctionSpec,
}

#[derive(Debug, Serialize)]
struct ToolChoice<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ToolChoiceFunction<'a>,
}

#[derive(Debug, Serialize)]
struct ToolChoiceFunction<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize, Serialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ToolCall {
    function: ToolCallFunction,
}

#[derive(Debug, Deserialize, Serialize)]
struct ToolCallFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// OpenAiClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        if api_key.is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn send(&self, request: &CompletionRequest<'_>) -> Result<ResponseMessage, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(error_body);

            tracing::error!(code = status.as_u16(), message = %message, "Language-model API error");

            return Err(LlmError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body: CompletionResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or(LlmError::NoChoices)
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, LlmError> {
        let request = CompletionRequest {
            model,
            messages,
            temperature,
            tools: None,
            tool_choice: None,
        };

        self.send(&request)
            .await?
            .content
            .ok_or(LlmError::MissingContent)
    }

    async fn call_function(
        &self,
        model: &str,
        messages: &[ChatMessage],
        function: &FunctionSpec,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let request = CompletionRequest {
            model,
            messages,
            temperature,
            tools: Some(vec![ToolSpec {
                kind: "function",
                function,
            }]),
            tool_choice: Some(ToolChoice {
                kind: "function",
                function: ToolChoiceFunction {
                    name: &function.name,
                },
            }),
        };

        let message = self.send(&request).await?;
        let arguments = message
            .tool_calls
            .iter()
            .find(|call| call.function.name == function.name)
            .map(|call| call.function.arguments.clone());

        arguments.ok_or_else(|| LlmError::MissingToolCall {
            function: function.name.clone(),
            raw: serde_json::to_string(&message).unwrap_or_default(),
        })
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// ============================================================================
// TESTS
// ============================================================================
