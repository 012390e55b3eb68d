//! Language-model clients.
//!
//! Two request shapes are supported: the chat-completions shape with a
//! bearer credential, and the messages shape with an `x-api-key` header
//! and a version marker. The shape is picked once from configuration; the
//! rest of the code only calls [`LanguageModelClient::send`].

use crate::error::LlmError;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// System prompt shared by every analysis.
pub const SYSTEM_PROMPT: &str = "You are an assistant specialized in analyzing game reviews. \
Your task is to analyze the data provided and extract valuable insights.";

/// Supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
        }
    }

    /// Model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o",
            Provider::Anthropic => "claude-3-5-sonnet-latest",
        }
    }
}

impl FromStr for Provider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            other => Err(LlmError::UnsupportedProvider(other.to_string())),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything needed to build a client.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub provider: Provider,
    pub model: String,
    pub api_key: String,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    /// Overrides the provider's default endpoint.
    pub base_url: Option<String>,
}

/// A language model that answers one prompt with text.
pub enum LanguageModelClient {
    OpenAiStyle(OpenAiClient),
    AnthropicStyle(AnthropicClient),
}

impl LanguageModelClient {
    pub fn from_settings(settings: &ModelSettings) -> Result<Self, LlmError> {
        if settings.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey(settings.provider.as_str()));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;

        let client = match settings.provider {
            Provider::OpenAi => LanguageModelClient::OpenAiStyle(OpenAiClient {
                http,
                api_key: settings.api_key.clone(),
                base_url: settings
                    .base_url
                    .clone()
                    .unwrap_or_else(|| OPENAI_API_URL.to_string()),
                model: settings.model.clone(),
                max_tokens: settings.max_tokens,
            }),
            Provider::Anthropic => LanguageModelClient::AnthropicStyle(AnthropicClient {
                http,
                api_key: settings.api_key.clone(),
                base_url: settings
                    .base_url
                    .clone()
                    .unwrap_or_else(|| ANTHROPIC_API_URL.to_string()),
                model: settings.model.clone(),
                max_tokens: settings.max_tokens,
            }),
        };

        Ok(client)
    }

    pub fn provider(&self) -> Provider {
        match self {
            LanguageModelClient::OpenAiStyle(_) => Provider::OpenAi,
            LanguageModelClient::AnthropicStyle(_) => Provider::Anthropic,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            LanguageModelClient::OpenAiStyle(c) => &c.model,
            LanguageModelClient::AnthropicStyle(c) => &c.model,
        }
    }

    /// Sends `prompt` together with `data` and returns the model's text.
    pub async fn send(&self, prompt: &str, data: &Value) -> Result<String, LlmError> {
        let user = compose_user_message(prompt, data);
        debug!(
            provider = %self.provider(),
            model = self.model(),
            bytes = user.len(),
            "Sending analysis request"
        );

        match self {
            LanguageModelClient::OpenAiStyle(c) => c.complete(SYSTEM_PROMPT, &user).await,
            LanguageModelClient::AnthropicStyle(c) => c.complete(SYSTEM_PROMPT, &user).await,
        }
    }
}

/// Joins the task prompt and the JSON payload into one user message.
pub fn compose_user_message(prompt: &str, data: &Value) -> String {
    if data.is_null() {
        prompt.trim().to_string()
    } else {
        format!("{}\n\nData for analysis: {}", prompt.trim(), data)
    }
}

/// Pulls a readable message out of a provider error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| {
            if body.is_empty() {
                "unknown error".to_string()
            } else {
                body.to_string()
            }
        })
}

async fn post_json<T: Serialize>(
    http: &reqwest::Client,
    provider: &'static str,
    url: &str,
    headers: HeaderMap,
    body: &T,
) -> Result<reqwest::Response, LlmError> {
    let response = http.post(url).headers(headers).json(body).send().await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        return Err(LlmError::Api {
            provider,
            status,
            message: error_message(&text),
        });
    }

    Ok(response)
}

// =============================================================================
// Chat-completions shape
// =============================================================================

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiReply,
}

#[derive(Debug, Deserialize)]
struct OpenAiReply {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    fn headers(&self) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| LlmError::Request(format!("invalid API key header: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn build_request(&self, system: &str, user: &str) -> OpenAiRequest {
        OpenAiRequest {
            model: self.model.clone(),
            messages: vec![
                OpenAiMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                OpenAiMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens: self.max_tokens,
        }
    }

    fn extract_text(response: OpenAiResponse) -> Result<String, LlmError> {
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyResponse("openai"))
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = self.build_request(system, user);

        let response = post_json(&self.http, "openai", &url, self.headers()?, &request).await?;
        let body: OpenAiResponse = response.json().await?;

        Self::extract_text(body)
    }
}

// =============================================================================
// Messages shape
// =============================================================================

pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

impl AnthropicClient {
    fn headers(&self) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|e| LlmError::Request(format!("invalid API key header: {}", e)))?;
        headers.insert("x-api-key", key);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn build_request(&self, system: &str, user: &str) -> AnthropicRequest {
        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: system.to_string(),
            messages: vec![AnthropicMessage {
                role: "user",
                content: user.to_string(),
            }],
        }
    }

    fn extract_text(response: AnthropicResponse) -> Result<String, LlmError> {
        response
            .content
            .into_iter()
            .find_map(|block| match block {
                AnthropicBlock::Text { text } if !text.trim().is_empty() => Some(text),
                _ => None,
            })
            .ok_or(LlmError::EmptyResponse("anthropic"))
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let url = format!("{}/messages", self.base_url);
        let request = self.build_request(system, user);

        let response =
            post_json(&self.http, "anthropic", &url, self.headers()?, &request).await?;
        let body: AnthropicResponse = response.json().await?;

        Self::extract_text(body)
    }
}
