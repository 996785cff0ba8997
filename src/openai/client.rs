//! OpenAiClient - chat completions for scene parsing, images for stills.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The environment variable holding the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Default base URL for the OpenAI API.
pub const OPENAI_API_BASE_URL: &str = "https://api.openai.com/v1";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    quality: &'a str,
    n: u32,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
}

/// Error body returned by the API: `{"error": {"message", "code"}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
}

/// Strip a surrounding Markdown code fence, if any.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Client for the OpenAI REST API.
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a client from `OPENAI_API_KEY`.
    pub fn new() -> Result<Self, OpenAiError> {
        Self::from_env(OPENAI_API_BASE_URL)
    }

    /// Create a client from `OPENAI_API_KEY` against `base_url`.
    pub fn from_env(base_url: &str) -> Result<Self, OpenAiError> {
        let api_key = std::env::var(OPENAI_API_KEY_ENV).map_err(|_| OpenAiError::MissingApiKey)?;
        Self::with_base_url(api_key, base_url.to_string())
    }

    pub fn with_api_key(api_key: String) -> Result<Self, OpenAiError> {
        Self::with_base_url(api_key, OPENAI_API_BASE_URL.to_string())
    }

    /// Create a client with a custom base URL (mock servers, proxies).
    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, OpenAiError> {
        if api_key.is_empty() {
            return Err(OpenAiError::MissingApiKey);
        }

        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a system + user message pair and parse the reply as JSON.
    pub async fn chat_json(
        &self,
        model: &str,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<serde_json::Value, OpenAiError> {
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
            max_tokens,
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OpenAiError::MalformedResponse("no message content".to_string()))?;

        log::debug!("Raw response: {}", content);
        serde_json::from_str(strip_code_fence(&content))
            .map_err(|e| OpenAiError::MalformedResponse(format!("invalid JSON content: {}", e)))
    }

    /// Generate one image and return its URL.
    pub async fn generate_image(
        &self,
        model: &str,
        prompt: &str,
        size: &str,
        quality: &str,
    ) -> Result<String, OpenAiError> {
        let request = ImageRequest {
            model,
            prompt,
            size,
            quality,
            n: 1,
        };

        let response = self
            .http_client
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let images: ImageResponse = response.json().await?;
        images
            .data
            .into_iter()
            .next()
            .and_then(|d| d.url)
            .ok_or_else(|| OpenAiError::MalformedResponse("no image URL in response".to_string()))
    }

    /// Download a generated image to `dest`, creating parent directories.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64, OpenAiError> {
        let response = self
            .http_client
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let bytes = response.bytes().await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &bytes).await?;
        Ok(bytes.len() as u64)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, OpenAiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let (message, code) = match serde_json::from_str::<ErrorEnvelope>(&text) {
            Ok(envelope) => (envelope.error.message, envelope.error.code),
            Err(_) => (text, None),
        };

        if status.as_u16() == 429 {
            return Err(OpenAiError::RateLimit { message });
        }
        if status.as_u16() == 400
            && (code.as_deref() == Some("content_policy_violation")
                || message.to_lowercase().contains("content_policy_violation"))
        {
            return Err(OpenAiError::ContentPolicyViolation { message });
        }
        Err(OpenAiError::ApiError {
            status: status.as_u16(),
            message,
        })
    }
}

/// Errors that can occur during OpenAI operations.
#[derive(Debug, thiserror::Error)]
pub enum OpenAiError {
    #[error("OPENAI_API_KEY not found in environment variables")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Rate limited: {message}")]
    RateLimit { message: String },

    #[error("Content policy violation: {message}")]
    ContentPolicyViolation { message: String },

    #[error("Invalid response format: {0}")]
    MalformedResponse(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
