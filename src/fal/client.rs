//! fal.ai client for scene clip generation.
//!
//! Runs a video model synchronously against `fal.run`, maps HTTP failures to
//! [`FalError`], and streams finished clips to disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::config::VideoConfig;
use crate::retry::{retry_async, RetryPolicy};

/// The environment variable holding the fal.ai API key.
pub const FAL_KEY_ENV: &str = "FAL_KEY";

/// Default base URL for synchronous fal.ai model runs.
pub const FAL_API_BASE_URL: &str = "https://fal.run";

/// Video model used unless the config names another.
pub const DEFAULT_MODEL: &str = "fal-ai/veo3";

/// Synchronous runs block until the clip is rendered.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const HTTP_STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// 400 and 403 carry moderation rejections.
const HTTP_STATUS_BAD_REQUEST: u16 = 400;

const HTTP_STATUS_FORBIDDEN: u16 = 403;

/// Lowercase fragments that mark a moderation rejection.
const CONTENT_POLICY_KEYWORDS: &[&str] = &[
    "content policy",
    "policy violation",
    "inappropriate",
    "prohibited",
    "unsafe",
    "violates",
    "moderation",
    "nsfw",
];

fn is_content_policy_error(error_text: &str) -> bool {
    let lower = error_text.to_lowercase();
    CONTENT_POLICY_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// Request body for a video generation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoRequest {
    pub prompt: String,
    /// Clip length in seconds.
    pub duration: u32,
    pub resolution: String,
    pub aspect_ratio: String,
    pub fps: u32,
    /// Reference image as a URL or `data:` URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl VideoRequest {
    /// Build a request using the clip parameters from `config`.
    pub fn from_config(prompt: &str, config: &VideoConfig) -> Self {
        Self {
            prompt: prompt.to_string(),
            duration: config.duration_secs,
            resolution: config.resolution.clone(),
            aspect_ratio: config.aspect_ratio.clone(),
            fps: config.fps,
            image_url: None,
        }
    }
}

/// Response from a model run.
#[derive(Debug, Deserialize)]
struct RunResponse {
    #[serde(default)]
    video: Option<VideoOutput>,
    /// Seconds, either a number or a string like "8s".
    #[serde(default)]
    duration: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct VideoOutput {
    #[serde(default)]
    url: Option<String>,
}

/// A successfully generated clip, not yet downloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedVideo {
    pub video_url: String,
    pub duration_secs: Option<f64>,
}

fn parse_duration_secs(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().trim_end_matches('s').parse().ok(),
        _ => None,
    }
}

/// Encode a local image as a `data:` URI for the `image_url` field.
pub fn encode_reference_image(path: &Path) -> Result<String, std::io::Error> {
    let bytes = std::fs::read(path)?;
    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    };
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{};base64,{}", mime, encoded))
}

fn build_http_client(timeout: Duration) -> Result<reqwest::Client, FalError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .build()?)
}

/// Authenticated handle on one fal.ai model endpoint.
pub struct FalClient {
    api_key: String,
    base_url: String,
    model: String,
    http_client: reqwest::Client,
}

impl FalClient {
    pub fn with_api_key(api_key: String) -> Result<Self, FalError> {
        Self::with_base_url(api_key, FAL_API_BASE_URL.to_string())
    }

    /// Point the default model at another host, such as a mock server.
    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, FalError> {
        Self::build(api_key, &base_url, DEFAULT_MODEL, DEFAULT_TIMEOUT)
    }

    /// Endpoint, model and timeout all come from `config`.
    pub fn with_config(api_key: String, config: &VideoConfig) -> Result<Self, FalError> {
        Self::build(
            api_key,
            &config.base_url,
            &config.model,
            config.request_timeout,
        )
    }

    fn build(
        api_key: String,
        base_url: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, FalError> {
        if api_key.is_empty() {
            return Err(FalError::MissingApiKey);
        }
        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            http_client: build_http_client(timeout)?,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run the model once and return the clip location.
    ///
    /// # Errors
    ///
    /// `FalError::RateLimit` on 429, `FalError::ContentPolicyViolation` when a
    /// 400/403 body mentions policy, `FalError::ApiError` for other statuses,
    /// `FalError::MalformedResponse` when the body has no `video.url`, and
    /// `FalError::HttpError` for transport failures.
    pub async fn generate(&self, request: &VideoRequest) -> Result<GeneratedVideo, FalError> {
        if request.prompt.trim().is_empty() {
            return Err(FalError::EmptyPrompt);
        }

        let url = format!("{}/{}", self.base_url, self.model);

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Key {}", self.api_key))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == HTTP_STATUS_TOO_MANY_REQUESTS {
                let retry_after_secs = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok());
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Rate limit exceeded".to_string());
                log::warn!(
                    "Rate limited by fal.ai API. Retry-After: {:?} seconds",
                    retry_after_secs
                );
                return Err(FalError::RateLimit {
                    message: error_text,
                    retry_after_secs,
                });
            }

            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            if (status.as_u16() == HTTP_STATUS_BAD_REQUEST
                || status.as_u16() == HTTP_STATUS_FORBIDDEN)
                && is_content_policy_error(&error_text)
            {
                log::warn!("Prompt rejected by content policy: {}", error_text);
                return Err(FalError::ContentPolicyViolation {
                    message: error_text,
                });
            }

            return Err(FalError::ApiError(format!(
                "API request failed with status {}: {}",
                status, error_text
            )));
        }

        let body = response.text().await?;
        let run: RunResponse = serde_json::from_str(&body)
            .map_err(|e| FalError::MalformedResponse(format!("invalid JSON: {}", e)))?;

        let video_url = run
            .video
            .and_then(|v| v.url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| FalError::MalformedResponse("no video URL in response".to_string()))?;

        Ok(GeneratedVideo {
            video_url,
            duration_secs: run.duration.as_ref().and_then(parse_duration_secs),
        })
    }

    /// Run the model with bounded retries and a fixed delay between attempts.
    ///
    /// Every failure is retried, including malformed responses. After
    /// `policy.max_retries + 1` failed attempts the last error is wrapped in
    /// `FalError::RetriesExhausted`.
    pub async fn generate_with_retry(
        &self,
        request: &VideoRequest,
        policy: &RetryPolicy,
    ) -> Result<GeneratedVideo, FalError> {
        retry_async(
            policy,
            "Calling fal.ai API",
            |_| self.generate(request),
            policy.fixed(),
        )
        .await
        .map_err(|e| FalError::RetriesExhausted {
            attempts: e.attempts,
            message: e.last.to_string(),
        })
    }

    /// Fetch a finished clip into `dest`, creating parent directories.
    ///
    /// Streams the body to `dest` without buffering the whole clip. A failure
    /// midway can leave a partial file behind.
    pub async fn download_video(&self, url: &str, dest: &Path) -> Result<PathBuf, FalError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let response = self.http_client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FalError::ApiError(format!(
                "Video download failed with status {}: {}",
                status, error_text
            )));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }

        file.flush().await?;

        Ok(dest.to_path_buf())
    }
}

/// Failures talking to fal.ai or writing its output.
#[derive(Debug, thiserror::Error)]
pub enum FalError {
    #[error("FAL_KEY not found in environment variables")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    MalformedResponse(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Rate limited: {message}")]
    RateLimit {
        message: String,
        /// Seconds from the Retry-After header.
        retry_after_secs: Option<u64>,
    },

    #[error("Content policy violation: {message}")]
    ContentPolicyViolation { message: String },

    #[error("All {attempts} attempts failed: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    #[error("Empty prompt")]
    EmptyPrompt,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_key_returns_error() {
        assert!(matches!(
            FalClient::with_api_key(String::new()),
            Err(FalError::MissingApiKey)
        ));
        assert!(matches!(
            FalClient::with_config(String::new(), &VideoConfig::default()),
            Err(FalError::MissingApiKey)
        ));
    }

    #[test]
    fn test_with_config_uses_model_and_trims_base_url() {
        let config = VideoConfig {
            base_url: "http://localhost:1234/".to_string(),
            model: "fal-ai/custom".to_string(),
            ..VideoConfig::default()
        };
        let client = FalClient::with_config("k".to_string(), &config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:1234");
        assert_eq!(client.model(), "fal-ai/custom");
    }

    #[test]
    fn test_request_from_config_serializes_clip_parameters() {
        let request = VideoRequest::from_config("a prompt", &VideoConfig::default());
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "prompt": "a prompt",
                "duration": 10,
                "resolution": "1080p",
                "aspect_ratio": "16:9",
                "fps": 24
            })
        );
    }

    #[test]
    fn test_request_includes_image_url_when_set() {
        let mut request = VideoRequest::from_config("p", &VideoConfig::default());
        request.image_url = Some("data:image/png;base64,AAAA".to_string());
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["image_url"], "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_parse_duration_variants() {
        assert_eq!(parse_duration_secs(&json!(10)), Some(10.0));
        assert_eq!(parse_duration_secs(&json!("8s")), Some(8.0));
        assert_eq!(parse_duration_secs(&json!(null)), None);
    }

    #[test]
    fn test_content_policy_detection() {
        assert!(is_content_policy_error("Prompt violates our Content Policy"));
        assert!(!is_content_policy_error("missing field: prompt"));
    }

    #[test]
    fn test_encode_reference_image() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("scene_1.png");
        std::fs::write(&path, b"abc").unwrap();
        let uri = encode_reference_image(&path).unwrap();
        assert_eq!(uri, "data:image/png;base64,YWJj");
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            FalError::MissingApiKey.to_string(),
            "FAL_KEY not found in environment variables"
        );
        assert_eq!(
            FalError::RetriesExhausted {
                attempts: 3,
                message: "boom".to_string()
            }
            .to_string(),
            "All 3 attempts failed: boom"
        );
    }
}
