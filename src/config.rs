//! Configuration for storyreel.
//!
//! Settings are immutable records handed to each generator at construction.
//! An optional TOML file (`~/.config/storyreel/config.toml` or `--config`)
//! overrides individual keys; anything omitted keeps its documented default.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Video generation settings (fal.ai).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// fal.ai model endpoint. Default `fal-ai/veo3`.
    pub model: String,
    /// Base URL for synchronous model runs. Default `https://fal.run`.
    pub base_url: String,
    /// Clip length requested per scene. Default 10.
    pub duration_secs: u32,
    /// Default `1080p`.
    pub resolution: String,
    /// Default `16:9`.
    pub aspect_ratio: String,
    /// Default 24.
    pub fps: u32,
    /// Approximate USD per generated second. Default 0.50.
    pub cost_per_second: f64,
    /// Session budget ceiling in USD. Default 50.00.
    pub budget_limit: f64,
    /// Retries after the first attempt. Default 2.
    pub max_retries: u32,
    /// Fixed wait between attempts. Default 5 s.
    #[serde(rename = "retry_delay_secs", deserialize_with = "de_secs", serialize_with = "ser_secs")]
    pub retry_delay: Duration,
    /// Upper bound on a single request. Default 300 s.
    #[serde(rename = "request_timeout_secs", deserialize_with = "de_secs", serialize_with = "ser_secs")]
    pub request_timeout: Duration,
    /// Artificial latency in simulate mode. Default 10 s.
    #[serde(rename = "simulate_delay_secs", deserialize_with = "de_secs", serialize_with = "ser_secs")]
    pub simulate_delay: Duration,
    /// How long a cache entry may be served. Default 24 h.
    #[serde(rename = "cache_ttl_secs", deserialize_with = "de_secs", serialize_with = "ser_secs")]
    pub cache_ttl: Duration,
    /// Where clips are written. Taken from `[output]`.
    #[serde(skip)]
    pub output_dir: PathBuf,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            model: crate::fal::DEFAULT_MODEL.to_string(),
            base_url: crate::fal::FAL_API_BASE_URL.to_string(),
            duration_secs: 10,
            resolution: "1080p".to_string(),
            aspect_ratio: "16:9".to_string(),
            fps: 24,
            cost_per_second: 0.50,
            budget_limit: 50.0,
            max_retries: 2,
            retry_delay: Duration::from_secs(5),
            request_timeout: Duration::from_secs(300),
            simulate_delay: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(86_400),
            output_dir: PathBuf::from(DEFAULT_ASSETS_DIR),
        }
    }
}

impl VideoConfig {
    /// Fixed-rate estimate for one clip: rate × duration.
    pub fn estimated_clip_cost(&self) -> f64 {
        self.cost_per_second * f64::from(self.duration_secs)
    }
}

/// Image generation settings (DALL·E).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub model: String,
    pub base_url: String,
    /// 16:9 landscape. Default `1792x1024`.
    pub size: String,
    pub quality: String,
    pub max_retries: u32,
    #[serde(rename = "rate_limit_delay_secs", deserialize_with = "de_secs", serialize_with = "ser_secs")]
    pub rate_limit_delay: Duration,
    /// Pause between scenes in a batch.
    #[serde(rename = "batch_pause_secs", deserialize_with = "de_secs", serialize_with = "ser_secs")]
    pub batch_pause: Duration,
    #[serde(skip)]
    pub output_dir: PathBuf,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            model: "dall-e-3".to_string(),
            base_url: crate::openai::OPENAI_API_BASE_URL.to_string(),
            size: "1792x1024".to_string(),
            quality: "standard".to_string(),
            max_retries: 1,
            rate_limit_delay: Duration::from_secs(5),
            batch_pause: Duration::from_secs(2),
            output_dir: PathBuf::from(DEFAULT_ASSETS_DIR),
        }
    }
}

/// Scene parsing settings (chat completions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_retries: u32,
    /// Prompt template file containing `{{ story_text }}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            base_url: crate::openai::OPENAI_API_BASE_URL.to_string(),
            temperature: 0.3,
            max_tokens: 2000,
            max_retries: 1,
            template: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub assets_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from(DEFAULT_ASSETS_DIR),
        }
    }
}

/// Default assets directory, relative to the working directory.
pub const DEFAULT_ASSETS_DIR: &str = "assets";

/// Configuration file structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load `path` if it exists, else return defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Replace the assets directory used by every generator.
    pub fn with_assets_dir(mut self, dir: PathBuf) -> Self {
        self.output.assets_dir = dir;
        self
    }

    pub fn video(&self) -> VideoConfig {
        VideoConfig {
            output_dir: self.output.assets_dir.clone(),
            ..self.video.clone()
        }
    }

    pub fn image(&self) -> ImageConfig {
        ImageConfig {
            output_dir: self.output.assets_dir.clone(),
            ..self.image.clone()
        }
    }

    pub fn parser(&self) -> ParserConfig {
        self.parser.clone()
    }
}

fn de_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}

pub(crate) fn ser_secs<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(value.as_secs_f64())
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("storyreel")
        .join("config.toml")
}

/// Commented template written by `storyreel config init`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# storyreel configuration

[video]
# fal.ai model and endpoint
model = "fal-ai/veo3"
base_url = "https://fal.run"
# Clip parameters
duration_secs = 10
resolution = "1080p"
aspect_ratio = "16:9"
fps = 24
# Cost tracking (approximate USD)
cost_per_second = 0.50
budget_limit = 50.0
# Retry behavior
max_retries = 2
retry_delay_secs = 5
request_timeout_secs = 300
# Latency modelled by --simulate
simulate_delay_secs = 10
# How long a generated clip is reused for an identical prompt
cache_ttl_secs = 86400

[image]
model = "dall-e-3"
size = "1792x1024"
quality = "standard"
max_retries = 1
rate_limit_delay_secs = 5
batch_pause_secs = 2

[parser]
model = "gpt-4o"
temperature = 0.3
max_tokens = 2000
max_retries = 1
# template = "templates/scene_parse_prompt.txt"

[output]
assets_dir = "assets"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_video_defaults() {
        let video = VideoConfig::default();
        assert_eq!(video.duration_secs, 10);
        assert_eq!(video.cost_per_second, 0.50);
        assert_eq!(video.budget_limit, 50.0);
        assert_eq!(video.max_retries, 2);
        assert_eq!(video.retry_delay, Duration::from_secs(5));
        assert_eq!(video.estimated_clip_cost(), 5.0);
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = Config::parse(
            r#"
[video]
budget_limit = 12.5
retry_delay_secs = 0.25
"#,
        )
        .unwrap();
        assert_eq!(config.video.budget_limit, 12.5);
        assert_eq!(config.video.retry_delay, Duration::from_millis(250));
        assert_eq!(config.video.max_retries, 2);
        assert_eq!(config.image, ImageConfig::default());
    }

    #[test]
    fn test_template_parses_to_defaults() {
        let config = Config::parse(DEFAULT_CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.video, VideoConfig::default());
        assert_eq!(config.parser.model, "gpt-4o");
    }

    #[test]
    fn test_assets_dir_flows_into_generator_configs() {
        let config = Config::default().with_assets_dir(PathBuf::from("/tmp/out"));
        assert_eq!(config.video().output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.image().output_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_negative_duration_rejected() {
        assert!(Config::parse("[video]\nretry_delay_secs = -1").is_err());
    }

    #[test]
    fn test_load_from_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let result = Config::load_from(&dir.path().join("nope.toml"));
        assert!(matches!(result, Err(ConfigError::IoError { .. })));
    }

    #[test]
    fn test_load_from_invalid_toml_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[video\nbroken").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
