//! Story → scenes via a chat completion returning strict JSON.

use crate::config::ParserConfig;
use crate::openai::OpenAiClient;
use crate::retry::{retry_async, RetryPolicy};

use super::{Scene, SceneParseResult};

const SYSTEM_PROMPT: &str = "You are an expert story analyst. Return only valid JSON.";

/// Placeholder substituted with the story in a prompt template.
const STORY_PLACEHOLDER: &str = "{{ story_text }}";

/// Built-in instruction used when no template file is configured.
pub const DEFAULT_PARSE_TEMPLATE: &str = r#"You are an expert story analyst. Parse the following story into structured scenes.

For each scene, extract:
- id: scene number (starting from 1)
- title: short descriptive name
- characters: list of character names mentioned
- setting: brief location/context description
- summary: 1-3 line plot summary
- tone: emotional tone (e.g., suspenseful, comedic, dramatic)

Return ONLY valid JSON in this exact format:
{
  "scenes": [
    {
      "id": 1,
      "title": "Scene Title",
      "characters": ["Character1", "Character2"],
      "setting": "Location description",
      "summary": "Brief plot summary of what happens.",
      "tone": "emotional_tone"
    }
  ]
}

Story to parse:
{{ story_text }}
"#;

/// Substitute the story into `template` (or the built-in one).
pub fn render_parse_prompt(template: Option<&str>, story_text: &str) -> String {
    template
        .unwrap_or(DEFAULT_PARSE_TEMPLATE)
        .replace(STORY_PLACEHOLDER, story_text)
}

/// Splits prose into scenes using a language model.
///
/// Every failure collapses to an empty result; callers only see "no scenes".
pub struct SceneParser {
    client: Option<OpenAiClient>,
    config: ParserConfig,
    template: Option<String>,
}

impl SceneParser {
    /// Create a parser from the environment.
    ///
    /// A missing `OPENAI_API_KEY` is not fatal: the parser is built without a
    /// client and every parse returns no scenes.
    pub fn new(config: ParserConfig) -> Self {
        let client = match OpenAiClient::from_env(&config.base_url) {
            Ok(client) => Some(client),
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        };
        Self::with_client(client, config)
    }

    pub fn with_client(client: Option<OpenAiClient>, config: ParserConfig) -> Self {
        let template = config.template.as_ref().and_then(|path| {
            match std::fs::read_to_string(path) {
                Ok(t) => Some(t),
                Err(e) => {
                    log::error!(
                        "Failed to load prompt template {}: {}. Using built-in prompt.",
                        path.display(),
                        e
                    );
                    None
                }
            }
        });
        Self {
            client,
            config,
            template,
        }
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    /// Parse `story_text` into validated scenes, or an empty list.
    pub async fn parse_scenes(&self, story_text: &str) -> Vec<Scene> {
        self.parse_scenes_with_metadata(story_text).await.scenes
    }

    /// Parse and report success status and the failure reason.
    pub async fn parse_scenes_with_metadata(&self, story_text: &str) -> SceneParseResult {
        let story = story_text.trim();
        if story.is_empty() {
            log::error!("Empty or invalid story text provided");
            return SceneParseResult::failed("Story text is empty");
        }

        let Some(client) = &self.client else {
            log::error!("OpenAI API key not configured");
            return SceneParseResult::failed("OpenAI API key not configured");
        };

        let prompt = render_parse_prompt(self.template.as_deref(), story);
        // JSON and API failures retry immediately, as one unit.
        let policy = RetryPolicy::new(self.config.max_retries, std::time::Duration::ZERO);
        let response = retry_async(
            &policy,
            "Calling OpenAI API",
            |_| {
                client.chat_json(
                    &self.config.model,
                    SYSTEM_PROMPT,
                    &prompt,
                    self.config.temperature,
                    self.config.max_tokens,
                )
            },
            policy.fixed(),
        )
        .await;

        let value = match response {
            Ok(value) => value,
            Err(e) => {
                log::error!("Failed to get valid response from OpenAI API: {}", e.last);
                return SceneParseResult::failed(e.last.to_string());
            }
        };

        match SceneParseResult::from_json(value) {
            Ok(result) if result.scenes.is_empty() => {
                SceneParseResult::failed("Failed to parse any scenes from the story")
            }
            Ok(result) => {
                log::info!("Successfully parsed {} scenes", result.scenes.len());
                SceneParseResult {
                    success: true,
                    error_message: None,
                    ..result
                }
            }
            Err(e) => {
                log::error!("Response validation failed: {}", e);
                SceneParseResult::failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_embeds_story() {
        let prompt = render_parse_prompt(None, "Once upon a time.");
        assert!(prompt.ends_with("Story to parse:\nOnce upon a time.\n"));
        assert!(!prompt.contains(STORY_PLACEHOLDER));
    }

    #[test]
    fn test_custom_template() {
        let prompt = render_parse_prompt(Some("Split: {{ story_text }} /end"), "abc");
        assert_eq!(prompt, "Split: abc /end");
    }

    #[tokio::test]
    async fn test_without_client_returns_empty() {
        let parser = SceneParser::with_client(None, ParserConfig::default());
        let result = parser.parse_scenes_with_metadata("A story.").await;
        assert!(!result.success);
        assert!(result.scenes.is_empty());
        assert_eq!(
            result.error_message.as_deref(),
            Some("OpenAI API key not configured")
        );
    }

    #[tokio::test]
    async fn test_blank_story_returns_empty() {
        let parser = SceneParser::with_client(None, ParserConfig::default());
        assert!(parser.parse_scenes("   \n ").await.is_empty());
    }

    #[test]
    fn test_missing_template_file_falls_back() {
        let config = ParserConfig {
            template: Some("/definitely/not/here.txt".into()),
            ..ParserConfig::default()
        };
        let parser = SceneParser::with_client(None, config);
        assert!(parser.template.is_none());
    }
}
