//! Scene records produced by the story parser.

mod parser;

pub use parser::{render_parse_prompt, SceneParser, DEFAULT_PARSE_TEMPLATE};

use serde::{Deserialize, Serialize};

/// Maximum title length in characters.
pub const MAX_TITLE_LEN: usize = 100;
/// Maximum setting length in characters.
pub const MAX_SETTING_LEN: usize = 200;
/// Maximum summary length in characters.
pub const MAX_SUMMARY_LEN: usize = 500;
/// Maximum tone length in characters.
pub const MAX_TONE_LEN: usize = 50;

/// A structured unit of story content.
///
/// Identifiers are unique within a single parse, not globally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: u32,
    pub title: String,
    #[serde(default)]
    pub characters: Vec<String>,
    pub setting: String,
    pub summary: String,
    /// Free-text tone ("mysterious, suspenseful"), not an enum.
    pub tone: String,
}

impl Scene {
    /// Check the bounded-length fields.
    pub fn validate(&self) -> Result<(), SceneError> {
        check_len("title", &self.title, MAX_TITLE_LEN)?;
        check_len("setting", &self.setting, MAX_SETTING_LEN)?;
        check_len("summary", &self.summary, MAX_SUMMARY_LEN)?;
        check_len("tone", &self.tone, MAX_TONE_LEN)?;
        Ok(())
    }
}

fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), SceneError> {
    let len = value.chars().count();
    if len > max {
        return Err(SceneError::FieldTooLong { field, len, max });
    }
    Ok(())
}

/// Outcome of parsing a story, with failure details instead of an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneParseResult {
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

fn default_success() -> bool {
    true
}

impl SceneParseResult {
    /// Decode and validate the `{"scenes": [...]}` payload returned by the model.
    pub fn from_json(value: serde_json::Value) -> Result<Self, SceneError> {
        let result: SceneParseResult = serde_json::from_value(value)?;
        for scene in &result.scenes {
            scene.validate()?;
        }
        Ok(result)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            scenes: Vec::new(),
            success: false,
            error_message: Some(message.into()),
        }
    }
}

/// Errors raised while validating scene data.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("invalid scene structure: {0}")]
    Structure(#[from] serde_json::Error),

    #[error("scene field '{field}' is {len} characters (max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}
