//! Still-image generation for scenes (OpenAI images API).

mod generator;
mod prompt;

pub use generator::{ImageGenerationError, ImageGenerator};
pub use prompt::{build_image_prompt, tone_style, DEFAULT_STYLE};
