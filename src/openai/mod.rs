//! OpenAI chat completions and image generation.

mod client;

pub use client::{OpenAiClient, OpenAiError, OPENAI_API_BASE_URL, OPENAI_API_KEY_ENV};
