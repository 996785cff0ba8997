//! fal.ai video generation service.
//!
//! A single synchronous model run turns a prompt (and optional reference
//! image) into a downloadable clip. Retries wrap the run, never the download.

mod client;

pub use client::{
    encode_reference_image, FalClient, FalError, GeneratedVideo, VideoRequest, DEFAULT_MODEL,
    FAL_API_BASE_URL, FAL_KEY_ENV,
};
