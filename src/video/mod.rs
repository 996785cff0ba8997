//! Session-scoped video generation.
//!
//! `VideoGenerator` turns a scene into a clip on disk: prompt, fingerprint,
//! cache lookup, budget check, fal.ai request with retries, download (or a
//! placeholder file outside live mode), then ledger, record and cache updates.

mod budget;
mod cache;
mod fingerprint;
mod generator;
mod prompt;

pub use budget::{BudgetExceeded, BudgetLedger};
pub use cache::GenerationCache;
pub use fingerprint::{fingerprint, FINGERPRINT_LEN};
pub use generator::{
    GenerationMode, GenerationRecord, SessionSummary, VideoGenerationError, VideoGenerator,
    DRY_RUN_VIDEO_URL, SIMULATED_VIDEO_URL,
};
pub use prompt::build_video_prompt;
