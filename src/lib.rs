//! storyreel library crate.
//!
//! Story script → structured scenes → scene images and budget-bounded video
//! clips. The binary in `main.rs` is a thin clap front end over these modules.

pub mod assets;
pub mod cli;
pub mod config;
pub mod fal;
pub mod image;
pub mod openai;
pub mod pipeline;
pub mod retry;
pub mod scene;
pub mod video;
