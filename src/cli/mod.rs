//! Command-line interface definitions and subcommand handlers.

mod args;
mod commands;

pub use args::{generation_mode, Args, BatchArgs, Command, ConfigAction};
pub use commands::{
    confirm, generate_all, generate_media, generate_videos, handle_config_action, load_config,
    run_test, RunStatus, VideoRunOptions, SAMPLE_STORY,
};
