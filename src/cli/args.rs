//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::video::GenerationMode;

/// Turn a story script into scene images and video clips
#[derive(Parser, Debug)]
#[command(name = "storyreel")]
#[command(version, about = "Story script to scene images and video clips", long_about = None)]
#[command(after_help = "EXAMPLES:
    # Parse a story and generate one image per scene
    storyreel generate-media story.txt

    # Try the video pipeline without spending anything
    storyreel generate-videos story.txt --dry-run

    # Real clips, using existing scene images as references
    storyreel generate-videos story.txt --use-images --budget 20

    # Images, then clips seeded from those images
    storyreel generate-all story.txt --dry-run-videos")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

/// Options shared by every batch subcommand.
#[derive(clap::Args, Debug, Clone, PartialEq)]
pub struct BatchArgs {
    /// Path to the story script (.txt file)
    pub script: PathBuf,

    /// Regenerate assets that already exist
    #[arg(long)]
    pub overwrite: bool,

    /// Maximum number of scenes to process
    #[arg(long)]
    pub max_scenes: Option<usize>,

    /// Directory for generated assets (overrides config)
    #[arg(long)]
    pub assets_dir: Option<PathBuf>,
}

impl BatchArgs {
    pub fn skip_existing(&self) -> bool {
        !self.overwrite
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse a story into scenes and generate an image for each
    GenerateMedia {
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Generate a video clip for each scene (billable unless --dry-run or --simulate)
    GenerateVideos {
        #[command(flatten)]
        batch: BatchArgs,

        /// No API calls and no cost; writes placeholder files
        #[arg(long)]
        dry_run: bool,

        /// Mock API calls with a delay; no cost
        #[arg(long)]
        simulate: bool,

        /// Maximum budget for video generation (USD)
        #[arg(long)]
        budget: Option<f64>,

        /// Use existing scene images as references
        #[arg(long)]
        use_images: bool,

        /// Skip the cost confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Generate images, then videos using those images as references
    GenerateAll {
        #[command(flatten)]
        batch: BatchArgs,

        /// Run the video step in dry-run mode
        #[arg(long)]
        dry_run_videos: bool,

        /// Maximum budget for video generation (USD)
        #[arg(long)]
        budget: Option<f64>,

        /// Skip the cost confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Exercise the pipeline with a built-in sample story
    Test,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create default config file
    Init,
}

/// `--dry-run` wins over `--simulate`; neither means live.
pub fn generation_mode(dry_run: bool, simulate: bool) -> GenerationMode {
    if dry_run {
        GenerationMode::DryRun
    } else if simulate {
        GenerationMode::Simulate
    } else {
        GenerationMode::Live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_media_defaults() {
        let args = Args::parse_from(["storyreel", "generate-media", "story.txt"]);
        assert!(!args.verbose);
        assert!(args.config.is_none());
        match args.command {
            Command::GenerateMedia { batch } => {
                assert_eq!(batch.script, PathBuf::from("story.txt"));
                assert!(batch.skip_existing());
                assert!(batch.max_scenes.is_none());
                assert!(batch.assets_dir.is_none());
            }
            _ => panic!("Expected GenerateMedia subcommand"),
        }
    }

    #[test]
    fn test_generate_videos_flags() {
        let args = Args::parse_from([
            "storyreel",
            "generate-videos",
            "story.txt",
            "--dry-run",
            "--budget",
            "12.5",
            "--use-images",
            "--overwrite",
            "--max-scenes",
            "3",
            "-v",
        ]);
        assert!(args.verbose);
        match args.command {
            Command::GenerateVideos {
                batch,
                dry_run,
                simulate,
                budget,
                use_images,
                yes,
            } => {
                assert!(dry_run);
                assert!(!simulate);
                assert_eq!(budget, Some(12.5));
                assert!(use_images);
                assert!(!yes);
                assert!(!batch.skip_existing());
                assert_eq!(batch.max_scenes, Some(3));
            }
            _ => panic!("Expected GenerateVideos subcommand"),
        }
    }

    #[test]
    fn test_generate_all_flags() {
        let args = Args::parse_from([
            "storyreel",
            "--config",
            "/tmp/c.toml",
            "generate-all",
            "story.txt",
            "--dry-run-videos",
            "--assets-dir",
            "out",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/c.toml")));
        match args.command {
            Command::GenerateAll {
                batch,
                dry_run_videos,
                budget,
                ..
            } => {
                assert!(dry_run_videos);
                assert!(budget.is_none());
                assert_eq!(batch.assets_dir, Some(PathBuf::from("out")));
            }
            _ => panic!("Expected GenerateAll subcommand"),
        }
    }

    #[test]
    fn test_config_subcommands() {
        let args = Args::parse_from(["storyreel", "config", "show"]);
        assert!(matches!(
            args.command,
            Command::Config {
                action: ConfigAction::Show
            }
        ));
        let args = Args::parse_from(["storyreel", "config", "init"]);
        assert!(matches!(
            args.command,
            Command::Config {
                action: ConfigAction::Init
            }
        ));
    }

    #[test]
    fn test_missing_script_is_rejected() {
        assert!(Args::try_parse_from(["storyreel", "generate-media"]).is_err());
    }

    #[test]
    fn test_generation_mode() {
        assert_eq!(generation_mode(false, false), GenerationMode::Live);
        assert_eq!(generation_mode(false, true), GenerationMode::Simulate);
        assert_eq!(generation_mode(true, false), GenerationMode::DryRun);
        assert_eq!(generation_mode(true, true), GenerationMode::DryRun);
    }
}
