use clap::Parser;

use storyreel::cli::{self, generation_mode, Args, Command, RunStatus, VideoRunOptions};
use storyreel::pipeline::PipelineError;
use storyreel::video::GenerationMode;

/// Load .env file
///
/// Loads environment variables (OPENAI_API_KEY, FAL_KEY, RUST_LOG) from a
/// .env file in the working directory. Does not override existing variables.
fn load_env() {
    // dotenv::dotenv() returns Err if .env doesn't exist, which is fine
    let _ = dotenv::dotenv();
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

fn main() {
    load_env();
    let args = Args::parse();
    init_logging(args.verbose);

    if let Command::Config { action } = &args.command {
        if let Err(e) = cli::handle_config_action(action.clone(), args.config.as_deref()) {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let config = match cli::load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: Failed to create async runtime: {}", e);
            std::process::exit(1);
        }
    };

    let verbose = args.verbose;
    let command = args.command;
    let result = rt.block_on(async move {
        match command {
            Command::GenerateMedia { batch } => cli::generate_media(&config, &batch, verbose).await,
            Command::GenerateVideos {
                batch,
                dry_run,
                simulate,
                budget,
                use_images,
                yes,
            } => {
                let options = VideoRunOptions {
                    mode: generation_mode(dry_run, simulate),
                    budget,
                    use_images,
                    assume_yes: yes,
                };
                cli::generate_videos(&config, &batch, options, verbose).await
            }
            Command::GenerateAll {
                batch,
                dry_run_videos,
                budget,
                yes,
            } => {
                let options = VideoRunOptions {
                    mode: if dry_run_videos {
                        GenerationMode::DryRun
                    } else {
                        GenerationMode::Live
                    },
                    budget,
                    use_images: false,
                    assume_yes: yes,
                };
                cli::generate_all(&config, &batch, options, verbose).await
            }
            Command::Test => cli::run_test(&config).await,
            Command::Config { .. } => Ok(RunStatus::Completed),
        }
    });

    match result {
        Ok(status) => std::process::exit(status.exit_code()),
        Err(e) => {
            eprintln!("Error: {}", e);
            if matches!(e, PipelineError::InvalidEncoding(_)) {
                eprintln!("Tip: Ensure your file is saved with UTF-8 encoding.");
            }
            std::process::exit(1);
        }
    }
}
