//! Subcommand handlers.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::Path;

use super::args::{BatchArgs, ConfigAction};
use crate::config::{default_path, Config, ConfigError, DEFAULT_CONFIG_TEMPLATE};
use crate::image::ImageGenerator;
use crate::pipeline::{
    existing_reference_images, limit_scenes, load_story, parse_story, run_image_batch,
    run_video_batch, BatchReport, PipelineError,
};
use crate::scene::{Scene, SceneParser};
use crate::video::{GenerationMode, SessionSummary, VideoGenerator};

/// Story used by `storyreel test`.
pub const SAMPLE_STORY: &str = "\
The ancient forest was eerily quiet as Detective Sarah Chen stepped through \
the undergrowth. Her flashlight cut through the darkness, revealing twisted \
branches that seemed to reach out like gnarled fingers.

Suddenly, a figure emerged from behind an ancient oak tree. The stranger \
wore a dark cloak and spoke in riddles about the path ahead. \"Not all who \
wander are lost,\" he said cryptically, \"but some are exactly where they \
need to be.\"

Sarah felt a chill run down her spine as the figure vanished into the mist. \
She knew this encounter would change everything about her investigation.";

/// Budget for the dry-run clip in `storyreel test`.
const TEST_BUDGET: f64 = 10.0;

/// How a command finished, mapped to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    CompletedWithFailures,
    Cancelled,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Completed | RunStatus::Cancelled => 0,
            RunStatus::CompletedWithFailures => 1,
        }
    }
}

/// Options for the video step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoRunOptions {
    pub mode: GenerationMode,
    pub budget: Option<f64>,
    pub use_images: bool,
    /// Skip the interactive cost confirmation.
    pub assume_yes: bool,
}

/// Load configuration.
///
/// An explicit path must exist and parse. Without one, the default file is
/// used when present; if it cannot be read or parsed, a warning is printed
/// and defaults are used.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    match explicit {
        Some(path) => Config::load_from(path),
        None => Ok(load_default_config(&default_path())),
    }
}

fn load_default_config(path: &Path) -> Config {
    match Config::load_or_default(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Failed to load config file: {}", e);
            eprintln!("Using default settings.\n");
            Config::default()
        }
    }
}

/// Ask a yes/no question on the terminal. Anything but y/yes is a no.
pub fn confirm(prompt: &str) -> bool {
    print!("{} [y/N]: ", prompt);
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn confirm_live_run(config: &Config, options: &VideoRunOptions) -> bool {
    if options.mode != GenerationMode::Live || options.assume_yes {
        return true;
    }
    let video = config.video();
    println!(
        "WARNING: Video generation incurs real costs (~${:.2} per {}s clip)",
        video.estimated_clip_cost(),
        video.duration_secs
    );
    println!(
        "Budget limit: ${:.2}",
        options.budget.unwrap_or(video.budget_limit)
    );
    confirm("Continue with video generation?")
}

fn with_batch_overrides(config: &Config, batch: &BatchArgs) -> Config {
    match &batch.assets_dir {
        Some(dir) => config.clone().with_assets_dir(dir.clone()),
        None => config.clone(),
    }
}

async fn load_scenes(
    config: &Config,
    batch: &BatchArgs,
    verbose: bool,
) -> Result<Vec<Scene>, PipelineError> {
    let is_txt = batch
        .script
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("txt"))
        .unwrap_or(false);
    if !is_txt {
        println!(
            "Warning: File doesn't have .txt extension: {}",
            batch.script.display()
        );
    }

    println!("Loading story from: {}", batch.script.display());
    let story = load_story(&batch.script)?;

    println!("Parsing scenes with {}...", config.parser.model);
    let parser = SceneParser::new(config.parser());
    let scenes = limit_scenes(parse_story(&parser, &story).await?, batch.max_scenes);
    println!("Parsed {} scenes successfully", scenes.len());

    if verbose {
        for scene in &scenes {
            println!("  Scene {}: {}", scene.id, scene.title);
        }
    }
    Ok(scenes)
}

fn print_statistics(report: &BatchReport, verbose: bool) {
    println!();
    print!("{}", report.render_table(verbose));
    println!();
    println!("Statistics:");
    println!("  Total scenes: {}", report.total());
    println!("  Generated: {}", report.generated());
    if report.skipped() > 0 {
        println!("  Skipped: {}", report.skipped());
    }
    if report.failed() > 0 {
        println!("  Failed: {}", report.failed());
    }
    if report.not_attempted() > 0 {
        println!("  Not attempted: {}", report.not_attempted());
    }
}

fn print_cost_summary(summary: &SessionSummary) {
    println!();
    println!("Cost Summary ({} mode):", summary.mode.label());
    println!("  Total cost: ${:.2}", summary.total_cost);
    println!("  Budget remaining: ${:.2}", summary.budget_remaining);
    if !summary.videos.is_empty() {
        println!(
            "  Average per video: ${:.2}",
            summary.total_cost / summary.videos.len() as f64
        );
    }
}

fn build_video_generator(
    config: &Config,
    options: &VideoRunOptions,
) -> Result<VideoGenerator, PipelineError> {
    let mut video = config.video();
    if let Some(budget) = options.budget {
        video.budget_limit = budget;
    }
    Ok(VideoGenerator::new(options.mode, video)?)
}

/// `storyreel generate-media`
pub async fn generate_media(
    config: &Config,
    batch: &BatchArgs,
    verbose: bool,
) -> Result<RunStatus, PipelineError> {
    let config = with_batch_overrides(config, batch);
    let scenes = load_scenes(&config, batch, verbose).await?;

    println!("Generating images with {}...", config.image.model);
    let generator = ImageGenerator::new(config.image());
    let report = run_image_batch(&generator, &scenes, batch.skip_existing()).await;

    print_statistics(&report, verbose);
    println!();
    println!("Assets saved to: {}", config.output.assets_dir.display());

    if report.has_failures() {
        println!();
        println!("Tip: Check your OpenAI API key and rate limits if generations failed.");
        return Ok(RunStatus::CompletedWithFailures);
    }
    Ok(RunStatus::Completed)
}

/// `storyreel generate-videos`
pub async fn generate_videos(
    config: &Config,
    batch: &BatchArgs,
    options: VideoRunOptions,
    verbose: bool,
) -> Result<RunStatus, PipelineError> {
    let config = with_batch_overrides(config, batch);
    if !confirm_live_run(&config, &options) {
        println!("Operation cancelled by user");
        return Ok(RunStatus::Cancelled);
    }

    let scenes = load_scenes(&config, batch, verbose).await?;

    let references = if options.use_images {
        let found = existing_reference_images(&config.output.assets_dir, &scenes);
        println!("Found {} existing images to use as references", found.len());
        found
    } else {
        BTreeMap::new()
    };

    let mut generator = build_video_generator(&config, &options)?;
    println!(
        "Generating videos with {} ({} mode)...",
        config.video.model,
        options.mode.label()
    );
    let report =
        run_video_batch(&mut generator, &scenes, batch.skip_existing(), &references).await;
    let summary = generator.session_summary();

    print_statistics(&report, verbose);
    if options.mode != GenerationMode::DryRun {
        print_cost_summary(&summary);
    }
    println!();
    println!("Videos saved to: {}", config.output.assets_dir.display());

    if report.has_failures() {
        println!();
        println!("Tip: Check your FAL_KEY and rate limits if generations failed.");
        if options.mode.is_live() {
            return Ok(RunStatus::CompletedWithFailures);
        }
    }
    Ok(RunStatus::Completed)
}

/// `storyreel generate-all`: images first, then clips seeded from them.
pub async fn generate_all(
    config: &Config,
    batch: &BatchArgs,
    options: VideoRunOptions,
    verbose: bool,
) -> Result<RunStatus, PipelineError> {
    let config = with_batch_overrides(config, batch);
    println!("Starting complete story-to-video pipeline");

    let scenes = load_scenes(&config, batch, verbose).await?;

    println!();
    println!("Step 1: Generating {} scene images...", scenes.len());
    let images = ImageGenerator::new(config.image());
    let image_report = run_image_batch(&images, &scenes, batch.skip_existing()).await;
    println!(
        "Images complete: {}/{} generated",
        image_report.generated(),
        scenes.len()
    );
    if verbose {
        print!("{}", image_report.render_table(true));
    }

    println!();
    println!("Step 2: Generating scene videos...");
    if !confirm_live_run(&config, &options) {
        println!("Skipping video generation");
        return Ok(RunStatus::Cancelled);
    }

    let references = image_report.generated_paths();
    let mut generator = build_video_generator(&config, &options)?;
    let video_report =
        run_video_batch(&mut generator, &scenes, batch.skip_existing(), &references).await;
    let summary = generator.session_summary();

    println!();
    println!("Complete Pipeline Finished!");
    println!("Final Results:");
    println!("  Total scenes: {}", scenes.len());
    println!("  Images generated: {}", image_report.generated());
    println!("  Videos generated: {}", video_report.generated());
    if options.mode != GenerationMode::DryRun {
        println!("  Total video cost: ${:.2}", summary.total_cost);
    }
    if verbose {
        print!("{}", video_report.render_table(true));
    }
    println!();
    println!("All assets saved to: {}", config.output.assets_dir.display());

    let video_failures = video_report.has_failures() && options.mode.is_live();
    if image_report.has_failures() || video_failures {
        return Ok(RunStatus::CompletedWithFailures);
    }
    Ok(RunStatus::Completed)
}

fn mock_scene() -> Scene {
    Scene {
        id: 1,
        title: "Test Scene".to_string(),
        characters: vec!["Test Character".to_string()],
        setting: "Test setting for demonstration".to_string(),
        summary: "This is a test scene for pipeline validation".to_string(),
        tone: "test, demonstration".to_string(),
    }
}

/// `storyreel test`: parse the sample story and dry-run one clip.
pub async fn run_test(config: &Config) -> Result<RunStatus, PipelineError> {
    println!("Testing story-to-video pipeline");
    println!("Using sample story for testing...");

    let parser = SceneParser::new(config.parser());
    let mut scenes = parser.parse_scenes(SAMPLE_STORY).await;
    if scenes.is_empty() {
        println!("Scene parsing returned empty results (API key needed)");
        println!("Testing video generation with mock scene...");
        scenes.push(mock_scene());
    } else {
        println!("Successfully parsed {} scenes", scenes.len());
        for scene in &scenes {
            println!("  Scene {}: {}", scene.id, scene.title);
        }
    }

    let mut video = config.video();
    video.budget_limit = TEST_BUDGET;
    let mut generator = VideoGenerator::new(GenerationMode::DryRun, video)?;

    println!();
    println!("Testing video generation (dry run mode)...");
    let path = generator.generate_scene_video(&scenes[0], None).await;
    let summary = generator.session_summary();

    println!();
    println!("Video Generation Test Summary:");
    println!("  Videos generated: {}", summary.videos_generated);
    println!("  Mock total cost: ${:.2}", summary.total_cost);
    println!("  Budget remaining: ${:.2}", summary.budget_remaining);

    match path {
        Some(path) => println!("Mock video generation successful: {}", path.display()),
        None => {
            println!("Mock video generation failed");
            return Ok(RunStatus::CompletedWithFailures);
        }
    }

    println!();
    println!("Pipeline test complete!");
    Ok(RunStatus::Completed)
}

/// Handle config subcommand actions.
pub fn handle_config_action(action: ConfigAction, explicit: Option<&Path>) -> Result<(), String> {
    let config_path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(default_path);

    match action {
        ConfigAction::Show => {
            let config = load_config(explicit).map_err(|e| e.to_string())?;
            let rendered = toml::to_string_pretty(&config)
                .map_err(|e| format!("Failed to render configuration: {}", e))?;

            println!("Current configuration:");
            println!();
            println!("{}", rendered.trim_end());
            println!();
            if config_path.exists() {
                println!("Config file: {} (exists)", config_path.display());
            } else {
                println!("Config file: {} (not found)", config_path.display());
            }
            Ok(())
        }
        ConfigAction::Init => {
            if config_path.exists() {
                return Err(format!(
                    "Config file already exists: {}\n\
                     Use 'storyreel config show' to view current settings.",
                    config_path.display()
                ));
            }

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("Error creating config directory: {}", e))?;
            }
            std::fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)
                .map_err(|e| format!("Error writing config file: {}", e))?;

            println!("Created config file: {}", config_path.display());
            Ok(())
        }
    }
}
