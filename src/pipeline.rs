//! Batch pipeline: story file → scenes → per-scene images and clips.
//!
//! The runners here process scenes strictly in order and never abort on a
//! single scene's failure. The video runner stops early only when the session
//! budget runs out.

mod report;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use report::{BatchReport, SceneOutcome};

use crate::assets::{asset_path, check_existing_assets, AssetKind};
use crate::image::ImageGenerator;
use crate::scene::{Scene, SceneParser};
use crate::video::{VideoGenerationError, VideoGenerator};

/// Errors that end a pipeline run before any scene is processed.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Story file not found: {0}")]
    StoryNotFound(PathBuf),

    #[error("Could not decode file as UTF-8: {0}")]
    InvalidEncoding(PathBuf),

    #[error("Story file is empty: {0}")]
    EmptyStory(PathBuf),

    #[error("Failed to read story file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No scenes could be parsed from the story: {0}")]
    NoScenes(String),

    #[error(transparent)]
    Video(#[from] VideoGenerationError),
}

/// Read a story script as UTF-8 and trim it.
pub fn load_story(path: &Path) -> Result<String, PipelineError> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PipelineError::StoryNotFound(path.to_path_buf()),
        _ => PipelineError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    let text =
        String::from_utf8(bytes).map_err(|_| PipelineError::InvalidEncoding(path.to_path_buf()))?;

    let story = text.trim();
    if story.is_empty() {
        return Err(PipelineError::EmptyStory(path.to_path_buf()));
    }
    log::info!("Loaded story from {} ({} characters)", path.display(), story.chars().count());
    Ok(story.to_string())
}

/// Parse `story` into scenes, failing when nothing usable comes back.
pub async fn parse_story(parser: &SceneParser, story: &str) -> Result<Vec<Scene>, PipelineError> {
    let result = parser.parse_scenes_with_metadata(story).await;
    if result.scenes.is_empty() {
        let reason = result
            .error_message
            .unwrap_or_else(|| "no scenes returned".to_string());
        return Err(PipelineError::NoScenes(reason));
    }
    Ok(result.scenes)
}

/// Keep the first `max` scenes. `None` or zero means no limit.
pub fn limit_scenes(mut scenes: Vec<Scene>, max: Option<usize>) -> Vec<Scene> {
    if let Some(max) = max.filter(|&m| m > 0) {
        if scenes.len() > max {
            log::info!("Limited to first {} scenes (total: {})", max, scenes.len());
            scenes.truncate(max);
        }
    }
    scenes
}

/// Existing scene images in `dir`, by scene id, for use as video references.
pub fn existing_reference_images(dir: &Path, scenes: &[Scene]) -> BTreeMap<u32, PathBuf> {
    check_existing_assets(dir, scenes, AssetKind::Image)
        .into_iter()
        .filter(|(_, exists)| *exists)
        .map(|(id, _)| (id, asset_path(dir, AssetKind::Image, id)))
        .collect()
}

/// Generate an image per scene.
///
/// With `skip_existing`, scenes whose image is already on disk are skipped.
pub async fn run_image_batch(
    generator: &ImageGenerator,
    scenes: &[Scene],
    skip_existing: bool,
) -> BatchReport {
    let existing = if skip_existing {
        check_existing_assets(&generator.config().output_dir, scenes, AssetKind::Image)
    } else {
        BTreeMap::new()
    };
    let pause = generator.config().batch_pause;

    let mut report = BatchReport::new(AssetKind::Image);
    let mut requested = false;

    for scene in scenes {
        if existing.get(&scene.id).copied().unwrap_or(false) {
            log::info!("Scene {}: \"{}\" skipped (already exists)", scene.id, scene.title);
            report.push(scene, SceneOutcome::Skipped);
            continue;
        }

        if requested {
            pause_between_requests(pause).await;
        }
        requested = true;

        let outcome = match generator.try_generate_scene_image(scene).await {
            Ok(path) => {
                log::info!("Scene {}: \"{}\" image saved", scene.id, scene.title);
                SceneOutcome::Generated(path)
            }
            Err(e) => {
                log::error!("Scene {}: \"{}\" generation failed: {}", scene.id, scene.title, e);
                SceneOutcome::Failed(e.to_string())
            }
        };
        report.push(scene, outcome);
    }

    report
}

/// Generate a clip per scene, optionally using reference images.
///
/// Stops at the first budget rejection, or as soon as the remaining budget
/// reaches zero; scenes after that point are reported as not attempted.
pub async fn run_video_batch(
    generator: &mut VideoGenerator,
    scenes: &[Scene],
    skip_existing: bool,
    references: &BTreeMap<u32, PathBuf>,
) -> BatchReport {
    let existing = if skip_existing {
        check_existing_assets(&generator.config().output_dir, scenes, AssetKind::Video)
    } else {
        BTreeMap::new()
    };

    let mut report = BatchReport::new(AssetKind::Video);
    let mut remaining = scenes.iter();

    for scene in remaining.by_ref() {
        if existing.get(&scene.id).copied().unwrap_or(false) {
            log::info!("Scene {}: \"{}\" skipped (already exists)", scene.id, scene.title);
            report.push(scene, SceneOutcome::Skipped);
            continue;
        }

        if generator.budget_remaining() <= 0.0 {
            log::warn!(
                "Budget exhausted after {} videos",
                generator.session_summary().videos_generated
            );
            report.push(scene, SceneOutcome::NotAttempted);
            break;
        }

        let reference = references.get(&scene.id).map(PathBuf::as_path);
        match generator.try_generate_scene_video(scene, reference).await {
            Ok(path) => {
                log::info!("Scene {}: \"{}\" video saved", scene.id, scene.title);
                report.push(scene, SceneOutcome::Generated(path));
            }
            Err(VideoGenerationError::BudgetExceeded(e)) => {
                log::error!("Budget exceeded for scene {}: {}", scene.id, e);
                report.push(scene, SceneOutcome::Failed(e.to_string()));
                break;
            }
            Err(e) => {
                log::error!("Scene {}: \"{}\" generation failed: {}", scene.id, scene.title, e);
                report.push(scene, SceneOutcome::Failed(e.to_string()));
            }
        }
    }

    for scene in remaining {
        report.push(scene, SceneOutcome::NotAttempted);
    }
    report
}

async fn pause_between_requests(pause: Duration) {
    if !pause.is_zero() {
        tokio::time::sleep(pause).await;
    }
}
