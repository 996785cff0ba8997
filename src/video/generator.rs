//! VideoGenerator - the per-session generation controller.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::assets::{asset_path, AssetKind};
use crate::config::VideoConfig;
use crate::fal::{encode_reference_image, FalClient, FalError, GeneratedVideo, VideoRequest};
use crate::retry::RetryPolicy;
use crate::scene::Scene;

use super::budget::{BudgetExceeded, BudgetLedger};
use super::cache::GenerationCache;
use super::fingerprint::fingerprint;
use super::prompt::build_video_prompt;

/// Placeholder location returned in dry-run mode.
pub const DRY_RUN_VIDEO_URL: &str = "https://example.com/mock_video.mp4";

/// Placeholder location returned in simulate mode.
pub const SIMULATED_VIDEO_URL: &str = "https://example.com/simulated_video.mp4";

/// How requests are fulfilled. Fixed for the life of a generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Real, billable fal.ai calls.
    Live,
    /// No network; a fixed delay stands in for latency.
    Simulate,
    /// No network, no delay.
    DryRun,
}

impl GenerationMode {
    pub fn label(&self) -> &'static str {
        match self {
            GenerationMode::Live => "PRODUCTION",
            GenerationMode::Simulate => "SIMULATE",
            GenerationMode::DryRun => "DRY RUN",
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, GenerationMode::Live)
    }
}

/// One successfully produced clip. Appended once, never changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRecord {
    pub scene_id: u32,
    pub path: PathBuf,
    pub cost: f64,
    #[serde(serialize_with = "crate::config::ser_secs")]
    pub generation_time: Duration,
    pub prompt_hash: String,
}

/// Read-only snapshot of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub videos_generated: usize,
    pub total_cost: f64,
    pub budget_limit: f64,
    pub budget_remaining: f64,
    pub videos: Vec<GenerationRecord>,
    pub mode: GenerationMode,
    pub dry_run: bool,
    pub simulate: bool,
}

/// Errors from a single scene's generation.
///
/// `MissingCredential` and `BudgetExceeded` are the expected, typed failures;
/// the rest mean "no clip for this scene" and never end a session.
#[derive(Debug, thiserror::Error)]
pub enum VideoGenerationError {
    #[error("FAL_KEY not found in environment variables")]
    MissingCredential,

    #[error(transparent)]
    BudgetExceeded(#[from] BudgetExceeded),

    #[error("failed to initialize fal.ai client: {0}")]
    Client(#[source] FalError),

    #[error("video request failed: {0}")]
    RequestFailed(#[source] FalError),

    #[error("video download failed: {0}")]
    DownloadFailed(#[source] FalError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

enum Backend {
    Live(FalClient),
    Simulate,
    DryRun,
}

/// Generates scene clips while enforcing a session budget.
///
/// Owns all session state (spend, records, cache); two generators never share
/// any of it. Scenes are processed one at a time through `&mut self`, so the
/// budget check and the charge that follows cannot interleave.
pub struct VideoGenerator {
    backend: Backend,
    config: VideoConfig,
    ledger: BudgetLedger,
    cache: GenerationCache,
    records: Vec<GenerationRecord>,
}

impl VideoGenerator {
    /// Create a generator for `mode`.
    ///
    /// Live mode reads `FAL_KEY` and fails with `MissingCredential` when it is
    /// absent. Simulate and dry-run never look at the environment.
    pub fn new(mode: GenerationMode, config: VideoConfig) -> Result<Self, VideoGenerationError> {
        match mode {
            GenerationMode::Live => {
                let api_key = std::env::var(crate::fal::FAL_KEY_ENV)
                    .map_err(|_| VideoGenerationError::MissingCredential)?;
                Self::live(config, api_key)
            }
            GenerationMode::Simulate => {
                log::info!("Running in test mode - skipping fal client initialization");
                Self::build(Backend::Simulate, config)
            }
            GenerationMode::DryRun => {
                log::info!("Running in test mode - skipping fal client initialization");
                Self::build(Backend::DryRun, config)
            }
        }
    }

    /// Create a live generator with an explicit API key.
    pub fn live(config: VideoConfig, api_key: String) -> Result<Self, VideoGenerationError> {
        let client = FalClient::with_config(api_key, &config).map_err(|e| match e {
            FalError::MissingApiKey => VideoGenerationError::MissingCredential,
            other => VideoGenerationError::Client(other),
        })?;
        log::info!("Fal client initialized successfully");
        Self::build(Backend::Live(client), config)
    }

    fn build(backend: Backend, config: VideoConfig) -> Result<Self, VideoGenerationError> {
        std::fs::create_dir_all(&config.output_dir)?;
        Ok(Self {
            backend,
            ledger: BudgetLedger::new(config.budget_limit),
            cache: GenerationCache::new(config.cache_ttl),
            records: Vec::new(),
            config,
        })
    }

    pub fn mode(&self) -> GenerationMode {
        match self.backend {
            Backend::Live(_) => GenerationMode::Live,
            Backend::Simulate => GenerationMode::Simulate,
            Backend::DryRun => GenerationMode::DryRun,
        }
    }

    pub fn config(&self) -> &VideoConfig {
        &self.config
    }

    /// Where the clip for `scene_id` is written. Reprocessing a scene id
    /// overwrites the same file.
    pub fn output_path(&self, scene_id: u32) -> PathBuf {
        asset_path(&self.config.output_dir, AssetKind::Video, scene_id)
    }

    pub fn budget_remaining(&self) -> f64 {
        self.ledger.remaining()
    }

    /// Number of distinct prompts cached this session.
    pub fn cached_prompts(&self) -> usize {
        self.cache.len()
    }

    /// Generate a clip for `scene`, or `None` if anything went wrong.
    ///
    /// Every failure is logged with its reason; none propagates.
    pub async fn generate_scene_video(
        &mut self,
        scene: &Scene,
        reference_image: Option<&Path>,
    ) -> Option<PathBuf> {
        match self.try_generate_scene_video(scene, reference_image).await {
            Ok(path) => Some(path),
            Err(VideoGenerationError::BudgetExceeded(e)) => {
                log::error!("Budget exceeded for scene {}: {}", scene.id, e);
                None
            }
            Err(e) => {
                log::error!("Failed to generate video for scene {}: {}", scene.id, e);
                None
            }
        }
    }

    /// Generate a clip for `scene`, returning the typed failure.
    pub async fn try_generate_scene_video(
        &mut self,
        scene: &Scene,
        reference_image: Option<&Path>,
    ) -> Result<PathBuf, VideoGenerationError> {
        let prompt = build_video_prompt(scene, reference_image);
        log::info!(
            "Generated prompt for scene {}: {}...",
            scene.id,
            prompt.chars().take(100).collect::<String>()
        );
        let prompt_hash = fingerprint(&prompt);

        if let Some(cached) = self.cache.lookup(&prompt_hash) {
            log::info!("Using cached video for scene {}", scene.id);
            return Ok(cached.to_path_buf());
        }

        let estimated_cost = self.config.estimated_clip_cost();
        self.ledger.check(estimated_cost)?;

        let output_path = self.output_path(scene.id);
        let start = Instant::now();

        let mut request = VideoRequest::from_config(&prompt, &self.config);
        if let Some(image) = reference_image {
            request.image_url = self.reference_image_url(image);
        }

        let generated = self.request_video(&request).await?;
        self.materialize(scene, &generated, &output_path).await?;

        let generation_time = start.elapsed();
        // No metering exists, so the estimate is the charge.
        let actual_cost = estimated_cost;

        self.ledger.commit(actual_cost);
        self.records.push(GenerationRecord {
            scene_id: scene.id,
            path: output_path.clone(),
            cost: actual_cost,
            generation_time,
            prompt_hash: prompt_hash.clone(),
        });
        self.cache.store(prompt_hash, output_path.clone());

        log::info!(
            "Video generated for scene {}: {} (${:.2}, {:.1}s)",
            scene.id,
            output_path.display(),
            actual_cost,
            generation_time.as_secs_f64()
        );

        Ok(output_path)
    }

    /// Resolve a reference image for the request. Only live mode uploads it.
    fn reference_image_url(&self, image: &Path) -> Option<String> {
        if !image.exists() {
            log::warn!("Reference image not found: {}", image.display());
            return None;
        }
        if !self.mode().is_live() {
            log::debug!("Reference image {} not sent outside live mode", image.display());
            return None;
        }
        match encode_reference_image(image) {
            Ok(uri) => {
                log::info!("Including reference image: {}", image.display());
                Some(uri)
            }
            Err(e) => {
                log::warn!("Could not read reference image {}: {}", image.display(), e);
                None
            }
        }
    }

    async fn request_video(
        &self,
        request: &VideoRequest,
    ) -> Result<GeneratedVideo, VideoGenerationError> {
        let synthetic = |url: &str| GeneratedVideo {
            video_url: url.to_string(),
            duration_secs: Some(f64::from(self.config.duration_secs)),
        };

        match &self.backend {
            Backend::DryRun => {
                log::info!("DRY RUN: Skipping actual API call");
                Ok(synthetic(DRY_RUN_VIDEO_URL))
            }
            Backend::Simulate => {
                log::info!("SIMULATE: Mocking API call with delay");
                tokio::time::sleep(self.config.simulate_delay).await;
                Ok(synthetic(SIMULATED_VIDEO_URL))
            }
            Backend::Live(client) => {
                let policy = RetryPolicy::new(self.config.max_retries, self.config.retry_delay);
                let generated = client
                    .generate_with_retry(request, &policy)
                    .await
                    .map_err(VideoGenerationError::RequestFailed)?;
                log::info!("Successfully received video from fal.ai");
                Ok(generated)
            }
        }
    }

    /// Put the clip at `output_path`: download it live, else write a marker.
    async fn materialize(
        &self,
        scene: &Scene,
        generated: &GeneratedVideo,
        output_path: &Path,
    ) -> Result<(), VideoGenerationError> {
        match &self.backend {
            Backend::Live(client) => {
                log::info!("Downloading video from {}", generated.video_url);
                client
                    .download_video(&generated.video_url, output_path)
                    .await
                    .map_err(VideoGenerationError::DownloadFailed)?;
                let size = tokio::fs::metadata(output_path).await?.len();
                log::info!("Video downloaded successfully: {} bytes", size);
            }
            Backend::Simulate | Backend::DryRun => {
                tokio::fs::create_dir_all(&self.config.output_dir).await?;
                tokio::fs::write(output_path, format!("Mock video for scene {}", scene.id))
                    .await?;
            }
        }
        Ok(())
    }

    /// Snapshot of spend, remaining budget, records and mode.
    pub fn session_summary(&self) -> SessionSummary {
        let mode = self.mode();
        SessionSummary {
            videos_generated: self.records.len(),
            total_cost: self.ledger.spent(),
            budget_limit: self.ledger.limit(),
            budget_remaining: self.ledger.remaining(),
            videos: self.records.clone(),
            mode,
            dry_run: mode == GenerationMode::DryRun,
            simulate: mode == GenerationMode::Simulate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir, budget_limit: f64) -> VideoConfig {
        VideoConfig {
            budget_limit,
            output_dir: dir.path().join("assets"),
            simulate_delay: Duration::from_millis(1),
            ..VideoConfig::default()
        }
    }

    fn scene(id: u32, title: &str) -> Scene {
        Scene {
            id,
            title: title.to_string(),
            characters: vec!["Lena".to_string()],
            setting: "Dark forest".to_string(),
            summary: "Lena walks".to_string(),
            tone: "mysterious".to_string(),
        }
    }

    #[test]
    fn test_construction_creates_output_dir() {
        let dir = TempDir::new().unwrap();
        let generator = VideoGenerator::new(GenerationMode::DryRun, config(&dir, 10.0)).unwrap();
        assert!(dir.path().join("assets").is_dir());
        assert_eq!(generator.mode(), GenerationMode::DryRun);
        assert_eq!(
            generator.output_path(7),
            dir.path().join("assets").join("scene_7.mp4")
        );
    }

    #[test]
    fn test_live_with_empty_key_is_missing_credential() {
        let dir = TempDir::new().unwrap();
        let result = VideoGenerator::live(config(&dir, 10.0), String::new());
        assert!(matches!(
            result,
            Err(VideoGenerationError::MissingCredential)
        ));
    }

    #[tokio::test]
    async fn test_dry_run_writes_marker_file() {
        let dir = TempDir::new().unwrap();
        let mut generator =
            VideoGenerator::new(GenerationMode::DryRun, config(&dir, 10.0)).unwrap();
        let path = generator
            .generate_scene_video(&scene(3, "Night"), None)
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Mock video for scene 3"
        );
    }

    #[tokio::test]
    async fn test_budget_exhausts_after_two_clips() {
        let dir = TempDir::new().unwrap();
        let mut generator =
            VideoGenerator::new(GenerationMode::DryRun, config(&dir, 10.0)).unwrap();

        assert!(generator.generate_scene_video(&scene(1, "One"), None).await.is_some());
        assert!(generator.generate_scene_video(&scene(2, "Two"), None).await.is_some());
        let third = generator
            .try_generate_scene_video(&scene(3, "Three"), None)
            .await;
        assert!(matches!(
            third,
            Err(VideoGenerationError::BudgetExceeded(BudgetExceeded { projected, limit }))
                if projected == 15.0 && limit == 10.0
        ));

        let summary = generator.session_summary();
        assert_eq!(summary.total_cost, 10.0);
        assert_eq!(summary.budget_remaining, 0.0);
        assert_eq!(summary.videos_generated, 2);
    }

    #[tokio::test]
    async fn test_cache_hit_charges_nothing() {
        let dir = TempDir::new().unwrap();
        let mut generator =
            VideoGenerator::new(GenerationMode::DryRun, config(&dir, 50.0)).unwrap();
        let s = scene(1, "Repeat");

        let first = generator.generate_scene_video(&s, None).await.unwrap();
        let second = generator.generate_scene_video(&s, None).await.unwrap();
        assert_eq!(first, second);

        let summary = generator.session_summary();
        assert_eq!(summary.videos_generated, 1);
        assert_eq!(summary.total_cost, 5.0);
    }

    #[tokio::test]
    async fn test_simulate_summary_flags() {
        let dir = TempDir::new().unwrap();
        let mut generator =
            VideoGenerator::new(GenerationMode::Simulate, config(&dir, 50.0)).unwrap();
        generator
            .generate_scene_video(&scene(1, "Sim"), None)
            .await
            .unwrap();

        let summary = generator.session_summary();
        assert!(summary.simulate);
        assert!(!summary.dry_run);
        assert_eq!(summary.mode, GenerationMode::Simulate);
        assert_eq!(summary.videos[0].prompt_hash.len(), 12);
    }

    #[tokio::test]
    async fn test_missing_reference_image_is_ignored() {
        let dir = TempDir::new().unwrap();
        let mut generator =
            VideoGenerator::new(GenerationMode::DryRun, config(&dir, 50.0)).unwrap();
        let path = generator
            .generate_scene_video(&scene(1, "Ref"), Some(Path::new("/no/such/image.png")))
            .await;
        assert!(path.is_some());
    }

    #[test]
    fn test_mode_labels() {
        assert_eq!(GenerationMode::Live.label(), "PRODUCTION");
        assert_eq!(GenerationMode::Simulate.label(), "SIMULATE");
        assert_eq!(GenerationMode::DryRun.label(), "DRY RUN");
    }

    #[tokio::test]
    async fn test_fractional_rate_fills_budget_exactly() {
        let dir = TempDir::new().unwrap();
        let config = VideoConfig {
            cost_per_second: 0.1,
            duration_secs: 1,
            ..config(&dir, 0.3)
        };
        let mut generator = VideoGenerator::new(GenerationMode::DryRun, config).unwrap();

        for id in 1..=3 {
            let title = format!("Beat {}", id);
            assert!(generator
                .try_generate_scene_video(&scene(id, &title), None)
                .await
                .is_ok());
        }
        let summary = generator.session_summary();
        assert_eq!(summary.videos_generated, 3);
        assert_eq!(summary.total_cost, 0.3);
        assert_eq!(summary.budget_remaining, 0.0);

        let fourth = generator
            .try_generate_scene_video(&scene(4, "Beat 4"), None)
            .await;
        assert!(matches!(
            fourth,
            Err(VideoGenerationError::BudgetExceeded(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulate_waits_and_dry_run_does_not() {
        let dir = TempDir::new().unwrap();
        let config = VideoConfig {
            simulate_delay: Duration::from_secs(10),
            ..config(&dir, 50.0)
        };

        let mut simulated =
            VideoGenerator::new(GenerationMode::Simulate, config.clone()).unwrap();
        let start = tokio::time::Instant::now();
        simulated
            .try_generate_scene_video(&scene(1, "Slow"), None)
            .await
            .unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(10));

        let mut dry = VideoGenerator::new(GenerationMode::DryRun, config).unwrap();
        let start = tokio::time::Instant::now();
        dry.try_generate_scene_video(&scene(2, "Fast"), None)
            .await
            .unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
