use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::assets::{asset_path, AssetKind};
use crate::config::ImageConfig;
use crate::openai::{OpenAiClient, OpenAiError};
use crate::retry::{retry_async, RetryDecision, RetryPolicy};
use crate::scene::Scene;

use super::prompt::build_image_prompt;

#[derive(Debug, thiserror::Error)]
pub enum ImageGenerationError {
    #[error("OpenAI API key not configured")]
    MissingCredential,

    #[error("image generation failed after {attempts} attempt(s): {source}")]
    Failed {
        attempts: u32,
        #[source]
        source: OpenAiError,
    },
}

/// Generates one still per scene and saves it as `scene_<id>.png`.
pub struct ImageGenerator {
    client: Option<OpenAiClient>,
    config: ImageConfig,
}

impl ImageGenerator {
    /// Create a generator from `OPENAI_API_KEY`. Without a key every
    /// generation fails with `MissingCredential`.
    pub fn new(config: ImageConfig) -> Self {
        let client = match OpenAiClient::from_env(&config.base_url) {
            Ok(client) => Some(client),
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        };
        Self::with_client(client, config)
    }

    pub fn with_client(client: Option<OpenAiClient>, config: ImageConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    pub fn output_path(&self, scene_id: u32) -> PathBuf {
        asset_path(&self.config.output_dir, AssetKind::Image, scene_id)
    }

    /// Generate and save the image for `scene`, or `None` on any failure.
    pub async fn generate_scene_image(&self, scene: &Scene) -> Option<PathBuf> {
        match self.try_generate_scene_image(scene).await {
            Ok(path) => Some(path),
            Err(e) => {
                log::error!("Failed to generate image for scene {}: {}", scene.id, e);
                None
            }
        }
    }

    /// Generate and save the image for `scene`.
    ///
    /// Request and download are retried together. Content policy rejections
    /// are final; rate limits wait `rate_limit_delay`; anything else retries
    /// straight away.
    pub async fn try_generate_scene_image(
        &self,
        scene: &Scene,
    ) -> Result<PathBuf, ImageGenerationError> {
        let client = self
            .client
            .as_ref()
            .ok_or(ImageGenerationError::MissingCredential)?;

        let prompt = build_image_prompt(scene);
        log::info!(
            "Generated prompt for scene {}: {}...",
            scene.id,
            prompt.chars().take(100).collect::<String>()
        );

        let path = self.output_path(scene.id);
        let config = &self.config;
        let prompt = prompt.as_str();
        let dest = path.as_path();
        let rate_limit_delay = config.rate_limit_delay;

        let policy = RetryPolicy::new(config.max_retries, Duration::ZERO);
        let label = format!("Generating image for scene {}", scene.id);
        retry_async(
            &policy,
            &label,
            move |_| async move {
                let url = client
                    .generate_image(&config.model, prompt, &config.size, &config.quality)
                    .await?;
                log::info!("Image generated successfully: {}", url);
                let bytes = client.download(&url, dest).await?;
                log::info!("Image saved to {} ({} bytes)", dest.display(), bytes);
                Ok::<_, OpenAiError>(())
            },
            |e: &OpenAiError| match e {
                OpenAiError::ContentPolicyViolation { .. } => RetryDecision::Abort,
                OpenAiError::RateLimit { .. } => RetryDecision::RetryAfter(rate_limit_delay),
                _ => RetryDecision::RetryAfter(Duration::ZERO),
            },
        )
        .await
        .map_err(|e| ImageGenerationError::Failed {
            attempts: e.attempts,
            source: e.last,
        })?;

        Ok(path)
    }

    /// Generate images one scene at a time, pausing between requests.
    pub async fn generate_batch_images(&self, scenes: &[Scene]) -> BTreeMap<u32, Option<PathBuf>> {
        log::info!("Starting batch image generation for {} scenes", scenes.len());
        let mut results = BTreeMap::new();

        for (i, scene) in scenes.iter().enumerate() {
            log::info!("Processing scene {}/{}: {}", i + 1, scenes.len(), scene.title);
            let path = self.generate_scene_image(scene).await;
            match &path {
                Some(p) => log::info!("Scene {} image generated: {}", scene.id, p.display()),
                None => log::error!("Failed to generate image for scene {}", scene.id),
            }
            results.insert(scene.id, path);

            if i + 1 < scenes.len() && !self.config.batch_pause.is_zero() {
                tokio::time::sleep(self.config.batch_pause).await;
            }
        }

        let ok = results.values().filter(|p| p.is_some()).count();
        log::info!("Batch generation complete: {}/{} successful", ok, scenes.len());
        results
    }

    /// Delete previously generated images for `scene_ids`. Missing files are
    /// ignored; failures are logged.
    pub fn cleanup_generated_images(&self, scene_ids: &[u32]) {
        for &id in scene_ids {
            let path = self.output_path(id);
            if !path.exists() {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => log::info!("Cleaned up image for scene {}", id),
                Err(e) => log::error!("Failed to clean up image for scene {}: {}", id, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> ImageConfig {
        ImageConfig {
            output_dir: dir.path().to_path_buf(),
            batch_pause: Duration::ZERO,
            ..ImageConfig::default()
        }
    }

    fn scene(id: u32) -> Scene {
        Scene {
            id,
            title: "Test".to_string(),
            characters: vec![],
            setting: "Lab".to_string(),
            summary: "Testing".to_string(),
            tone: "tense".to_string(),
        }
    }

    #[tokio::test]
    async fn test_without_client_fails_with_missing_credential() {
        let dir = TempDir::new().unwrap();
        let generator = ImageGenerator::with_client(None, config(&dir));
        let err = generator.try_generate_scene_image(&scene(1)).await.unwrap_err();
        assert!(matches!(err, ImageGenerationError::MissingCredential));
        assert!(generator.generate_scene_image(&scene(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_batch_without_client_maps_every_scene_to_none() {
        let dir = TempDir::new().unwrap();
        let generator = ImageGenerator::with_client(None, config(&dir));
        let results = generator.generate_batch_images(&[scene(1), scene(2)]).await;
        assert_eq!(results.len(), 2);
        assert!(results.values().all(|p| p.is_none()));
    }

    #[test]
    fn test_cleanup_removes_only_listed_images() {
        let dir = TempDir::new().unwrap();
        let generator = ImageGenerator::with_client(None, config(&dir));
        std::fs::write(generator.output_path(1), b"png").unwrap();
        std::fs::write(generator.output_path(2), b"png").unwrap();

        generator.cleanup_generated_images(&[1, 3]);

        assert!(!generator.output_path(1).exists());
        assert!(generator.output_path(2).exists());
    }
}
