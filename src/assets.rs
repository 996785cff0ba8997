//! Scene asset naming and discovery.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::scene::Scene;

/// Kind of per-scene artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Image,
    Video,
}

impl AssetKind {
    pub fn extension(&self) -> &'static str {
        match self {
            AssetKind::Image => "png",
            AssetKind::Video => "mp4",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Video => "video",
        }
    }
}

/// `<dir>/scene_<id>.<ext>`
pub fn asset_path(dir: &Path, kind: AssetKind, scene_id: u32) -> PathBuf {
    dir.join(format!("scene_{}.{}", scene_id, kind.extension()))
}

/// Which scenes already have an artifact of `kind` on disk.
pub fn check_existing_assets(dir: &Path, scenes: &[Scene], kind: AssetKind) -> BTreeMap<u32, bool> {
    scenes
        .iter()
        .map(|scene| {
            let exists = asset_path(dir, kind, scene.id).exists();
            if exists {
                log::info!("Found existing {} asset for scene {}", kind.name(), scene.id);
            }
            (scene.id, exists)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scene(id: u32) -> Scene {
        Scene {
            id,
            title: format!("Scene {}", id),
            characters: vec![],
            setting: "Somewhere".to_string(),
            summary: "Something happens".to_string(),
            tone: "dark".to_string(),
        }
    }

    #[test]
    fn test_asset_path() {
        let dir = Path::new("assets");
        assert_eq!(
            asset_path(dir, AssetKind::Image, 3),
            PathBuf::from("assets/scene_3.png")
        );
        assert_eq!(
            asset_path(dir, AssetKind::Video, 12),
            PathBuf::from("assets/scene_12.mp4")
        );
    }

    #[test]
    fn test_check_existing_assets() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("scene_1.png"), b"png").unwrap();
        std::fs::write(dir.path().join("scene_2.mp4"), b"mp4").unwrap();
        let scenes = [scene(1), scene(2)];

        let images = check_existing_assets(dir.path(), &scenes, AssetKind::Image);
        assert_eq!(images.get(&1), Some(&true));
        assert_eq!(images.get(&2), Some(&false));

        let videos = check_existing_assets(dir.path(), &scenes, AssetKind::Video);
        assert_eq!(videos.get(&1), Some(&false));
        assert_eq!(videos.get(&2), Some(&true));
    }

    #[test]
    fn test_missing_directory_means_nothing_exists() {
        let scenes = [scene(1)];
        let found = check_existing_assets(Path::new("/no/such/dir"), &scenes, AssetKind::Video);
        assert_eq!(found.get(&1), Some(&false));
    }
}
