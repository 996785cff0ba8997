//! GenerationCache - in-memory map from prompt fingerprint to clip path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    path: PathBuf,
    stored_at: Instant,
}

/// Session-scoped cache of generated clips.
///
/// Keys are prompt fingerprints, not scene ids: two scenes with identical
/// prompts share one clip. Nothing is persisted across processes.
#[derive(Debug, Clone)]
pub struct GenerationCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
}

impl GenerationCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Get the cached path for `fingerprint`, if still usable.
    ///
    /// An entry whose file was deleted, or that is older than the TTL, is a
    /// miss rather than an error.
    pub fn lookup(&self, fingerprint: &str) -> Option<&Path> {
        let entry = self.entries.get(fingerprint)?;
        if entry.stored_at.elapsed() >= self.ttl {
            log::debug!("Cache entry {} expired", fingerprint);
            return None;
        }
        if !entry.path.exists() {
            log::debug!(
                "Cache entry {} points at missing file {}",
                fingerprint,
                entry.path.display()
            );
            return None;
        }
        Some(&entry.path)
    }

    /// Store a path, overwriting any previous entry.
    pub fn store(&mut self, fingerprint: String, path: PathBuf) {
        self.entries.insert(
            fingerprint,
            CacheEntry {
                path,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(86_400);

    #[test]
    fn test_hit_when_file_exists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scene_1.mp4");
        std::fs::write(&path, b"clip").unwrap();

        let mut cache = GenerationCache::new(DAY);
        cache.store("abc123def456".to_string(), path.clone());
        assert_eq!(cache.lookup("abc123def456"), Some(path.as_path()));
    }

    #[test]
    fn test_miss_when_unknown() {
        let cache = GenerationCache::new(DAY);
        assert!(cache.lookup("nope").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_miss_when_file_deleted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scene_1.mp4");
        std::fs::write(&path, b"clip").unwrap();

        let mut cache = GenerationCache::new(DAY);
        cache.store("fp".to_string(), path.clone());
        std::fs::remove_file(&path).unwrap();
        assert!(cache.lookup("fp").is_none());
        // The entry itself is kept; a later store overwrites it.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_ttl_always_expires() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scene_1.mp4");
        std::fs::write(&path, b"clip").unwrap();

        let mut cache = GenerationCache::new(Duration::ZERO);
        cache.store("fp".to_string(), path);
        assert!(cache.lookup("fp").is_none());
    }

    #[test]
    fn test_store_overwrites() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("a.mp4");
        let second = dir.path().join("b.mp4");
        std::fs::write(&first, b"a").unwrap();
        std::fs::write(&second, b"b").unwrap();

        let mut cache = GenerationCache::new(DAY);
        cache.store("fp".to_string(), first);
        cache.store("fp".to_string(), second.clone());
        assert_eq!(cache.lookup("fp"), Some(second.as_path()));
        assert_eq!(cache.len(), 1);
    }
}
