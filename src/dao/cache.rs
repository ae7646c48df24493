use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tokio::fs;
use tracing::{debug, warn};

/// Cache key holding the serialized roster.
pub const MEMBERS_CACHE_KEY: &str = "members.json";
/// Cache key holding the serialized guild settings.
pub const SETTINGS_CACHE_KEY: &str = "settings.json";

/// Text files kept under a single directory so the last known roster can be
/// shown before any remote call completes. Not a source of truth.
#[derive(Debug, Clone)]
pub struct LocalCache {
    dir: PathBuf,
}

impl LocalCache {
    /// Cache rooted at `dir`; nothing is touched until the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the snapshots.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Contents stored under `key`, or `None` when missing or unreadable.
    pub async fn read(&self, key: &str) -> Option<String> {
        let path = self.dir.join(key);
        match fs::read_to_string(&path).await {
            Ok(contents) => Some(contents),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "cache entry not found");
                None
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read cache entry");
                None
            }
        }
    }

    /// Store `contents` under `key`. Failures are logged and swallowed.
    pub async fn write(&self, key: &str, contents: &str) {
        let path = self.dir.join(key);
        if let Err(err) = fs::create_dir_all(&self.dir).await {
            warn!(dir = %self.dir.display(), error = %err, "failed to create cache directory");
            return;
        }
        if let Err(err) = fs::write(&path, contents).await {
            warn!(path = %path.display(), error = %err, "failed to write cache entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_returns_contents() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path().join("nested"));

        assert_eq!(cache.read(MEMBERS_CACHE_KEY).await, None);
        cache.write(MEMBERS_CACHE_KEY, "[]").await;
        assert_eq!(cache.read(MEMBERS_CACHE_KEY).await.as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn write_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        // The cache directory path points at a regular file, so writes cannot succeed.
        let cache = LocalCache::new(&blocker);

        cache.write(SETTINGS_CACHE_KEY, "[]").await;
        assert_eq!(cache.read(SETTINGS_CACHE_KEY).await, None);
    }
}
