//! Filesystem-based checkpoint storage implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

use crate::store::CheckpointStore;
use crate::{validate_feed_name, CheckpointFile};

/// Filesystem implementation of CheckpointStore trait.
///
/// Each feed has one file, `checkpoint_{feed}.json`. Updates are written to
/// a temporary file first and renamed over the old one, so a reader never
/// sees a partially written checkpoint.
pub struct FilesystemStore {
    dir: PathBuf,
}

impl FilesystemStore {
    /// Create a new FilesystemStore with the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Get the directory path.
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Path of the checkpoint file for `feed`.
    pub fn path_for(&self, feed: &str) -> Result<PathBuf> {
        validate_feed_name(feed)?;
        Ok(self.dir.join(format!("checkpoint_{feed}.json")))
    }
}

#[async_trait]
impl CheckpointStore for FilesystemStore {
    async fn store_checkpoint(&self, file: &CheckpointFile) -> Result<()> {
        let path = self.path_for(&file.feed)?;
        std::fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create checkpoint directory {}", self.dir.display())
        })?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serde_json::to_string_pretty(file)?)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;

        tracing::debug!("Stored checkpoint to {}", path.display());
        Ok(())
    }

    async fn read_checkpoint(&self, feed: &str) -> Result<Option<CheckpointFile>> {
        let path = self.path_for(feed)?;
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file: CheckpointFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(file))
    }
}
