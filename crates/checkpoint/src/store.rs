//! Checkpoint storage trait.

use anyhow::Result;
use async_trait::async_trait;

use crate::CheckpointFile;

/// Trait for checkpoint storage operations.
///
/// Checkpoints are keyed by feed name. Storing a checkpoint replaces the
/// previous one for the same feed.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Store the checkpoint for `file.feed`.
    async fn store_checkpoint(&self, file: &CheckpointFile) -> Result<()>;

    /// Read the checkpoint for `feed`.
    ///
    /// Returns None if no checkpoint has been stored yet.
    async fn read_checkpoint(&self, feed: &str) -> Result<Option<CheckpointFile>>;
}

#[async_trait]
impl<T: CheckpointStore + ?Sized> CheckpointStore for Box<T> {
    async fn store_checkpoint(&self, file: &CheckpointFile) -> Result<()> {
        (**self).store_checkpoint(file).await
    }

    async fn read_checkpoint(&self, feed: &str) -> Result<Option<CheckpointFile>> {
        (**self).read_checkpoint(feed).await
    }
}

#[async_trait]
impl<T: CheckpointStore + ?Sized> CheckpointStore for std::sync::Arc<T> {
    async fn store_checkpoint(&self, file: &CheckpointFile) -> Result<()> {
        (**self).store_checkpoint(file).await
    }

    async fn read_checkpoint(&self, feed: &str) -> Result<Option<CheckpointFile>> {
        (**self).read_checkpoint(feed).await
    }
}
