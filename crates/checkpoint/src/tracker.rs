//! Per-feed sequence tracking.

use anyhow::Result;
use relay_core::Sequence;

use crate::{validate_feed_name, CheckpointFile, CheckpointStore, SequenceCheckpoint};

/// Reads and writes the checkpoint sequence of one feed.
///
/// # Example
///
/// ```rust,ignore
/// let tracker = CheckpointTracker::new(FilesystemStore::new("/tmp/checkpoints"), "orders")?;
/// tracker.put_seq(&Sequence::from(42)).await?;
/// assert_eq!(tracker.get_seq().await?, Some(Sequence::from(42)));
/// ```
pub struct CheckpointTracker<S> {
    store: S,
    feed: String,
}

impl<S: CheckpointStore> CheckpointTracker<S> {
    pub fn new(store: S, feed: impl Into<String>) -> Result<Self> {
        let feed = feed.into();
        validate_feed_name(&feed)?;
        Ok(Self { store, feed })
    }

    pub fn feed(&self) -> &str {
        &self.feed
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Record `seq` as the last fully processed sequence.
    pub async fn put_seq(&self, seq: &Sequence) -> Result<()> {
        let file = CheckpointFile::new(&self.feed, &SequenceCheckpoint::new(seq.clone()))?;
        self.store.store_checkpoint(&file).await?;
        tracing::info!("Put seq for feed '{}': {}", self.feed, seq);
        Ok(())
    }

    /// Load the stored checkpoint, if any.
    pub async fn get_checkpoint(&self) -> Result<Option<SequenceCheckpoint>> {
        match self.store.read_checkpoint(&self.feed).await? {
            Some(file) => Ok(Some(file.parse()?)),
            None => Ok(None),
        }
    }

    /// Load the last fully processed sequence, if any.
    pub async fn get_seq(&self) -> Result<Option<Sequence>> {
        let seq = self.get_checkpoint().await?.map(|c| c.sequence);
        match &seq {
            Some(seq) => tracing::info!("Got seq for feed '{}': {}", self.feed, seq),
            None => tracing::info!("No checkpoint stored for feed '{}'", self.feed),
        }
        Ok(seq)
    }
}
