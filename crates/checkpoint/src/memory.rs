//! Process-local checkpoint storage.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::store::CheckpointStore;
use crate::CheckpointFile;

/// Keeps checkpoints in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    files: Mutex<HashMap<String, CheckpointFile>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryStore {
    async fn store_checkpoint(&self, file: &CheckpointFile) -> Result<()> {
        let mut files = self
            .files
            .lock()
            .map_err(|_| anyhow::anyhow!("Checkpoint store lock poisoned"))?;
        files.insert(file.feed.clone(), file.clone());
        Ok(())
    }

    async fn read_checkpoint(&self, feed: &str) -> Result<Option<CheckpointFile>> {
        let files = self
            .files
            .lock()
            .map_err(|_| anyhow::anyhow!("Checkpoint store lock poisoned"))?;
        Ok(files.get(feed).cloned())
    }
}
