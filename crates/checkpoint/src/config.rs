//! Checkpoint storage selection.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::{CheckpointStore, CouchCheckpointStore, FilesystemStore, InMemoryStore};

/// Checkpoint storage backend configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointStorage {
    /// Store checkpoint files in a directory.
    Filesystem { dir: String },
    /// Store one checkpoint document per feed in a CouchDB database.
    Couch {
        url: String,
        database: String,
        timeout: Duration,
    },
    /// Keep checkpoints in memory for the lifetime of the process.
    Memory,
}

impl Default for CheckpointStorage {
    fn default() -> Self {
        Self::Filesystem {
            dir: ".relay-sync-checkpoints".to_string(),
        }
    }
}

impl CheckpointStorage {
    /// Build the configured store.
    pub fn open(&self) -> Result<Arc<dyn CheckpointStore>> {
        Ok(match self {
            Self::Filesystem { dir } => Arc::new(FilesystemStore::new(dir)),
            Self::Couch {
                url,
                database,
                timeout,
            } => Arc::new(CouchCheckpointStore::new(url, database, *timeout)?),
            Self::Memory => Arc::new(InMemoryStore::new()),
        })
    }
}
