//! Checkpoint file wrapper for storage-agnostic serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Checkpoint;

/// Storage-agnostic checkpoint file wrapper.
///
/// # File Format
///
/// ```json
/// {
///     "kind": "sequence",
///     "feed": "orders",
///     "checkpoint": {
///         "sequence": "1042-g1AAAA",
///         "updated_at": "2024-01-01T00:00:00Z"
///     },
///     "created_at": "2024-01-01T00:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointFile {
    /// Checkpoint type identifier (e.g., "sequence")
    pub kind: String,
    /// Feed the checkpoint belongs to
    pub feed: String,
    /// Serialized checkpoint data as JSON Value
    pub checkpoint: serde_json::Value,
    /// Timestamp when this checkpoint file was created
    pub created_at: DateTime<Utc>,
}

impl CheckpointFile {
    /// Wrap a checkpoint for `feed`.
    pub fn new<C: Checkpoint>(feed: impl Into<String>, checkpoint: &C) -> anyhow::Result<Self> {
        Ok(Self {
            kind: C::KIND.to_string(),
            feed: feed.into(),
            checkpoint: serde_json::to_value(checkpoint)?,
            created_at: Utc::now(),
        })
    }

    /// Parse the wrapped checkpoint into type `C`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The stored `kind` doesn't match `C::KIND`
    /// - The checkpoint data can't be deserialized into type `C`
    pub fn parse<C: Checkpoint>(&self) -> anyhow::Result<C> {
        if self.kind != C::KIND {
            anyhow::bail!(
                "Checkpoint type mismatch: expected '{}', found '{}'",
                C::KIND,
                self.kind
            );
        }
        Ok(serde_json::from_value(self.checkpoint.clone())?)
    }
}
