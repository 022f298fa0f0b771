//! Checkpoint management for relay-sync
//!
//! A checkpoint is the last change feed sequence whose batch was fully
//! committed to the target store. The feed driver stores it after every
//! successful batch and reads it back to resume the feed after a restart.
//!
//! # Architecture
//!
//! - `Checkpoint` trait for checkpoint types (`SequenceCheckpoint` is the
//!   one the feed driver uses)
//! - `CheckpointFile` wrapper for self-describing serialization
//! - `CheckpointStore` trait for storage backends
//! - `CheckpointTracker` for reading and writing one feed's sequence
//!
//! ## Storage Backends
//!
//! - `FilesystemStore` - One JSON file per feed, replaced atomically
//! - `CouchCheckpointStore` - One document per feed in a CouchDB database
//! - `InMemoryStore` - Process-local, for tests and dry runs

mod config;
mod couch;
mod file;
mod filesystem;
mod memory;
mod sequence;
pub mod store;
mod tracker;


pub use config::CheckpointStorage;
pub use couch::CouchCheckpointStore;
pub use file::CheckpointFile;
pub use filesystem::FilesystemStore;
pub use memory::InMemoryStore;
pub use sequence::SequenceCheckpoint;
pub use store::CheckpointStore;
pub use tracker::CheckpointTracker;

/// Trait that checkpoint types must implement.
///
/// # Example
///
/// ```rust
/// use checkpoint::Checkpoint;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct OffsetCheckpoint {
///     pub offset: u64,
/// }
///
/// impl Checkpoint for OffsetCheckpoint {
///     const KIND: &'static str = "offset";
///
///     fn to_cli_string(&self) -> String {
///         self.offset.to_string()
///     }
///
///     fn from_cli_string(s: &str) -> anyhow::Result<Self> {
///         Ok(Self { offset: s.parse()? })
///     }
/// }
/// ```
pub trait Checkpoint: serde::Serialize + for<'de> serde::Deserialize<'de> + Clone {
    /// Checkpoint type identifier, stored in every `CheckpointFile` and
    /// validated when the file is parsed back.
    const KIND: &'static str;

    /// Convert to CLI-friendly string format.
    ///
    /// The returned string should be parseable by `from_cli_string()`.
    fn to_cli_string(&self) -> String;

    /// Parse from CLI string format.
    fn from_cli_string(s: &str) -> anyhow::Result<Self>
    where
        Self: Sized;
}

/// Check that a feed name can be used as a checkpoint key and file name.
pub fn validate_feed_name(feed: &str) -> anyhow::Result<()> {
    if feed.is_empty() {
        anyhow::bail!("Feed name cannot be empty");
    }
    if let Some(c) = feed
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        anyhow::bail!("Invalid character '{c}' in feed name '{feed}'");
    }
    Ok(())
}
