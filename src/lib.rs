//! relay-sync library
//!
//! The reconciliation-and-write stage of a change-data-capture pipeline.
//! Batches of documents from a source change feed are stamped with the
//! target store's current revisions and committed in one bulk write. A batch
//! either commits completely or fails as a whole, and only a complete commit
//! lets the feed checkpoint advance.
//!
//! # Components
//!
//! - [`RevisionResolver`] - one batched lookup, revisions joined by identifier
//! - [`BulkCommitter`] - one bulk write, failures classified into
//!   [`ProcessingFailure`]
//! - [`Pipeline`] - resolve then commit, per batch
//! - [`FeedDriver`] - buffers change lines, flushes by size or interval, and
//!   checkpoints after successful batches
//!
//! # CLI Usage
//!
//! ```bash
//! # Replay a recorded change feed into CouchDB, resuming from the checkpoint
//! relay-sync replay --changes changes.jsonl \
//!   --target-url http://localhost:5984 --target-database replica --feed orders
//!
//! # Show the stored checkpoint
//! relay-sync checkpoint show --feed orders
//! ```

pub mod committer;
pub mod config;
pub mod driver;
pub mod error;
pub mod pipeline;
pub mod replay;
pub mod resolver;
pub mod source;
pub mod testing;

pub use committer::BulkCommitter;
pub use config::{ConfigOverrides, RelayConfig};
pub use driver::{DriverConfig, DriverReport, FeedDriver};
pub use error::{PipelineError, ProcessingFailure, ResolveError};
pub use pipeline::{Pipeline, PipelineConfig, ProcessOutcome};
pub use resolver::{ResolvedDocument, RevisionResolver};
