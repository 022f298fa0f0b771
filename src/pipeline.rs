//! Per-batch entry point: resolve, then commit.

use relay_core::{ChangeBatch, Sequence};
use relay_target::TargetStore;

use crate::committer::BulkCommitter;
use crate::error::PipelineError;
use crate::resolver::RevisionResolver;

/// Pipeline behaviour switches.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Keep only the last record per identifier before resolving.
    ///
    /// Two writes of one identifier in one bulk call always conflict, so a
    /// batch with duplicates would fail on every retry.
    pub coalesce_duplicates: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            coalesce_duplicates: true,
        }
    }
}

/// Result of a successfully processed batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    /// Documents written to the target store.
    pub accepted: usize,
    /// Feed position the caller may checkpoint. `None` means the batch saw
    /// nothing and the checkpoint stays where it is.
    pub last_sequence: Option<Sequence>,
}

/// Reconciles and commits change batches against one target store.
///
/// Holds no state between calls; each [`process`](Self::process) call is
/// an independent transaction over one batch.
pub struct Pipeline<S> {
    store: S,
    config: PipelineConfig,
}

impl<S: TargetStore> Pipeline<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, PipelineConfig::default())
    }

    pub fn with_config(store: S, config: PipelineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one batch.
    ///
    /// An empty batch returns `accepted == 0` without touching the store.
    /// On success the caller may advance its checkpoint to
    /// `last_sequence`.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Lookup`] when the revision lookup fails
    /// - [`PipelineError::Processing`] when the commit fails; no count is
    ///   returned and the checkpoint must not move
    pub async fn process(&self, batch: ChangeBatch) -> Result<ProcessOutcome, PipelineError> {
        let last_sequence = batch.last_sequence().cloned();

        if batch.is_empty() {
            tracing::debug!("Empty batch, nothing to write");
            return Ok(ProcessOutcome {
                accepted: 0,
                last_sequence,
            });
        }

        let batch = if self.config.coalesce_duplicates && batch.has_duplicate_ids() {
            let received = batch.len();
            let batch = batch.coalesce();
            tracing::debug!(
                "Coalesced {} records into {} documents",
                received,
                batch.len()
            );
            batch
        } else {
            batch
        };

        let resolved = RevisionResolver::new(&self.store).resolve(batch).await?;
        let accepted = BulkCommitter::new(&self.store).commit(resolved).await?;

        tracing::info!(
            "Committed {} documents through seq {}",
            accepted,
            last_sequence
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".to_string())
        );

        Ok(ProcessOutcome {
            accepted,
            last_sequence,
        })
    }
}
