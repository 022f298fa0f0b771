//! Bulk commit and failure classification.

use relay_core::{BulkOutcome, Document};
use relay_target::TargetStore;

use crate::error::ProcessingFailure;
use crate::resolver::ResolvedDocument;

/// Writes a resolved batch in one bulk call and classifies the result.
///
/// The batch is all-or-nothing from the caller's point of view: a single
/// rejected document fails the whole batch, even though the store may have
/// applied the others. Retries must re-resolve against the store rather
/// than replay the same documents.
pub struct BulkCommitter<S> {
    store: S,
}

impl<S: TargetStore> BulkCommitter<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Commit `resolved`, returning the number of documents accepted.
    ///
    /// An empty input returns `Ok(0)` without contacting the store.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingFailure`] when the bulk write call fails, when any
    /// document is rejected, or when the outcomes do not line up with the
    /// submitted documents.
    pub async fn commit(&self, resolved: Vec<ResolvedDocument>) -> Result<usize, ProcessingFailure> {
        if resolved.is_empty() {
            return Ok(0);
        }

        let docs: Vec<Document> = resolved
            .into_iter()
            .map(ResolvedDocument::into_document)
            .collect();

        let outcomes = match self.store.bulk_write(&docs).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                tracing::error!("Failed to write {} documents: {:#}", docs.len(), e);
                return Err(ProcessingFailure::Transport {
                    count: docs.len(),
                    source: e.into(),
                });
            }
        };

        if outcomes.len() != docs.len() {
            tracing::error!(
                "Bulk write returned {} outcomes for {} documents",
                outcomes.len(),
                docs.len()
            );
            return Err(ProcessingFailure::OutcomeMismatch {
                submitted: docs.len(),
                returned: outcomes.len(),
            });
        }

        let first_error = outcomes
            .into_iter()
            .enumerate()
            .find(|(_, outcome)| outcome.is_error());

        if let Some((position, BulkOutcome::Failed { id, error, reason })) = first_error {
            tracing::error!(
                "Errors executing bulk: '{}' at position {} rejected with {} ({})",
                id,
                position,
                error,
                reason.as_deref().unwrap_or("no reason given")
            );
            return Err(ProcessingFailure::Rejected {
                id,
                position,
                error,
                reason,
            });
        }

        tracing::debug!("Bulk wrote {} documents", docs.len());
        Ok(docs.len())
    }
}
