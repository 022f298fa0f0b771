//! Feed driver: buffers change lines, flushes them through the pipeline and
//! checkpoints only after a batch is fully committed.
//!
//! # Flush policy
//!
//! ```text
//! change lines ──▶ buffer ──┬── len >= limit ─────────┐
//!                           ├── flush_interval elapsed ┼──▶ process ──▶ put_seq
//!                           └── stream ended ──────────┘        │
//!                                                               └── failure: stop, checkpoint untouched
//! ```
//!
//! A failed flush keeps its buffered lines. Because batches are rebuilt
//! from raw lines and re-resolved against the store on every attempt, a
//! retry never replays stale revisions.

use anyhow::{Context, Result};
use checkpoint::{CheckpointStore, CheckpointTracker};
use futures::{Stream, StreamExt};
use relay_core::{ChangeLine, ChangeLineProcessor, Sequence};
use relay_target::TargetStore;
use std::time::Duration;
use tokio::time::Instant;

use crate::pipeline::Pipeline;

/// Default maximum number of buffered change lines per batch.
pub const DEFAULT_LIMIT: usize = 1000;
/// Default maximum wait between flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);

/// Buffering thresholds.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Flush once this many change lines are buffered.
    pub limit: usize,
    /// Flush once this much time has passed since the last flush.
    pub flush_interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

/// Totals for one driver run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverReport {
    /// Lines received from the stream, including skipped non-change lines.
    pub lines_seen: usize,
    /// Lines that were not changes (heartbeats, trailers).
    pub lines_skipped: usize,
    /// Successful non-empty flushes.
    pub batches_flushed: usize,
    pub documents_accepted: usize,
    /// Last sequence stored as checkpoint during this run.
    pub checkpoint: Option<Sequence>,
}

/// Drives a stream of change lines into a [`Pipeline`].
pub struct FeedDriver<S, C> {
    pipeline: Pipeline<S>,
    processor: ChangeLineProcessor,
    tracker: CheckpointTracker<C>,
    config: DriverConfig,
    buffer: Vec<ChangeLine>,
    last_flush: Instant,
    report: DriverReport,
}

impl<S: TargetStore, C: CheckpointStore> FeedDriver<S, C> {
    pub fn new(
        pipeline: Pipeline<S>,
        processor: ChangeLineProcessor,
        tracker: CheckpointTracker<C>,
        config: DriverConfig,
    ) -> Self {
        Self {
            pipeline,
            processor,
            tracker,
            config,
            buffer: Vec::new(),
            last_flush: Instant::now(),
            report: DriverReport::default(),
        }
    }

    pub fn pipeline(&self) -> &Pipeline<S> {
        &self.pipeline
    }

    pub fn tracker(&self) -> &CheckpointTracker<C> {
        &self.tracker
    }

    /// Lines buffered but not yet committed.
    pub fn pending(&self) -> &[ChangeLine] {
        &self.buffer
    }

    /// Sequence to resume the feed from, if a checkpoint exists.
    pub async fn resume_sequence(&self) -> Result<Option<Sequence>> {
        self.tracker.get_seq().await
    }

    /// Consume `lines` until the stream ends or a flush fails.
    ///
    /// Remaining buffered lines are flushed when the stream ends.
    ///
    /// # Errors
    ///
    /// Returns the first stream, conversion, pipeline or checkpoint error.
    /// Pipeline errors can be recovered with
    /// `err.downcast_ref::<PipelineError>()`.
    pub async fn run<St>(&mut self, lines: St) -> Result<DriverReport>
    where
        St: Stream<Item = Result<ChangeLine>>,
    {
        let mut lines = std::pin::pin!(lines);
        self.last_flush = Instant::now();

        loop {
            let deadline = self.last_flush + self.config.flush_interval;
            tokio::select! {
                next = lines.next() => match next {
                    Some(line) => {
                        self.push(line?);
                        self.flush_if_needed().await?;
                    }
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::debug!("Flush interval elapsed");
                    self.flush().await?;
                }
            }
        }

        self.flush().await?;
        Ok(self.report.clone())
    }

    fn push(&mut self, line: ChangeLine) {
        self.report.lines_seen += 1;
        if line.is_change() {
            tracing::debug!("Change added to buffer: seq={:?}", line.seq);
            self.buffer.push(line);
        } else {
            tracing::debug!("Skipping non-change line: {:?}", line);
            self.report.lines_skipped += 1;
        }
    }

    async fn flush_if_needed(&mut self) -> Result<()> {
        let waited = self.last_flush.elapsed();
        if self.buffer.len() >= self.config.limit || waited >= self.config.flush_interval {
            tracing::debug!(
                "Flushing {} changes, waited {:?}",
                self.buffer.len(),
                waited
            );
            self.flush().await?;
        }
        Ok(())
    }

    /// Process the buffered lines as one batch.
    ///
    /// The checkpoint is stored only after the pipeline reports success.
    pub async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            self.last_flush = Instant::now();
            return Ok(());
        }

        let batch = self
            .processor
            .process_lines(&self.buffer)
            .context("Failed to convert buffered change lines")?;

        let outcome = match self.pipeline.process(batch).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    "Batch of {} changes failed, checkpoint not advanced: {}",
                    self.buffer.len(),
                    e
                );
                return Err(anyhow::Error::new(e));
            }
        };

        if let Some(seq) = &outcome.last_sequence {
            self.tracker
                .put_seq(seq)
                .await
                .with_context(|| format!("Failed to store checkpoint at seq {seq}"))?;
            self.report.checkpoint = Some(seq.clone());
        }

        self.report.batches_flushed += 1;
        self.report.documents_accepted += outcome.accepted;
        self.buffer.clear();
        self.last_flush = Instant::now();
        Ok(())
    }
}
