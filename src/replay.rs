//! Replay of a recorded change feed into a target store.

use anyhow::Result;
use checkpoint::{CheckpointStorage, CheckpointStore, CheckpointTracker};
use relay_target::{CouchStore, MemoryStore, TargetStore};
use std::path::Path;

use crate::config::RelayConfig;
use crate::driver::{DriverReport, FeedDriver};
use crate::pipeline::Pipeline;
use crate::source::open_change_feed;

/// Replay `changes` into `store`, resuming after the tracker's checkpoint.
pub async fn replay<S, C>(
    store: S,
    tracker: CheckpointTracker<C>,
    changes: &Path,
    config: &RelayConfig,
) -> Result<DriverReport>
where
    S: TargetStore,
    C: CheckpointStore,
{
    let mut driver = FeedDriver::new(
        Pipeline::new(store),
        config.change_line_processor()?,
        tracker,
        config.driver_config()?,
    );

    let since = driver.resume_sequence().await?;
    let lines = open_change_feed(changes, since)?;
    let report = driver.run(lines).await?;

    tracing::info!(
        "Replay finished: {} lines, {} batches, {} documents written",
        report.lines_seen,
        report.batches_flushed,
        report.documents_accepted
    );
    Ok(report)
}

/// Replay against the configured CouchDB target, or against an in-memory
/// target with in-memory checkpoints when `dry_run` is set.
pub async fn run_replay(config: &RelayConfig, changes: &Path, dry_run: bool) -> Result<DriverReport> {
    if dry_run {
        tracing::info!("Dry run: writing to an in-memory target, checkpoints are not persisted");
        let tracker =
            CheckpointTracker::new(CheckpointStorage::Memory.open()?, &config.checkpoint.feed)?;
        return replay(MemoryStore::new(), tracker, changes, config).await;
    }

    let store = CouchStore::new(&config.couch_opts()?)?;
    let tracker =
        CheckpointTracker::new(config.checkpoint_storage()?.open()?, &config.checkpoint.feed)?;
    replay(store, tracker, changes, config).await
}
