//! Command-line interface for relay-sync
//!
//! # Usage Examples
//!
//! ## Replay
//! ```bash
//! # Replay a recorded change feed into CouchDB
//! relay-sync replay --changes changes.jsonl \
//!   --target-url http://localhost:5984 \
//!   --target-database replica \
//!   --feed orders
//!
//! # Same run using a config file, flushing every 500 changes
//! relay-sync replay --config relay.toml --changes changes.jsonl --limit 500
//!
//! # Walk the feed against an in-memory target
//! relay-sync replay --changes changes.jsonl --dry-run
//! ```
//!
//! ## Checkpoints
//! ```bash
//! relay-sync checkpoint show --feed orders
//! relay-sync checkpoint set --feed orders --seq 42
//!
//! # Checkpoints kept in a CouchDB database
//! relay-sync checkpoint show --feed orders \
//!   --checkpoint-url http://localhost:5984 --checkpoint-database relay-checkpoints
//! ```

use anyhow::Context;
use checkpoint::{Checkpoint, CheckpointTracker, SequenceCheckpoint};
use clap::{Args, Parser, Subcommand};
use relay_sync::config::{ConfigOverrides, RelayConfig};
use relay_sync::replay::run_replay;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "relay-sync")]
#[command(about = "Replicate change feed batches into a revision-checked document store")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded change feed into the target store
    Replay {
        /// Change feed file, one JSON change line per line
        #[arg(long, value_name = "FILE")]
        changes: PathBuf,

        #[command(flatten)]
        common: CommonArgs,

        #[command(flatten)]
        target: TargetArgs,

        /// Flush after this many buffered changes
        #[arg(long)]
        limit: Option<usize>,

        /// Flush after this much time, e.g. "10s", "5m"
        #[arg(long)]
        flush_interval: Option<String>,

        /// Property that receives each change's feed sequence
        #[arg(long, conflicts_with = "no_seq_property")]
        seq_property: Option<String>,

        /// Do not inject the feed sequence into documents
        #[arg(long)]
        no_seq_property: bool,

        /// Write to an in-memory target and keep checkpoints in memory
        #[arg(long)]
        dry_run: bool,
    },

    /// Inspect or edit stored checkpoints
    Checkpoint {
        #[command(subcommand)]
        command: CheckpointCommand,
    },
}

#[derive(Subcommand)]
enum CheckpointCommand {
    /// Print the stored checkpoint of a feed
    Show {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Overwrite the stored checkpoint of a feed
    Set {
        #[command(flatten)]
        common: CommonArgs,

        /// Sequence to resume after, e.g. "42" or "42-g1AAAA"
        #[arg(long)]
        seq: String,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// TOML configuration file
    #[arg(long, value_name = "PATH", env = "RELAY_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding checkpoint files
    #[arg(long, env = "RELAY_CHECKPOINT_DIR")]
    checkpoint_dir: Option<String>,

    /// Keep checkpoints in this CouchDB database instead of the checkpoint directory
    #[arg(long, env = "RELAY_CHECKPOINT_DATABASE")]
    checkpoint_database: Option<String>,

    /// CouchDB server for checkpoints (defaults to the target URL)
    #[arg(long, env = "RELAY_CHECKPOINT_URL")]
    checkpoint_url: Option<String>,

    /// Feed name the checkpoint is stored under
    #[arg(long, env = "RELAY_FEED")]
    feed: Option<String>,
}

#[derive(Args)]
struct TargetArgs {
    /// Target store base URL
    #[arg(long, env = "RELAY_TARGET_URL")]
    target_url: Option<String>,

    /// Target database name
    #[arg(long, env = "RELAY_TARGET_DATABASE")]
    target_database: Option<String>,

    /// Request timeout for target store calls, e.g. "60s"
    #[arg(long, env = "RELAY_TARGET_TIMEOUT")]
    target_timeout: Option<String>,
}

impl CommonArgs {
    fn load(&self, overrides: ConfigOverrides) -> anyhow::Result<RelayConfig> {
        let config = RelayConfig::load(self.config.as_deref())?;
        Ok(config.apply(ConfigOverrides {
            checkpoint_dir: self.checkpoint_dir.clone(),
            checkpoint_url: self.checkpoint_url.clone(),
            checkpoint_database: self.checkpoint_database.clone(),
            feed: self.feed.clone(),
            ..overrides
        }))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            changes,
            common,
            target,
            limit,
            flush_interval,
            seq_property,
            no_seq_property,
            dry_run,
        } => {
            let config = common.load(ConfigOverrides {
                limit,
                flush_interval,
                seq_property,
                no_seq_property,
                target_url: target.target_url,
                target_database: target.target_database,
                target_timeout: target.target_timeout,
                ..Default::default()
            })?;

            let report = run_replay(&config, &changes, dry_run)
                .await
                .with_context(|| format!("Replay of {} failed", changes.display()))?;

            println!(
                "Replayed {} lines ({} skipped) in {} batches, {} documents written",
                report.lines_seen,
                report.lines_skipped,
                report.batches_flushed,
                report.documents_accepted
            );
            if let Some(seq) = report.checkpoint {
                println!("Checkpoint: {seq}");
            }
        }
        Commands::Checkpoint { command } => run_checkpoint_command(command).await?,
    }

    Ok(())
}

async fn run_checkpoint_command(command: CheckpointCommand) -> anyhow::Result<()> {
    match command {
        CheckpointCommand::Show { common } => {
            let config = common.load(ConfigOverrides::default())?;
            let tracker = CheckpointTracker::new(
                config.checkpoint_storage()?.open()?,
                &config.checkpoint.feed,
            )?;
            match tracker.get_checkpoint().await? {
                Some(checkpoint) => {
                    println!("feed:       {}", tracker.feed());
                    println!("sequence:   {}", checkpoint.to_cli_string());
                    println!("updated_at: {}", checkpoint.updated_at.to_rfc3339());
                }
                None => println!("No checkpoint stored for feed '{}'", tracker.feed()),
            }
        }
        CheckpointCommand::Set { common, seq } => {
            let config = common.load(ConfigOverrides::default())?;
            let checkpoint = SequenceCheckpoint::from_cli_string(&seq)?;
            let tracker = CheckpointTracker::new(
                config.checkpoint_storage()?.open()?,
                &config.checkpoint.feed,
            )?;
            tracker.put_seq(&checkpoint.sequence).await?;
            println!(
                "Checkpoint for feed '{}' set to {}",
                tracker.feed(),
                checkpoint.to_cli_string()
            );
        }
    }
    Ok(())
}
