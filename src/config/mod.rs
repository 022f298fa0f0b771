//! Configuration for relay-sync.
//!
//! Settings come from an optional TOML file and are then overridden by
//! command-line flags:
//!
//! ```toml
//! [driver]
//! limit = 500
//! flush_interval = "30s"
//! seq_property = "_seq"     # "" disables sequence injection
//!
//! [target]
//! url = "http://localhost:5984"
//! database = "replica"
//! timeout = "60s"
//!
//! [checkpoint]
//! dir = ".relay-sync-checkpoints"
//! feed = "orders"
//! # Keep checkpoints in CouchDB instead of `dir`; `url` defaults to target.url
//! # database = "relay-checkpoints"
//! # url = "http://localhost:5984"
//! ```

mod duration;

pub use duration::{parse_duration, parse_duration_to_secs};

use anyhow::{Context, Result};
use checkpoint::CheckpointStorage;
use relay_core::{ChangeLineProcessor, DEFAULT_SEQ_PROPERTY, DELETED_FIELD, ID_FIELD, REV_FIELD};
use relay_target::CouchOpts;
use serde::Deserialize;
use std::path::Path;

use crate::driver::{DriverConfig, DEFAULT_LIMIT};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverSection {
    pub limit: usize,
    pub flush_interval: String,
    pub seq_property: String,
}

impl Default for DriverSection {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            flush_interval: "10s".to_string(),
            seq_property: DEFAULT_SEQ_PROPERTY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetSection {
    pub url: String,
    pub database: Option<String>,
    pub timeout: String,
}

impl Default for TargetSection {
    fn default() -> Self {
        Self {
            url: "http://localhost:5984".to_string(),
            database: None,
            timeout: "60s".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckpointSection {
    pub dir: String,
    pub feed: String,
    pub url: Option<String>,
    pub database: Option<String>,
}

impl Default for CheckpointSection {
    fn default() -> Self {
        Self {
            dir: ".relay-sync-checkpoints".to_string(),
            feed: "default".to_string(),
            url: None,
            database: None,
        }
    }
}

/// Full relay-sync configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    pub driver: DriverSection,
    pub target: TargetSection,
    pub checkpoint: CheckpointSection,
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub limit: Option<usize>,
    pub flush_interval: Option<String>,
    pub seq_property: Option<String>,
    pub no_seq_property: bool,
    pub target_url: Option<String>,
    pub target_database: Option<String>,
    pub target_timeout: Option<String>,
    pub checkpoint_dir: Option<String>,
    pub checkpoint_url: Option<String>,
    pub checkpoint_database: Option<String>,
    pub feed: Option<String>,
}

impl RelayConfig {
    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid relay-sync configuration")
    }

    /// Load from `path`, or use defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                let config = Self::from_toml(&content)?;
                tracing::debug!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn apply(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(limit) = overrides.limit {
            self.driver.limit = limit;
        }
        if let Some(interval) = overrides.flush_interval {
            self.driver.flush_interval = interval;
        }
        if let Some(property) = overrides.seq_property {
            self.driver.seq_property = property;
        }
        if overrides.no_seq_property {
            self.driver.seq_property = String::new();
        }
        if let Some(url) = overrides.target_url {
            self.target.url = url;
        }
        if let Some(database) = overrides.target_database {
            self.target.database = Some(database);
        }
        if let Some(timeout) = overrides.target_timeout {
            self.target.timeout = timeout;
        }
        if let Some(dir) = overrides.checkpoint_dir {
            self.checkpoint.dir = dir;
        }
        if let Some(url) = overrides.checkpoint_url {
            self.checkpoint.url = Some(url);
        }
        if let Some(database) = overrides.checkpoint_database {
            self.checkpoint.database = Some(database);
        }
        if let Some(feed) = overrides.feed {
            self.checkpoint.feed = feed;
        }
        self
    }

    pub fn driver_config(&self) -> Result<DriverConfig> {
        if self.driver.limit == 0 {
            anyhow::bail!("driver.limit must be at least 1");
        }
        Ok(DriverConfig {
            limit: self.driver.limit,
            flush_interval: parse_duration(&self.driver.flush_interval)
                .context("Invalid driver.flush_interval")?,
        })
    }

    /// Build the change-line processor.
    ///
    /// `driver.seq_property` may not name `_id` or `_deleted`: writing the
    /// sequence there would fail or corrupt every document.
    pub fn change_line_processor(&self) -> Result<ChangeLineProcessor> {
        let property = self.driver.seq_property.trim();
        if property.is_empty() {
            return Ok(ChangeLineProcessor::new(None));
        }
        if property == ID_FIELD || property == DELETED_FIELD {
            anyhow::bail!("driver.seq_property cannot be the reserved field '{property}'");
        }
        if property == REV_FIELD {
            tracing::warn!(
                "driver.seq_property is '{REV_FIELD}': the injected sequence is replaced by the target revision on every write"
            );
        }
        Ok(ChangeLineProcessor::new(Some(property.to_string())))
    }

    pub fn couch_opts(&self) -> Result<CouchOpts> {
        let database = self
            .target
            .database
            .clone()
            .ok_or_else(|| anyhow::anyhow!("No target database configured"))?;
        Ok(CouchOpts {
            url: self.target.url.clone(),
            database,
            timeout: parse_duration(&self.target.timeout).context("Invalid target.timeout")?,
        })
    }

    /// Checkpoint backend: CouchDB when `checkpoint.database` is set,
    /// otherwise files under `checkpoint.dir`.
    pub fn checkpoint_storage(&self) -> Result<CheckpointStorage> {
        match &self.checkpoint.database {
            Some(database) => Ok(CheckpointStorage::Couch {
                url: self
                    .checkpoint
                    .url
                    .clone()
                    .unwrap_or_else(|| self.target.url.clone()),
                database: database.clone(),
                timeout: parse_duration(&self.target.timeout).context("Invalid target.timeout")?,
            }),
            None => Ok(CheckpointStorage::Filesystem {
                dir: self.checkpoint.dir.clone(),
            }),
        }
    }
}
