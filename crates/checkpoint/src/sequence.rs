//! Change feed sequence checkpoint.

use anyhow::Result;
use chrono::{DateTime, Utc};
use relay_core::Sequence;
use serde::{Deserialize, Serialize};

/// Last change feed sequence whose batch was fully committed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SequenceCheckpoint {
    /// Opaque feed position
    pub sequence: Sequence,
    /// Timestamp when the sequence was recorded
    pub updated_at: DateTime<Utc>,
}

impl SequenceCheckpoint {
    pub fn new(sequence: Sequence) -> Self {
        Self {
            sequence,
            updated_at: Utc::now(),
        }
    }
}

impl crate::Checkpoint for SequenceCheckpoint {
    const KIND: &'static str = "sequence";

    /// Numbers print as numbers and string tokens print verbatim.
    fn to_cli_string(&self) -> String {
        self.sequence.to_string()
    }

    /// Integers parse as numeric sequences; anything else is a string token.
    fn from_cli_string(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            anyhow::bail!("Invalid sequence checkpoint: sequence cannot be empty");
        }
        let sequence = match s.parse::<u64>() {
            Ok(n) => Sequence::from(n),
            Err(_) => Sequence::from(s),
        };
        Ok(Self::new(sequence))
    }
}
