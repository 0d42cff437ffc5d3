//! Client configuration.
//!
//! Configuration is an explicit value handed to the client; nothing is read
//! from global state.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::timescale::TimeScale;

const TWENTY_DAYS_SECS: u64 = 20 * 24 * 60 * 60;

/// Interval to use for the last record of a batch, which has no successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FallbackInterval {
    /// Reuse the interval derived for the preceding record.
    #[default]
    PreviousRow,
    /// Always use this interval.
    Fixed {
        /// Interval in nanoseconds.
        nanos: u64,
    },
    /// No fallback; the record collapses to one sample.
    None,
}

impl FallbackInterval {
    pub fn fixed(interval: Duration) -> Self {
        FallbackInterval::Fixed {
            nanos: u64::try_from(interval.as_nanos()).unwrap_or(u64::MAX),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Archive database name.
    /// Default: efd
    pub database: String,

    /// Retention policy segment of the measurement path.
    /// Default: autogen
    pub retention_policy: String,

    /// Scale of the archive's time index. Legacy deployments stored TAI.
    /// Default: utc
    pub index_scale: TimeScale,

    /// Select the `{Component}ID` index field instead of `salIndex`.
    /// Default: false
    pub use_old_indexing: bool,

    /// Column holding per-record reference timestamps for packed topics.
    /// Default: cRIO_timestamp
    pub ref_timestamp_column: String,

    /// Scale of `ref_timestamp_column` (unix seconds).
    /// Default: tai
    pub ref_timestamp_scale: TimeScale,

    /// Interval policy for the final record of a packed batch.
    /// Default: previous_row
    pub fallback: FallbackInterval,

    /// Default rendezvous tolerance in seconds.
    /// Default: 20 days
    pub rendezvous_tolerance_secs: u64,

    /// Worker threads for batched selections.
    /// Default: 4
    pub workers: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            database: "efd".to_string(),
            retention_policy: "autogen".to_string(),
            index_scale: TimeScale::Utc,
            use_old_indexing: false,
            ref_timestamp_column: "cRIO_timestamp".to_string(),
            ref_timestamp_scale: TimeScale::Tai,
            fallback: FallbackInterval::PreviousRow,
            rendezvous_tolerance_secs: TWENTY_DAYS_SECS,
            workers: 4,
        }
    }
}

impl ClientConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: ClientConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(Error::Config("database must not be empty".to_string()));
        }
        if self.retention_policy.trim().is_empty() {
            return Err(Error::Config("retention_policy must not be empty".to_string()));
        }
        if self.ref_timestamp_column.trim().is_empty() {
            return Err(Error::Config(
                "ref_timestamp_column must not be empty".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(Error::Config("workers must be > 0".to_string()));
        }
        if let FallbackInterval::Fixed { nanos: 0 } = self.fallback {
            return Err(Error::Config("fixed fallback interval must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn rendezvous_tolerance(&self) -> Duration {
        Duration::from_secs(self.rendezvous_tolerance_secs)
    }
}
