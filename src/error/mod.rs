//! Error handling for the ACS PUMS data layer.

use crate::source::{Horizon, Survey};

/// Specialized error type for PUMS loading and task extraction.
///
/// Every variant names the offending key, column, or path; nothing is
/// retried or swallowed at this layer, and no partial results are returned.
#[derive(Debug, thiserror::Error)]
pub enum AcsError {
    /// Invalid configuration value (bad year, density, state code, ...)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A raw shard is missing locally and downloading is disallowed
    #[error(
        "data unavailable: no local shard for state {state} ({survey} survey, {year} {horizon}) and download is disabled"
    )]
    DataUnavailable {
        /// Survey year of the missing shard
        year: u16,
        /// Aggregation horizon of the missing shard
        horizon: Horizon,
        /// Survey unit of the missing shard
        survey: Survey,
        /// Two-letter state code of the missing shard
        state: String,
    },

    /// The shard fetcher collaborator failed to produce a local file
    #[error("transport error fetching shard for state {state}: {source}")]
    Transport {
        /// Two-letter state code of the shard being fetched
        state: String,
        /// Underlying fetcher error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An expected column is absent, or state tables have divergent schemas
    #[error("schema error: {0}")]
    Schema(String),

    /// A row-alignment invariant was violated (e.g. household join mismatch)
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Error opening or reading a file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from an Arrow compute or CSV operation
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error reading a cached Parquet shard
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

/// Result type for ACS PUMS operations
pub type Result<T> = std::result::Result<T, AcsError>;
