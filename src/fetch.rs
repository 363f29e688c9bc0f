//! Shard fetching collaborator interface and on-disk cache layout.
//!
//! The network transport itself lives behind [`ShardFetcher`]; this module
//! owns where shards live under the cache root and the decision between a
//! cached Parquet conversion and the raw CSV.

use std::path::{Path, PathBuf};

use crate::error::{AcsError, Result};
use crate::source::{Horizon, Survey};
use crate::states;

/// Identifies one raw PUMS shard: a single state-year-survey file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShardKey {
    /// Survey year, e.g. 2018
    pub year: u16,
    /// Aggregation horizon of the survey
    pub horizon: Horizon,
    /// Person- or household-level records
    pub survey: Survey,
    /// Two-letter USPS state code
    pub state: String,
}

impl ShardKey {
    /// File name of the decompressed CSV shard as published by the Census
    /// Bureau: `psam_p06.csv` from 2017 onward, `ss16pca.csv` before.
    pub fn csv_name(&self) -> Result<String> {
        let unit = self.survey.file_char();
        if self.year >= 2017 {
            let fips = states::fips_code(&self.state)?;
            Ok(format!("psam_{unit}{fips}.csv"))
        } else {
            // Validate the code even though the legacy naming does not use it
            states::fips_code(&self.state)?;
            let yy = self.year % 100;
            Ok(format!(
                "ss{yy:02}{unit}{}.csv",
                self.state.to_lowercase()
            ))
        }
    }
}

/// External collaborator that materializes a raw shard on disk.
///
/// On success the decompressed table file exists at `dest`. Implementations
/// must write atomically (write to a temp file, then rename) so concurrent
/// readers never observe a partially written shard. Retry policy, if any,
/// belongs to the implementation; failures surface unmodified.
pub trait ShardFetcher: Send + Sync {
    /// Download and unpack the shard named by `key` into `dest`.
    fn fetch(
        &self,
        key: &ShardKey,
        dest: &Path,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Directory holding the shards for one (year, horizon, survey) key.
#[must_use]
pub fn shard_dir(root: &Path, year: u16, horizon: Horizon, survey: Survey) -> PathBuf {
    root.join(year.to_string())
        .join(horizon.as_str())
        .join(survey.as_str())
}

/// Ensure the decompressed shard for `key` exists locally, returning its path.
///
/// A cached Parquet conversion takes precedence over the raw CSV. When the
/// shard is absent: with `download` unset this is a data-unavailable error
/// naming the missing state/year/survey; otherwise the fetcher is invoked
/// once and any failure is surfaced as a transport error.
pub fn ensure_local(
    root: &Path,
    key: &ShardKey,
    download: bool,
    fetcher: Option<&dyn ShardFetcher>,
) -> Result<PathBuf> {
    let dir = shard_dir(root, key.year, key.horizon, key.survey);
    let csv_path = dir.join(key.csv_name()?);
    let parquet_path = csv_path.with_extension("parquet");

    if parquet_path.is_file() {
        return Ok(parquet_path);
    }
    if csv_path.is_file() {
        return Ok(csv_path);
    }

    if !download {
        return Err(AcsError::DataUnavailable {
            year: key.year,
            horizon: key.horizon,
            survey: key.survey,
            state: key.state.clone(),
        });
    }

    let fetcher = fetcher.ok_or_else(|| {
        AcsError::Configuration(format!(
            "download requested for state {} but no shard fetcher is configured",
            key.state
        ))
    })?;

    log::info!(
        "Fetching shard for state {} ({} survey, {} {})",
        key.state,
        key.survey,
        key.year,
        key.horizon
    );
    std::fs::create_dir_all(&dir)?;
    fetcher
        .fetch(key, &csv_path)
        .map_err(|source| AcsError::Transport {
            state: key.state.clone(),
            source,
        })?;

    if !csv_path.is_file() {
        return Err(AcsError::DataUnavailable {
            year: key.year,
            horizon: key.horizon,
            survey: key.survey,
            state: key.state.clone(),
        });
    }
    Ok(csv_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modern_shards_use_fips_naming() {
        let key = ShardKey {
            year: 2018,
            horizon: Horizon::OneYear,
            survey: Survey::Person,
            state: "CA".to_string(),
        };
        assert_eq!(key.csv_name().unwrap(), "psam_p06.csv");
    }

    #[test]
    fn legacy_shards_use_abbreviation_naming() {
        let key = ShardKey {
            year: 2016,
            horizon: Horizon::OneYear,
            survey: Survey::Household,
            state: "CA".to_string(),
        };
        assert_eq!(key.csv_name().unwrap(), "ss16hca.csv");
    }

    #[test]
    fn shard_dir_follows_cache_layout() {
        let dir = shard_dir(
            Path::new("data"),
            2018,
            Horizon::FiveYear,
            Survey::Person,
        );
        assert_eq!(dir, PathBuf::from("data/2018/5-Year/person"));
    }

    #[test]
    fn unknown_state_in_key_is_rejected() {
        let key = ShardKey {
            year: 2018,
            horizon: Horizon::OneYear,
            survey: Survey::Person,
            state: "XX".to_string(),
        };
        assert!(key.csv_name().is_err());
    }
}
