//! Data source for ACS PUMS tables.
//!
//! An [`AcsDataSource`] is configured once with a (year, horizon, survey)
//! key and a cache root, and is stateless thereafter: every
//! [`get_data`](AcsDataSource::get_data) call is an independent, idempotent
//! fetch producing one validated record batch.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use arrow::record_batch::RecordBatch;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{AcsError, Result};
use crate::fetch::{self, ShardFetcher, ShardKey};
use crate::{join, loader, sample, states, utils};

/// Multi-year aggregation window of the survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Horizon {
    /// 1-Year estimates
    OneYear,
    /// 5-Year estimates
    FiveYear,
}

impl Horizon {
    /// Label used in cache paths, matching the Census Bureau's naming.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneYear => "1-Year",
            Self::FiveYear => "5-Year",
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Horizon {
    type Err = AcsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1-Year" => Ok(Self::OneYear),
            "5-Year" => Ok(Self::FiveYear),
            other => Err(AcsError::Configuration(format!(
                "horizon must be \"1-Year\" or \"5-Year\", got \"{other}\""
            ))),
        }
    }
}

/// Unit of observation of a PUMS file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Survey {
    /// One row per person
    Person,
    /// One row per household
    Household,
}

impl Survey {
    /// Label used in cache paths.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Household => "household",
        }
    }

    /// Unit character in published file names (`psam_p06.csv` / `psam_h06.csv`).
    #[must_use]
    pub const fn file_char(self) -> char {
        match self {
            Self::Person => 'p',
            Self::Household => 'h',
        }
    }
}

impl fmt::Display for Survey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Survey {
    type Err = AcsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "person" => Ok(Self::Person),
            "household" => Ok(Self::Household),
            other => Err(AcsError::Configuration(format!(
                "survey must be \"person\" or \"household\", got \"{other}\""
            ))),
        }
    }
}

/// Per-call options for [`AcsDataSource::get_data`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// USPS state codes to load; `None` means all known states.
    pub states: Option<Vec<String>>,
    /// Subsampling fraction in (0, 1]; 1.0 keeps every row.
    pub density: f64,
    /// Seed for the subsampling draw; same seed and density reproduce the
    /// exact row subset.
    pub random_seed: u64,
    /// Merge household columns onto person rows (person survey only).
    pub join_household: bool,
    /// Allow fetching missing shards through the configured fetcher.
    pub download: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            states: None,
            density: 1.0,
            random_seed: 0,
            join_household: false,
            download: false,
        }
    }
}

/// Data source around PUMS files for a specific year, horizon, and survey.
pub struct AcsDataSource {
    survey_year: u16,
    horizon: Horizon,
    survey: Survey,
    root_dir: PathBuf,
    fetcher: Option<Box<dyn ShardFetcher>>,
}

impl std::fmt::Debug for AcsDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcsDataSource")
            .field("survey_year", &self.survey_year)
            .field("horizon", &self.horizon)
            .field("survey", &self.survey)
            .field("root_dir", &self.root_dir)
            .finish_non_exhaustive()
    }
}

/// First ACS PUMS release year understood by this crate.
const FIRST_PUMS_YEAR: u16 = 2005;
/// Latest release year with a known file layout.
const LAST_PUMS_YEAR: u16 = 2023;

impl AcsDataSource {
    /// Create a data source for a specific year, horizon, and survey type.
    ///
    /// `root_dir` names the local cache root; shards live under
    /// `{root}/{year}/{horizon}/{survey}/`.
    pub fn new(
        survey_year: u16,
        horizon: Horizon,
        survey: Survey,
        root_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        if !(FIRST_PUMS_YEAR..=LAST_PUMS_YEAR).contains(&survey_year) {
            return Err(AcsError::Configuration(format!(
                "survey year must be between {FIRST_PUMS_YEAR} and {LAST_PUMS_YEAR}, got {survey_year}"
            )));
        }
        Ok(Self {
            survey_year,
            horizon,
            survey,
            root_dir: root_dir.into(),
            fetcher: None,
        })
    }

    /// Attach the collaborator used to materialize missing shards.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Box<dyn ShardFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Survey year this source is bound to.
    #[must_use]
    pub const fn survey_year(&self) -> u16 {
        self.survey_year
    }

    /// Horizon this source is bound to.
    #[must_use]
    pub const fn horizon(&self) -> Horizon {
        self.horizon
    }

    /// Survey type this source is bound to.
    #[must_use]
    pub const fn survey(&self) -> Survey {
        self.survey
    }

    /// Cache root directory.
    #[must_use]
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Load the table for this source's key.
    ///
    /// Per-state shards are loaded independently, checked for identical
    /// schemas, and concatenated. With `density < 1.0` a seeded subsample of
    /// `round(density * n)` rows is drawn without replacement. With
    /// `join_household`, household columns are merged onto person rows with
    /// the row count asserted unchanged.
    ///
    /// Identical arguments always produce identical tables.
    pub fn get_data(&self, opts: &FetchOptions) -> Result<RecordBatch> {
        if !(opts.density > 0.0 && opts.density <= 1.0) {
            return Err(AcsError::Configuration(format!(
                "density must be in (0, 1], got {}",
                opts.density
            )));
        }
        if opts.join_household && self.survey != Survey::Person {
            return Err(AcsError::Configuration(
                "join_household requires a person-level data source".to_string(),
            ));
        }

        let state_list = self.resolve_states(opts.states.as_deref())?;
        let data = self.load_survey(self.survey, &state_list, opts.download, None)?;

        let data = if opts.density < 1.0 {
            sample::subsample(&data, opts.density, opts.random_seed)?
        } else {
            data
        };

        if opts.join_household {
            let serials = utils::serial_numbers(&data)?;
            let household =
                self.load_survey(Survey::Household, &state_list, opts.download, Some(&serials))?;
            return join::merge_household(&data, &household);
        }
        Ok(data)
    }

    /// Validate the requested state codes, or fall back to the full vocabulary.
    fn resolve_states(&self, requested: Option<&[String]>) -> Result<Vec<String>> {
        match requested {
            None => Ok(states::all_states()
                .into_iter()
                .map(str::to_string)
                .collect()),
            Some([]) => Err(AcsError::Configuration(
                "state list must not be empty; omit it to load all states".to_string(),
            )),
            Some(list) => {
                for state in list {
                    states::fips_code(state)?;
                }
                Ok(list.to_vec())
            }
        }
    }

    /// Load and concatenate one survey's shards for the given states.
    ///
    /// `serial_filter` restricts rows to the given serial numbers before
    /// concatenation (used for the household side of the join).
    fn load_survey(
        &self,
        survey: Survey,
        state_list: &[String],
        download: bool,
        serial_filter: Option<&FxHashSet<String>>,
    ) -> Result<RecordBatch> {
        // Fetching is sequential (the collaborator owns transport policy);
        // parsing the resolved files is independent per state.
        let mut resolved = Vec::with_capacity(state_list.len());
        for state in state_list {
            let key = ShardKey {
                year: self.survey_year,
                horizon: self.horizon,
                survey,
                state: state.clone(),
            };
            let path = fetch::ensure_local(
                &self.root_dir,
                &key,
                download,
                self.fetcher.as_deref(),
            )?;
            resolved.push((state.clone(), path));
        }

        let per_state = loader::load_state_tables(&resolved, serial_filter)?;
        loader::concat_states(per_state)
    }
}
