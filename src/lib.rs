//! A Rust library for loading American Community Survey (ACS) Public Use
//! Microdata Sample (PUMS) data and defining supervised-learning benchmark
//! tasks over it.
//!
//! Two layers:
//! - [`AcsDataSource`] resolves a (year, horizon, survey) key plus a set of
//!   state codes into a single validated Arrow record batch, fetching and
//!   caching raw shards through a [`ShardFetcher`] collaborator, with
//!   deterministic subsampling and an optional person/household join.
//! - [`TaskDefinition`] is a declarative problem specification that turns a
//!   record batch into an aligned `(X, y, group)` triple for fairness
//!   benchmarking. The pre-built ACS tasks live in [`catalog`].

pub mod catalog;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod join;
pub mod loader;
pub mod sample;
pub mod source;
pub mod states;
pub mod task;
pub mod utils;

// Re-export the most common types for easier use
// Core types
pub use error::{AcsError, Result};
pub use fetch::{ShardFetcher, ShardKey};
pub use source::{AcsDataSource, FetchOptions, Horizon, Survey};

// Task abstraction
pub use task::{Feature, LabelRule, Matrix, Postprocess, TaskDefinition};

// Filtering capabilities
pub use filter::Expr;

// Arrow types
pub use arrow::record_batch::RecordBatch;
