//! Shard file loading: per-state table reading and concatenation.

use std::fs::File;
use std::io::Seek;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::error::{AcsError, Result};
use crate::utils;

/// Number of rows the CSV reader scans to infer column types. The whole file
/// is scanned so sparse columns that only carry values late in the file still
/// type correctly.
const INFER_ROWS: Option<usize> = None;

/// Read one decompressed shard into a single record batch.
///
/// A `.parquet` shard is a cached conversion of the published CSV; anything
/// else is read as CSV with header and inferred types.
pub fn load_table(path: &Path) -> Result<RecordBatch> {
    if path.extension().is_some_and(|ext| ext == "parquet") {
        load_parquet(path)
    } else {
        load_csv(path)
    }
}

fn load_parquet(path: &Path) -> Result<RecordBatch> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    if batches.is_empty() {
        return Ok(RecordBatch::new_empty(schema));
    }
    Ok(concat_batches(&schema, &batches)?)
}

fn load_csv(path: &Path) -> Result<RecordBatch> {
    let mut file = File::open(path)?;
    let format = Format::default().with_header(true);
    let (schema, _) = format.infer_schema(&mut file, INFER_ROWS)?;
    file.rewind()?;

    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .build(file)?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    if batches.is_empty() {
        return Ok(RecordBatch::new_empty(schema));
    }
    Ok(concat_batches(&schema, &batches)?)
}

/// Load the resolved shard files in parallel, one table per state.
///
/// Shards are logically independent; results are merged afterwards at a
/// single point by [`concat_states`]. `serial_filter` restricts each table
/// to rows whose serial number is in the set.
pub fn load_state_tables(
    resolved: &[(String, PathBuf)],
    serial_filter: Option<&FxHashSet<String>>,
) -> Result<Vec<(String, RecordBatch)>> {
    resolved
        .par_iter()
        .map(|(state, path)| {
            let table = load_table(path)?;
            log::debug!(
                "Loaded {} rows for state {state} from {}",
                table.num_rows(),
                path.display()
            );
            let table = match serial_filter {
                Some(keep) => utils::filter_by_serials(&table, keep)?,
                None => table,
            };
            Ok((state.clone(), table))
        })
        .collect()
}

/// Concatenate per-state tables into one, requiring identical schemas.
///
/// Divergent schemas across states abort the whole call with both state
/// codes and the differing fields named.
pub fn concat_states(per_state: Vec<(String, RecordBatch)>) -> Result<RecordBatch> {
    let Some((first_state, first)) = per_state.first() else {
        return Err(AcsError::Configuration(
            "no state tables to concatenate".to_string(),
        ));
    };
    let schema = first.schema();

    for (state, table) in &per_state[1..] {
        if table.schema() != schema {
            let expected: FxHashSet<_> = schema.fields().iter().collect();
            let found: FxHashSet<_> = table.schema_ref().fields().iter().collect();
            let diff = expected
                .symmetric_difference(&found)
                .map(|f| format!("{} ({})", f.name(), f.data_type()))
                .sorted()
                .join(", ");
            return Err(AcsError::Schema(format!(
                "state {state} shard schema differs from state {first_state}: {diff}"
            )));
        }
    }

    let total: usize = per_state.iter().map(|(_, t)| t.num_rows()).sum();
    log::info!(
        "Concatenating {} state tables, {total} rows total",
        per_state.len()
    );
    let batches: Vec<&RecordBatch> = per_state.iter().map(|(_, t)| t).collect();
    Ok(concat_batches(&schema, batches)?)
}
