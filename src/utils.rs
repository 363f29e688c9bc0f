//! Arrow utility functions shared by the loading and task layers.

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::compute;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use rustc_hash::FxHashSet;

use crate::error::{AcsError, Result};

/// Household serial number column, shared by person and household tables.
pub const SERIAL_COLUMN: &str = "SERIALNO";

/// Look up a named column, failing fast with the missing column named.
pub fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .schema_ref()
        .index_of(name)
        .map(|idx| batch.column(idx))
        .map_err(|_| AcsError::Schema(format!("column {name} not found in table")))
}

/// Extract a named column as `Float64`, with nulls preserved.
///
/// PUMS columns are numeric codes or amounts; whatever physical type the
/// shard reader inferred is normalized here.
pub fn numeric_column(batch: &RecordBatch, name: &str) -> Result<Float64Array> {
    let array = column(batch, name)?;
    let cast = compute::cast(array, &DataType::Float64)
        .map_err(|e| AcsError::Schema(format!("column {name} is not numeric: {e}")))?;
    cast.as_any()
        .downcast_ref::<Float64Array>()
        .cloned()
        .ok_or_else(|| AcsError::Schema(format!("column {name} did not cast to Float64")))
}

/// Extract a named column as `Int64`, with nulls preserved.
pub fn int_column(batch: &RecordBatch, name: &str) -> Result<Int64Array> {
    let array = column(batch, name)?;
    let cast = compute::cast(array, &DataType::Int64)
        .map_err(|e| AcsError::Schema(format!("column {name} is not numeric: {e}")))?;
    cast.as_any()
        .downcast_ref::<Int64Array>()
        .cloned()
        .ok_or_else(|| AcsError::Schema(format!("column {name} did not cast to Int64")))
}

/// Extract a named column as strings. Serial numbers mix digits and letters
/// from 2017 onward, so the shared key space is handled as text throughout.
pub fn string_column(batch: &RecordBatch, name: &str) -> Result<StringArray> {
    let array = column(batch, name)?;
    let cast = compute::cast(array, &DataType::Utf8)
        .map_err(|e| AcsError::Schema(format!("column {name} cannot be read as text: {e}")))?;
    cast.as_any()
        .downcast_ref::<StringArray>()
        .cloned()
        .ok_or_else(|| AcsError::Schema(format!("column {name} did not cast to text")))
}

/// Select the given row indices from every column of a batch.
pub fn take_batch(batch: &RecordBatch, indices: &arrow::array::UInt32Array) -> Result<RecordBatch> {
    let taken: Vec<ArrayRef> = batch
        .columns()
        .iter()
        .map(|col| compute::take(col.as_ref(), indices, None))
        .collect::<std::result::Result<_, _>>()?;
    Ok(RecordBatch::try_new(batch.schema(), taken)?)
}

/// Keep only the rows selected by `mask`, treating null mask slots as false.
pub fn filter_batch(batch: &RecordBatch, mask: &BooleanArray) -> Result<RecordBatch> {
    let mask = if mask.null_count() > 0 {
        compute::prep_null_mask_filter(mask)
    } else {
        mask.clone()
    };
    Ok(compute::filter_record_batch(batch, &mask)?)
}

/// Collect the distinct serial numbers present in a table.
pub fn serial_numbers(batch: &RecordBatch) -> Result<FxHashSet<String>> {
    let serials = string_column(batch, SERIAL_COLUMN)?;
    let mut set = FxHashSet::default();
    for i in 0..serials.len() {
        if !serials.is_null(i) {
            set.insert(serials.value(i).to_string());
        }
    }
    Ok(set)
}

/// Keep only rows whose serial number is in the given set.
pub fn filter_by_serials(batch: &RecordBatch, keep: &FxHashSet<String>) -> Result<RecordBatch> {
    let serials = string_column(batch, SERIAL_COLUMN)?;
    let mut mask = Vec::with_capacity(serials.len());
    for i in 0..serials.len() {
        mask.push(!serials.is_null(i) && keep.contains(serials.value(i)));
    }
    filter_batch(batch, &BooleanArray::from(mask))
}
