//! Person/household merge on the shared serial number.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, UInt32Array};
use arrow::compute;
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{AcsError, Result};
use crate::utils::{self, SERIAL_COLUMN};

/// Merge household columns onto person rows, joined on serial number.
///
/// Only household columns not already present in the person schema are
/// appended. One household row maps to many person rows, so the join must be
/// injective on the household side and must preserve the person row count
/// exactly; any mismatch is an integrity violation with no recovery path.
pub fn merge_household(person: &RecordBatch, household: &RecordBatch) -> Result<RecordBatch> {
    let orig_len = person.num_rows();

    // Household side: serial -> row index, rejecting duplicate serials.
    let household_serials = utils::string_column(household, SERIAL_COLUMN)?;
    let mut by_serial: FxHashMap<&str, u32> = FxHashMap::default();
    by_serial.reserve(household_serials.len());
    for i in 0..household_serials.len() {
        if household_serials.is_null(i) {
            continue;
        }
        let serial = household_serials.value(i);
        #[allow(clippy::cast_possible_truncation)]
        if by_serial.insert(serial, i as u32).is_some() {
            return Err(AcsError::Integrity(format!(
                "household table has duplicate serial number {serial}"
            )));
        }
    }

    // Person side: household row index per person row.
    let person_serials = utils::string_column(person, SERIAL_COLUMN)?;
    let mut indices = Vec::with_capacity(orig_len);
    for i in 0..person_serials.len() {
        if person_serials.is_null(i) {
            continue;
        }
        if let Some(&idx) = by_serial.get(person_serials.value(i)) {
            indices.push(idx);
        }
    }
    if indices.len() != orig_len {
        return Err(AcsError::Integrity(format!(
            "lengths do not match after household join: {} vs {orig_len}",
            indices.len()
        )));
    }
    let indices = UInt32Array::from(indices);

    // Append household columns the person table does not already have.
    let person_columns: FxHashSet<&str> = person
        .schema_ref()
        .fields()
        .iter()
        .map(|f| f.name().as_str())
        .collect();

    let mut fields: Vec<_> = person.schema_ref().fields().iter().cloned().collect();
    let mut columns: Vec<ArrayRef> = person.columns().to_vec();
    for (field, column) in household
        .schema_ref()
        .fields()
        .iter()
        .zip(household.columns())
    {
        if person_columns.contains(field.name().as_str()) {
            continue;
        }
        fields.push(field.clone());
        columns.push(compute::take(column.as_ref(), &indices, None)?);
    }

    log::info!(
        "Joined {} household columns onto {orig_len} person rows",
        columns.len() - person.num_columns()
    );
    let schema = Arc::new(Schema::new(fields));
    Ok(RecordBatch::try_new(schema, columns)?)
}
