//! Expression-based row filtering for PUMS tables.
//!
//! Task pre-filters are declarative [`Expr`] values evaluated against Arrow
//! record batches. Because an expression can only select rows, a filter can
//! never add or modify data, and applying it twice equals applying it once.

use std::collections::HashSet;

use arrow::array::{BooleanArray, Float64Array};
use arrow::compute::kernels::boolean::{and, not, or};
use arrow::compute::kernels::cmp::{eq, gt, gt_eq, lt, lt_eq, neq};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::utils;

/// A row filter over numeric PUMS columns.
///
/// Comparisons are against `f64` literals; columns are normalized to
/// `Float64` before evaluation, so integer-coded categorical columns compare
/// as expected. Rows where the compared value is null never match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Column is greater than a literal value
    Gt(String, f64),
    /// Column is greater than or equal to a literal value
    GtEq(String, f64),
    /// Column is less than a literal value
    Lt(String, f64),
    /// Column is less than or equal to a literal value
    LtEq(String, f64),
    /// Column equals a literal value
    Eq(String, f64),
    /// Column does not equal a literal value
    NotEq(String, f64),
    /// Column is in a set of values
    In(String, Vec<f64>),
    /// Column is not null
    IsNotNull(String),
    /// Logical AND of expressions
    And(Vec<Expr>),
    /// Logical OR of expressions
    Or(Vec<Expr>),
    /// Logical NOT of an expression
    Not(Box<Expr>),
    /// Always evaluates to true
    AlwaysTrue,
}

impl Expr {
    /// Returns a set of all column names required by this expression
    #[must_use]
    pub fn required_columns(&self) -> HashSet<String> {
        let mut columns = HashSet::new();
        self.collect_required_columns(&mut columns);
        columns
    }

    fn collect_required_columns(&self, columns: &mut HashSet<String>) {
        match self {
            Self::Gt(col, _)
            | Self::GtEq(col, _)
            | Self::Lt(col, _)
            | Self::LtEq(col, _)
            | Self::Eq(col, _)
            | Self::NotEq(col, _)
            | Self::In(col, _)
            | Self::IsNotNull(col) => {
                columns.insert(col.clone());
            }
            Self::And(exprs) | Self::Or(exprs) => {
                for expr in exprs {
                    expr.collect_required_columns(columns);
                }
            }
            Self::Not(expr) => expr.collect_required_columns(columns),
            Self::AlwaysTrue => {}
        }
    }

    /// Evaluate the expression against a record batch, producing a row mask.
    ///
    /// A named column absent from the batch is a schema error naming it.
    pub fn evaluate(&self, batch: &RecordBatch) -> Result<BooleanArray> {
        match self {
            Self::AlwaysTrue => Ok(BooleanArray::from(vec![true; batch.num_rows()])),

            Self::Gt(col, value) => compare(batch, col, *value, gt),
            Self::GtEq(col, value) => compare(batch, col, *value, gt_eq),
            Self::Lt(col, value) => compare(batch, col, *value, lt),
            Self::LtEq(col, value) => compare(batch, col, *value, lt_eq),
            Self::Eq(col, value) => compare(batch, col, *value, eq),
            Self::NotEq(col, value) => compare(batch, col, *value, neq),

            Self::In(col, values) => {
                // Fold into per-value equality; set sizes here are tiny.
                let mut mask = BooleanArray::from(vec![false; batch.num_rows()]);
                for value in values {
                    let this = compare(batch, col, *value, eq)?;
                    mask = or(&mask, &this)?;
                }
                Ok(mask)
            }

            Self::IsNotNull(col) => {
                let array = utils::column(batch, col)?;
                Ok(arrow::compute::is_not_null(array.as_ref())?)
            }

            Self::And(exprs) => {
                let mut mask = BooleanArray::from(vec![true; batch.num_rows()]);
                for expr in exprs {
                    mask = and(&mask, &expr.evaluate(batch)?)?;
                }
                Ok(mask)
            }

            Self::Or(exprs) => {
                let mut mask = BooleanArray::from(vec![false; batch.num_rows()]);
                for expr in exprs {
                    mask = or(&mask, &expr.evaluate(batch)?)?;
                }
                Ok(mask)
            }

            Self::Not(expr) => Ok(not(&expr.evaluate(batch)?)?),
        }
    }

    /// Keep the rows matching this expression.
    pub fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let mask = self.evaluate(batch)?;
        utils::filter_batch(batch, &mask)
    }
}

type CmpKernel = fn(
    &dyn arrow::array::Datum,
    &dyn arrow::array::Datum,
) -> std::result::Result<BooleanArray, arrow::error::ArrowError>;

fn compare(batch: &RecordBatch, col: &str, value: f64, kernel: CmpKernel) -> Result<BooleanArray> {
    let column = utils::numeric_column(batch, col)?;
    let literal = Float64Array::new_scalar(value);
    Ok(kernel(&column, &literal)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("AGEP", DataType::Int64, true),
            Field::new("ESR", DataType::Int64, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![
                    Some(15),
                    Some(30),
                    None,
                    Some(70),
                ])),
                Arc::new(Int64Array::from(vec![Some(1), Some(2), Some(1), Some(6)])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn comparison_drops_null_rows() {
        let kept = Expr::Gt("AGEP".into(), 16.0).apply(&batch()).unwrap();
        assert_eq!(kept.num_rows(), 2);
    }

    #[test]
    fn and_or_not_compose() {
        let expr = Expr::And(vec![
            Expr::Gt("AGEP".into(), 16.0),
            Expr::Not(Box::new(Expr::Eq("ESR".into(), 6.0))),
        ]);
        assert_eq!(expr.apply(&batch()).unwrap().num_rows(), 1);

        let expr = Expr::Or(vec![
            Expr::Eq("ESR".into(), 1.0),
            Expr::Eq("ESR".into(), 2.0),
        ]);
        assert_eq!(expr.apply(&batch()).unwrap().num_rows(), 3);
    }

    #[test]
    fn in_matches_value_set() {
        let expr = Expr::In("ESR".into(), vec![1.0, 6.0]);
        assert_eq!(expr.apply(&batch()).unwrap().num_rows(), 3);
    }

    #[test]
    fn missing_column_names_it() {
        let err = Expr::Gt("NOPE".into(), 1.0).apply(&batch()).unwrap_err();
        assert!(err.to_string().contains("NOPE"));
    }

    #[test]
    fn always_true_keeps_everything() {
        assert_eq!(Expr::AlwaysTrue.apply(&batch()).unwrap().num_rows(), 4);
    }
}
