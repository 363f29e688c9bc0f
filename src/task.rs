//! Declarative benchmark task definitions.
//!
//! A [`TaskDefinition`] binds a feature column set, a target column with a
//! label rule, a protected-group column, a row-level pre-filter, and a
//! whole-matrix postprocess into one deterministic
//! `table -> (X, y, group)` operation, plus the inverse
//! [`reconstruct`](TaskDefinition::reconstruct) used for round-tripping a
//! dataset to storage. Definitions are plain values: constructed once,
//! immutable, no I/O.

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::error::{AcsError, Result};
use crate::filter::Expr;
use crate::utils;

/// Per-column value transform, applied element-wise after extraction.
pub type ValueTransform = fn(f64) -> f64;

/// One feature column, optionally paired with a value transform
/// (identity when absent).
#[derive(Debug, Clone)]
pub struct Feature {
    /// Source column name
    pub name: String,
    /// Element-wise transform; `None` passes raw values through
    pub transform: Option<ValueTransform>,
}

impl Feature {
    /// A feature that passes the named column through unchanged.
    #[must_use]
    pub fn raw(name: &str) -> Self {
        Self {
            name: name.to_string(),
            transform: None,
        }
    }

    /// A feature with an element-wise transform.
    #[must_use]
    pub fn transformed(name: &str, transform: ValueTransform) -> Self {
        Self {
            name: name.to_string(),
            transform: Some(transform),
        }
    }
}

/// Rule turning the raw target column into boolean labels.
///
/// Null target values never satisfy a rule. All catalog targets are binary
/// thresholds or code equalities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LabelRule {
    /// Label is true when the raw value exceeds the threshold
    GreaterThan(f64),
    /// Label is true when the raw value is below the threshold
    LessThan(f64),
    /// Label is true when the raw value equals the code
    Equals(f64),
}

impl LabelRule {
    fn apply(self, value: Option<f64>) -> bool {
        let Some(v) = value else { return false };
        match self {
            Self::GreaterThan(t) => v > t,
            Self::LessThan(t) => v < t,
            #[allow(clippy::float_cmp)]
            Self::Equals(c) => v == c,
        }
    }
}

/// Whole-matrix transform applied after feature assembly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Postprocess {
    /// Leave the matrix as extracted
    Identity,
    /// Standardize each column to zero mean and unit variance
    Scale,
    /// Replace missing values with a sentinel, then standardize
    ImputeThenScale {
        /// Sentinel substituted for missing values before scaling
        fill: f64,
    },
}

impl Postprocess {
    /// Apply the transform to every column of the matrix in place.
    ///
    /// A plain [`Scale`](Self::Scale) refuses columns with missing values:
    /// one `NaN` would poison the column mean and silently corrupt every
    /// entry. Tasks over columns that may be null use
    /// [`ImputeThenScale`](Self::ImputeThenScale).
    pub fn apply(self, matrix: &mut Matrix) -> Result<()> {
        match self {
            Self::Identity => {}
            Self::Scale => {
                // Check every column before touching any, so a failure
                // leaves the matrix as extracted.
                for (name, column) in matrix.names.iter().zip(&matrix.columns) {
                    if column.iter().any(|v| v.is_nan()) {
                        return Err(AcsError::Schema(format!(
                            "column {name} contains missing values; scaling without imputation would corrupt it"
                        )));
                    }
                }
                for column in &mut matrix.columns {
                    scale(column);
                }
            }
            Self::ImputeThenScale { fill } => {
                for column in &mut matrix.columns {
                    for v in column.iter_mut() {
                        if v.is_nan() {
                            *v = fill;
                        }
                    }
                    scale(column);
                }
            }
        }
        Ok(())
    }
}

/// Center a column to zero mean and unit variance. Constant columns are
/// centered only.
fn scale(column: &mut [f64]) {
    if column.is_empty() {
        return;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = column.len() as f64;
    let mean = column.iter().sum::<f64>() / n;
    let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = var.sqrt();
    for v in column.iter_mut() {
        *v -= mean;
        if std > 0.0 {
            *v /= std;
        }
    }
}

/// Column-major feature matrix with named columns.
///
/// Missing values are `NaN` until a postprocess imputes them.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl Matrix {
    /// Build a matrix from named columns of equal length.
    pub fn new(names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(AcsError::Integrity(format!(
                "matrix has {} names for {} columns",
                names.len(),
                columns.len()
            )));
        }
        if let Some(first) = columns.first() {
            for (name, column) in names.iter().zip(&columns) {
                if column.len() != first.len() {
                    return Err(AcsError::Integrity(format!(
                        "matrix column {name} has {} rows, expected {}",
                        column.len(),
                        first.len()
                    )));
                }
            }
        }
        Ok(Self { names, columns })
    }

    /// Number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// Number of feature columns.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Column names, in declaration order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Values of the named column.
    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.columns[idx].as_slice())
            .ok_or_else(|| AcsError::Schema(format!("column {name} not found in matrix")))
    }

    /// Values of the column at `idx`.
    #[must_use]
    pub fn column_at(&self, idx: usize) -> &[f64] {
        &self.columns[idx]
    }
}

/// A reusable, declarative benchmark problem specification.
#[derive(Debug, Clone)]
pub struct TaskDefinition {
    name: &'static str,
    features: Vec<Feature>,
    target: String,
    target_transform: LabelRule,
    group: String,
    preprocess: Expr,
    postprocess: Postprocess,
}

impl TaskDefinition {
    /// Bind the pieces of a task into one definition.
    #[must_use]
    pub fn new(
        name: &'static str,
        features: Vec<Feature>,
        target: &str,
        target_transform: LabelRule,
        group: &str,
        preprocess: Expr,
        postprocess: Postprocess,
    ) -> Self {
        Self {
            name,
            features,
            target: target.to_string(),
            target_transform,
            group: group.to_string(),
            preprocess,
            postprocess,
        }
    }

    /// Task name, e.g. `"income"`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Declared feature column names, in output order.
    #[must_use]
    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    /// Target column name.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Protected-group column name.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Row pre-filter applied before extraction.
    #[must_use]
    pub const fn preprocess(&self) -> &Expr {
        &self.preprocess
    }

    /// Extract `(X, y, group)` from a raw table.
    ///
    /// The pre-filter runs first; features, label, and group are all read
    /// from the same filtered table, so the three outputs are row-aligned by
    /// construction. `X` columns follow declaration order; the postprocess
    /// runs on the assembled matrix.
    pub fn features_and_target(
        &self,
        table: &RecordBatch,
    ) -> Result<(Matrix, Vec<bool>, Vec<i64>)> {
        let filtered = self.preprocess.apply(table)?;

        let mut names = Vec::with_capacity(self.features.len());
        let mut columns = Vec::with_capacity(self.features.len());
        for feature in &self.features {
            let values = float_values(&filtered, &feature.name)?;
            let values = match feature.transform {
                Some(transform) => values.into_iter().map(transform).collect(),
                None => values,
            };
            names.push(feature.name.clone());
            columns.push(values);
        }
        let mut x = Matrix::new(names, columns)?;
        self.postprocess.apply(&mut x)?;

        let target = utils::numeric_column(&filtered, &self.target)?;
        let y: Vec<bool> = target
            .iter()
            .map(|v| self.target_transform.apply(v))
            .collect();

        let group_col = utils::int_column(&filtered, &self.group)?;
        // Raw group codes; a null group value maps to the -1 sentinel.
        let group: Vec<i64> = group_col.iter().map(|v| v.unwrap_or(-1)).collect();

        Ok((x, y, group))
    }

    /// Rebuild a table from an extracted `(X, y, group)` triple.
    ///
    /// Feature columns keep their original names, the target column holds
    /// `y`, and the group column holds `group` unless it is already a
    /// feature. Row order is exactly the forward pass's. This is a
    /// best-effort denormalization: postprocess and label thresholding are
    /// not inverted.
    pub fn reconstruct(&self, x: &Matrix, y: &[bool], group: &[i64]) -> Result<RecordBatch> {
        if x.num_rows() != y.len() || y.len() != group.len() {
            return Err(AcsError::Integrity(format!(
                "misaligned rows: X has {}, y has {}, group has {}",
                x.num_rows(),
                y.len(),
                group.len()
            )));
        }
        let expected = self.feature_names();
        let matches = x.names().len() == expected.len()
            && x.names().iter().zip(&expected).all(|(a, b)| a == b);
        if !matches {
            return Err(AcsError::Schema(format!(
                "matrix columns do not match task {}: expected [{}], got [{}]",
                self.name,
                self.feature_names().join(", "),
                x.names().join(", ")
            )));
        }

        let mut fields = Vec::with_capacity(x.num_columns() + 2);
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(x.num_columns() + 2);
        for (name, idx) in x.names().iter().zip(0..) {
            fields.push(Field::new(name, DataType::Float64, true));
            columns.push(Arc::new(Float64Array::from_iter_values(
                x.column_at(idx).iter().copied(),
            )));
        }
        fields.push(Field::new(&self.target, DataType::Boolean, false));
        columns.push(Arc::new(BooleanArray::from(y.to_vec())));
        if !self.features.iter().any(|f| f.name == self.group) {
            fields.push(Field::new(&self.group, DataType::Int64, false));
            columns.push(Arc::new(Int64Array::from(group.to_vec())));
        }

        let schema = Arc::new(Schema::new(fields));
        Ok(RecordBatch::try_new(schema, columns)?)
    }
}

/// Extract a column as `f64` values with nulls mapped to `NaN`.
fn float_values(batch: &RecordBatch, name: &str) -> Result<Vec<f64>> {
    let array = utils::numeric_column(batch, name)?;
    Ok(array
        .iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}
