//! Row predicates over Arrow record batches
//!
//! An [`Expr`] is evaluated to a `BooleanArray` mask. Comparisons against null
//! values yield null, and null mask entries drop the row, so `Eq` never keeps a
//! null cell.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Int64Array, Scalar, StringArray};
use arrow::compute::kernels::cmp::eq;
use arrow::compute::{and_kleene, cast};
use arrow::record_batch::RecordBatch;

use crate::error::{PipelineError, Result};

/// Represents a filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column equals a literal value
    Eq(String, LiteralValue),

    /// Logical AND of expressions
    And(Vec<Expr>),
}

/// Represents a literal value that can be used in filter expressions
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Integer value
    Int(i64),

    /// String value
    String(String),
}

impl Expr {
    /// Shorthand for `Expr::Eq` with a string literal
    #[must_use]
    pub fn eq_str(column: &str, value: &str) -> Self {
        Self::Eq(column.to_string(), LiteralValue::String(value.to_string()))
    }
}

impl LiteralValue {
    fn to_array(&self) -> ArrayRef {
        match self {
            Self::Int(n) => Arc::new(Int64Array::from(vec![*n])),
            Self::String(s) => Arc::new(StringArray::from(vec![s.as_str()])),
        }
    }
}

/// Evaluates a filter expression against a record batch
pub fn evaluate_expr(batch: &RecordBatch, expr: &Expr) -> Result<BooleanArray> {
    match expr {
        Expr::And(exprs) => {
            let mut result = BooleanArray::from(vec![true; batch.num_rows()]);
            for expr in exprs {
                result = and_kleene(&result, &evaluate_expr(batch, expr)?)?;
            }
            Ok(result)
        }
        Expr::Eq(col_name, literal) => compare(batch, col_name, literal),
    }
}

/// Compare a column against a literal cast to the column's type
fn compare(batch: &RecordBatch, col_name: &str, literal: &LiteralValue) -> Result<BooleanArray> {
    let array = batch
        .column_by_name(col_name)
        .ok_or_else(|| PipelineError::column_not_found("record batch", col_name))?;
    let literal = cast(&literal.to_array(), array.data_type()).map_err(|e| {
        PipelineError::Schema(format!(
            "Cannot compare column {col_name} ({}) with {literal:?}: {e}",
            array.data_type()
        ))
    })?;
    Ok(eq(array, &Scalar::new(literal))?)
}
