//! Row filtering for Arrow record batches
//!
//! Expressions in [`expr`] produce boolean masks; [`filter_record_batch`]
//! applies a mask to every column of a batch.

pub mod expr;

use arrow::array::{Array, BooleanArray};
use arrow::compute::filter_record_batch as arrow_filter_record_batch;
use arrow::record_batch::RecordBatch;

use crate::error::{PipelineError, Result};

pub use expr::{Expr, LiteralValue, evaluate_expr};

/// Filter a record batch based on a boolean mask
///
/// Rows where the mask is false or null are dropped.
pub fn filter_record_batch(batch: &RecordBatch, mask: &BooleanArray) -> Result<RecordBatch> {
    if batch.num_rows() != mask.len() {
        return Err(PipelineError::Schema(format!(
            "Mask length ({}) doesn't match batch row count ({})",
            mask.len(),
            batch.num_rows()
        )));
    }

    Ok(arrow_filter_record_batch(batch, mask)?)
}
