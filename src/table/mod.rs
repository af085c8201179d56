//! In-memory tables and the transformation primitives the pipeline is built on
//!
//! A [`Table`] is a named, immutable Arrow record batch. Every operation
//! returns a new table; nothing is modified in place.

mod aggregate;
mod join;

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, UInt32Array};
use arrow::compute::{cast, concat_batches, take};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use arrow::row::{RowConverter, SortField};
use rustc_hash::FxHashSet;

use crate::error::{PipelineError, Result};
use crate::filter::{Expr, evaluate_expr, filter_record_batch};

/// A named record set
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    batch: RecordBatch,
}

impl Table {
    /// Wrap a record batch
    pub fn new(name: impl Into<String>, batch: RecordBatch) -> Self {
        Self {
            name: name.into(),
            batch,
        }
    }

    /// An empty table with the given schema
    pub fn empty(name: impl Into<String>, schema: SchemaRef) -> Self {
        Self::new(name, RecordBatch::new_empty(schema))
    }

    /// Concatenate batches sharing `schema` into one table
    pub fn from_batches(
        name: impl Into<String>,
        schema: SchemaRef,
        batches: &[RecordBatch],
    ) -> Result<Self> {
        let batch = concat_batches(&schema, batches)?;
        Ok(Self::new(name, batch))
    }

    /// Table name, used in errors and logs
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Same data under a different name
    #[must_use]
    pub fn with_name(self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            batch: self.batch,
        }
    }

    #[must_use]
    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    /// The underlying record batch
    #[must_use]
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Column names in schema order
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Result<&ArrayRef> {
        self.batch
            .column_by_name(name)
            .ok_or_else(|| PipelineError::column_not_found(&self.name, name))
    }

    fn field(&self, name: &str) -> Result<(usize, Arc<Field>)> {
        let schema = self.batch.schema();
        let idx = schema
            .index_of(name)
            .map_err(|_| PipelineError::column_not_found(&self.name, name))?;
        Ok((idx, schema.fields()[idx].clone()))
    }

    /// Keep only the named columns, in the given order
    pub fn select(&self, columns: &[&str]) -> Result<Self> {
        let pairs: Vec<(&str, &str)> = columns.iter().map(|c| (*c, *c)).collect();
        self.select_as(&pairs)
    }

    /// Keep and rename columns: each pair is `(source, alias)`
    pub fn select_as(&self, columns: &[(&str, &str)]) -> Result<Self> {
        let mut fields = Vec::with_capacity(columns.len());
        let mut arrays = Vec::with_capacity(columns.len());
        for (source, alias) in columns {
            let (idx, field) = self.field(source)?;
            fields.push(field.as_ref().clone().with_name(*alias));
            arrays.push(self.batch.column(idx).clone());
        }
        let batch = rebuild(Arc::new(Schema::new(fields)), arrays, self.num_rows())?;
        Ok(Self::new(self.name.clone(), batch))
    }

    /// Keep the rows matching an expression
    pub fn filter(&self, expr: &Expr) -> Result<Self> {
        let mask = evaluate_expr(&self.batch, expr)?;
        self.filter_mask(&mask)
    }

    /// Keep the rows where `mask` is true
    pub fn filter_mask(&self, mask: &BooleanArray) -> Result<Self> {
        let batch = filter_record_batch(&self.batch, mask)?;
        Ok(Self::new(self.name.clone(), batch))
    }

    /// Replace a column (keeping its position) or append a new one
    pub fn with_column(&self, name: &str, array: ArrayRef) -> Result<Self> {
        if array.len() != self.num_rows() {
            return Err(PipelineError::Schema(format!(
                "Column {name} has {} values but table {} has {} rows",
                array.len(),
                self.name,
                self.num_rows()
            )));
        }

        let schema = self.batch.schema();
        let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
        let mut arrays = self.batch.columns().to_vec();
        let field = Field::new(name, array.data_type().clone(), true);

        match schema.index_of(name) {
            Ok(idx) => {
                fields[idx] = field;
                arrays[idx] = array;
            }
            Err(_) => {
                fields.push(field);
                arrays.push(array);
            }
        }

        let batch = rebuild(Arc::new(Schema::new(fields)), arrays, self.num_rows())?;
        Ok(Self::new(self.name.clone(), batch))
    }

    /// Cast a column; values that cannot be represented become null
    pub fn cast_column(&self, name: &str, to: &DataType) -> Result<Self> {
        let casted = cast(self.column(name)?, to)?;
        self.with_column(name, casted)
    }

    /// Gather rows by index; null indices produce all-null rows
    pub fn take(&self, indices: &UInt32Array) -> Result<Self> {
        let batch = take_batch(&self.batch, indices)?;
        Ok(Self::new(self.name.clone(), batch))
    }

    /// Remove exact duplicate rows, keeping the first occurrence
    ///
    /// Nulls compare equal to each other for this purpose.
    pub fn drop_duplicates(&self) -> Result<Self> {
        let keep = first_occurrences(&self.batch)?;
        if keep.len() == self.num_rows() {
            return Ok(self.clone());
        }
        self.take(&UInt32Array::from(keep))
    }

    /// Number of fully distinct rows
    pub fn distinct_count(&self) -> Result<usize> {
        Ok(first_occurrences(&self.batch)?.len())
    }
}

/// Indices of the first occurrence of every distinct row
fn first_occurrences(batch: &RecordBatch) -> Result<Vec<u32>> {
    if batch.num_columns() == 0 {
        return Ok(if batch.num_rows() == 0 { Vec::new() } else { vec![0] });
    }

    let sort_fields = batch
        .schema()
        .fields()
        .iter()
        .map(|f| SortField::new(f.data_type().clone()))
        .collect();
    let converter = RowConverter::new(sort_fields)?;
    let rows = converter.convert_columns(batch.columns())?;

    let mut seen = FxHashSet::default();
    let mut keep = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        if seen.insert(row) {
            keep.push(to_index(idx)?);
        }
    }
    Ok(keep)
}

pub(crate) fn to_index(idx: usize) -> Result<u32> {
    u32::try_from(idx)
        .map_err(|_| PipelineError::Schema(format!("Row index {idx} exceeds u32 range")))
}

pub(crate) fn take_batch(batch: &RecordBatch, indices: &UInt32Array) -> Result<RecordBatch> {
    let columns = batch
        .columns()
        .iter()
        .map(|col| take(col.as_ref(), indices, None))
        .collect::<arrow::error::Result<Vec<_>>>()?;
    rebuild(batch.schema(), columns, indices.len())
}

/// Build a batch, keeping the row count even when there are no columns
pub(crate) fn rebuild(
    schema: SchemaRef,
    columns: Vec<ArrayRef>,
    row_count: usize,
) -> Result<RecordBatch> {
    let options = RecordBatchOptions::new().with_row_count(Some(row_count));
    Ok(RecordBatch::try_new_with_options(schema, columns, &options)?)
}
