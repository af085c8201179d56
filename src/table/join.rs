//! Left outer equi-join

use std::sync::Arc;

use arrow::array::{Array, AsArray, UInt32Array};
use arrow::compute::{cast, take};
use arrow::datatypes::{DataType, Field, Schema};
use rustc_hash::{FxHashMap, FxHashSet};

use super::{Table, rebuild, to_index};
use crate::error::{PipelineError, Result};

impl Table {
    /// Left outer join on `self.left_on == right.right_on`
    ///
    /// Keys are compared as text. Every left row is kept: a row matching `k`
    /// right rows appears `k` times, an unmatched row (or one with a null key)
    /// appears once with nulls in all right columns. Output columns are the
    /// left columns followed by the right columns.
    pub fn left_join(&self, right: &Table, left_on: &str, right_on: &str) -> Result<Table> {
        let left_schema = self.schema();
        let right_schema = right.schema();

        let left_names: FxHashSet<&str> = left_schema
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect();
        if let Some(clash) = right_schema
            .fields()
            .iter()
            .find(|f| left_names.contains(f.name().as_str()))
        {
            return Err(PipelineError::Schema(format!(
                "Joining {} with {} would duplicate column {}",
                self.name(),
                right.name(),
                clash.name()
            )));
        }

        let left_keys = cast(self.column(left_on)?, &DataType::Utf8)?;
        let right_keys = cast(right.column(right_on)?, &DataType::Utf8)?;
        let left_keys = left_keys.as_string::<i32>();
        let right_keys = right_keys.as_string::<i32>();

        let mut index: FxHashMap<&str, Vec<u32>> = FxHashMap::default();
        for (row, key) in right_keys.iter().enumerate() {
            if let Some(key) = key {
                index.entry(key).or_default().push(to_index(row)?);
            }
        }

        let mut left_idx = Vec::with_capacity(left_keys.len());
        let mut right_idx: Vec<Option<u32>> = Vec::with_capacity(left_keys.len());
        for (row, key) in left_keys.iter().enumerate() {
            let row = to_index(row)?;
            match key.and_then(|k| index.get(k)) {
                Some(matches) => {
                    for &m in matches {
                        left_idx.push(row);
                        right_idx.push(Some(m));
                    }
                }
                None => {
                    left_idx.push(row);
                    right_idx.push(None);
                }
            }
        }

        let left_idx = UInt32Array::from(left_idx);
        let right_idx = UInt32Array::from(right_idx);

        let mut fields: Vec<Field> = left_schema.fields().iter().map(|f| f.as_ref().clone()).collect();
        fields.extend(
            right_schema
                .fields()
                .iter()
                .map(|f| f.as_ref().clone().with_nullable(true)),
        );

        let mut columns = Vec::with_capacity(fields.len());
        for col in self.batch().columns() {
            columns.push(take(col.as_ref(), &left_idx, None)?);
        }
        for col in right.batch().columns() {
            columns.push(take(col.as_ref(), &right_idx, None)?);
        }

        let batch = rebuild(Arc::new(Schema::new(fields)), columns, left_idx.len())?;
        Ok(Table::new(self.name(), batch))
    }
}
