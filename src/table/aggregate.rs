//! Group-by aggregation

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Float64Type, Schema};
use rustc_hash::FxHashMap;

use super::{Table, rebuild};
use crate::error::Result;

#[derive(Debug, Default)]
struct MeanState {
    sum: f64,
    count: usize,
}

impl Table {
    /// Average `value` per distinct `key`
    ///
    /// The key is compared as text and a null key forms its own group. Null
    /// values are ignored; a group with no non-null value averages to null.
    /// Groups come out in first-seen order.
    pub fn group_mean(
        &self,
        key: &str,
        value: &str,
        key_alias: &str,
        value_alias: &str,
    ) -> Result<Table> {
        let keys = cast(self.column(key)?, &DataType::Utf8)?;
        let values = cast(self.column(value)?, &DataType::Float64)?;
        let keys = keys.as_string::<i32>();
        let values = values.as_primitive::<Float64Type>();

        let mut slots: FxHashMap<Option<&str>, usize> = FxHashMap::default();
        let mut groups: Vec<(Option<&str>, MeanState)> = Vec::new();

        for (key, value) in keys.iter().zip(values.iter()) {
            let slot = *slots.entry(key).or_insert_with(|| {
                groups.push((key, MeanState::default()));
                groups.len() - 1
            });
            if let Some(v) = value {
                let state = &mut groups[slot].1;
                state.sum += v;
                state.count += 1;
            }
        }

        let group_keys: StringArray = groups.iter().map(|(k, _)| *k).collect();
        let means: Float64Array = groups
            .iter()
            .map(|(_, state)| (state.count > 0).then(|| state.sum / state.count as f64))
            .collect();

        let schema = Arc::new(Schema::new(vec![
            Field::new(key_alias, DataType::Utf8, true),
            Field::new(value_alias, DataType::Float64, true),
        ]));
        let columns: Vec<ArrayRef> = vec![Arc::new(group_keys), Arc::new(means)];
        let batch = rebuild(schema, columns, groups.len())?;
        Ok(Table::new(self.name(), batch))
    }
}
