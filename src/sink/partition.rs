//! Hive-style partition directories (`col=value`)

use std::collections::BTreeMap;
use std::fmt::Write as _;

use arrow::array::{Array, AsArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;

use crate::error::Result;
use crate::table::{Table, to_index};

/// Directory name used for null or empty partition values
pub const DEFAULT_PARTITION_NAME: &str = "__HIVE_DEFAULT_PARTITION__";

/// Percent-escape characters that are unsafe in a partition directory name
#[must_use]
pub fn escape_path_name(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if needs_escaping(c) {
            let _ = write!(escaped, "%{:02X}", c as u32);
        } else {
            escaped.push(c);
        }
    }
    escaped
}

fn needs_escaping(c: char) -> bool {
    matches!(
        c,
        '\u{01}'..='\u{1F}'
            | '"'
            | '#'
            | '%'
            | '\''
            | '*'
            | '/'
            | ':'
            | '='
            | '?'
            | '\\'
            | '\u{7F}'
            | '{'
            | '['
            | ']'
            | '^'
    )
}

/// Path segment for one partition column value
#[must_use]
pub fn partition_segment(column: &str, value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => format!("{}={}", escape_path_name(column), escape_path_name(v)),
        _ => format!("{}={DEFAULT_PARTITION_NAME}", escape_path_name(column)),
    }
}

/// Group row indices by their partition directory segments
///
/// Keys are the nested directory names in `columns` order; groups are sorted
/// by key so output layout is deterministic.
pub fn group_rows(table: &Table, columns: &[&str]) -> Result<BTreeMap<Vec<String>, Vec<u32>>> {
    let values = columns
        .iter()
        .map(|c| Ok(cast(table.column(c)?, &DataType::Utf8)?))
        .collect::<Result<Vec<_>>>()?;
    let values: Vec<_> = values.iter().map(|v| v.as_string::<i32>()).collect();

    let mut groups: BTreeMap<Vec<String>, Vec<u32>> = BTreeMap::new();
    for row in 0..table.num_rows() {
        let key = columns
            .iter()
            .zip(&values)
            .map(|(column, array)| {
                let value = array.is_valid(row).then(|| array.value(row));
                partition_segment(column, value)
            })
            .collect();
        groups.entry(key).or_default().push(to_index(row)?);
    }
    Ok(groups)
}
