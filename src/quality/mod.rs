//! Data-quality gate run over every produced table
//!
//! Two checks per table, in order: the table must not be empty, and every row
//! must be distinct. The first failing check aborts the whole gate.

use crate::error::{QualityError, Result};
use crate::pipeline::TableRegistry;
use crate::table::Table;

/// Outcome of the checks for one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityReport {
    /// Registry name of the table
    pub table_name: String,
    /// Total rows
    pub row_count: usize,
    /// Fully distinct rows
    pub distinct_rows: usize,
}

/// Run both checks against one table
pub fn check_data(table: &Table, table_name: &str) -> Result<QualityReport> {
    let row_count = table.num_rows();

    empty_check(table_name, row_count)?;
    let distinct_rows = unique_check(table, table_name, row_count)?;

    Ok(QualityReport {
        table_name: table_name.to_string(),
        row_count,
        distinct_rows,
    })
}

/// Fail if the table has no rows
pub fn empty_check(table_name: &str, row_count: usize) -> std::result::Result<(), QualityError> {
    if row_count == 0 {
        return Err(QualityError::EmptyTable {
            table_name: table_name.to_string(),
            row_count,
        });
    }
    log::info!(
        "Empty check passed. Table: {table_name} is not empty. There are {row_count} rows."
    );
    Ok(())
}

/// Fail unless every row is distinct; returns the distinct row count
pub fn unique_check(table: &Table, table_name: &str, row_count: usize) -> Result<usize> {
    let distinct_rows = table.distinct_count()?;
    if distinct_rows != row_count {
        return Err(QualityError::DuplicateRows {
            table_name: table_name.to_string(),
            total_rows: row_count,
            distinct_rows,
        }
        .into());
    }
    log::info!("Unique check passed. Table: {table_name} has {distinct_rows} unique rows.");
    Ok(distinct_rows)
}

/// Check every registered table in registration order, stopping at the first failure
pub fn run_checks(registry: &TableRegistry) -> Result<Vec<QualityReport>> {
    registry
        .iter()
        .map(|(name, table)| {
            log::info!("Starting quality checks");
            let report = check_data(table, name)?;
            log::info!("Quality checks complete");
            Ok(report)
        })
        .collect()
}
