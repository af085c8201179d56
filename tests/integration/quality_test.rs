use i94_elt::quality::run_checks;
use i94_elt::{PipelineError, QualityError, Table, TableRegistry};
use serde::Serialize;

use crate::utils::to_batch;

#[derive(Serialize)]
struct Country {
    country_cd: String,
    country_name: Option<String>,
}

fn countries(rows: &[(&str, Option<&str>)]) -> anyhow::Result<Table> {
    let rows: Vec<Country> = rows
        .iter()
        .map(|(cd, name)| Country {
            country_cd: (*cd).to_string(),
            country_name: name.map(str::to_string),
        })
        .collect();
    Ok(Table::new("dim_country", to_batch(&rows)?))
}

#[test]
fn test_all_tables_pass() -> anyhow::Result<()> {
    let registry = TableRegistry::new()
        .register("dim_country", countries(&[("209", Some("JAPAN")), ("582", Some("MEXICO"))])?)?
        .register("dim_state", countries(&[("HI", Some("HAWAII"))])?)?;

    let reports = run_checks(&registry)?;
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].table_name, "dim_country");
    assert_eq!(reports[0].row_count, 2);
    assert_eq!(reports[1].distinct_rows, 1);
    Ok(())
}

/// Rows equal on every column, nulls included, are duplicates
#[test]
fn test_duplicate_rows_with_nulls_fail() -> anyhow::Result<()> {
    let registry = TableRegistry::new().register(
        "dim_country",
        countries(&[("209", None), ("209", None), ("582", Some("MEXICO"))])?,
    )?;

    let err = run_checks(&registry).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Quality(QualityError::DuplicateRows {
            total_rows: 3,
            distinct_rows: 2,
            ..
        })
    ));
    assert_eq!(
        err.to_string(),
        "Unique check failed. Table: dim_country has 3 rows, but there are only 2 unique rows."
    );
    Ok(())
}

/// The first failing table stops the gate
#[test]
fn test_gate_stops_at_first_failure() -> anyhow::Result<()> {
    let empty = countries(&[("209", Some("JAPAN"))])?;
    let empty = Table::empty("dim_visa", empty.schema());
    let registry = TableRegistry::new()
        .register("dim_visa", empty)?
        .register("dim_country", countries(&[("1", Some("x")), ("1", Some("x"))])?)?;

    let err = run_checks(&registry).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Quality(QualityError::EmptyTable { ref table_name, .. }) if table_name == "dim_visa"
    ));
    Ok(())
}

#[test]
fn test_duplicate_registration_rejected() -> anyhow::Result<()> {
    let table = countries(&[("209", Some("JAPAN"))])?;
    let err = TableRegistry::new()
        .register("dim_country", table.clone())?
        .register("dim_country", table)
        .unwrap_err();
    assert!(matches!(err, PipelineError::DuplicateTable(name) if name == "dim_country"));
    Ok(())
}
