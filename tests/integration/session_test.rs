use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Float64Type};
use i94_elt::config::SessionConfig;
use i94_elt::{CsvOptions, Session};

use crate::utils::{DEMOGRAPHICS_HEADER, Fixture};

#[test]
fn test_read_demographics_with_semicolons() -> anyhow::Result<()> {
    let fixture = Fixture::new()?;
    let session = Session::get_or_create(SessionConfig::default());
    let table = session.read_csv(
        &fixture.config.sources.demographics,
        CsvOptions::with_delimiter(b';'),
    )?;

    assert_eq!(table.column_names(), DEMOGRAPHICS_HEADER.to_vec());
    assert_eq!(table.num_rows(), 4);
    assert!(
        table
            .schema()
            .fields()
            .iter()
            .all(|f| f.data_type() == &DataType::Utf8 && f.is_nullable())
    );
    Ok(())
}

#[test]
fn test_empty_csv_fields_are_null() -> anyhow::Result<()> {
    let fixture = Fixture::new()?;
    let session = Session::get_or_create(SessionConfig::default());
    let table = session.read_csv(&fixture.config.sources.temperature, CsvOptions::default())?;

    let temperatures = table.column("AverageTemperature")?.as_string::<i32>();
    assert_eq!(temperatures.value(0), "30.0");
    assert!(temperatures.is_null(1));
    Ok(())
}

/// Every part file of a directory is read, in file-name order, with stored types
#[test]
fn test_read_parquet_directory() -> anyhow::Result<()> {
    let fixture = Fixture::new()?;
    let session = Session::get_or_create(SessionConfig::default());
    let table = session.read_parquet(&fixture.config.sources.immigration)?;

    assert_eq!(table.name(), "sas_data");
    assert_eq!(table.num_rows(), 4);
    let cicid = table.column("cicid")?.as_primitive::<Float64Type>();
    assert_eq!(cicid.values().to_vec(), vec![1.0, 1.0, 2.0, 3.0]);
    assert!(table.column("depdate")?.is_null(3));
    Ok(())
}

#[test]
fn test_empty_parquet_directory_fails() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let session = Session::get_or_create(SessionConfig::default());
    assert!(session.read_parquet(dir.path()).is_err());
    Ok(())
}
