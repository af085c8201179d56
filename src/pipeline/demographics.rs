//! City demographics dimension, enriched with the average temperature

use crate::config::{CleaningConfig, SourcePaths};
use crate::error::Result;
use crate::pipeline::TableRegistry;
use crate::pipeline::temperature::{AVG_TEMPERATURE_COLUMN, CITY_COLUMN, clean_temperature_data};
use crate::session::{CsvOptions, Session};
use crate::sink::Sink;
use crate::table::Table;
use crate::utils::logging::log_stage;

/// Output table name
pub const DIM_CITY_DEMOGRAPHICS: &str = "dim_city_demographics";

/// Column the table is partitioned on
pub const PARTITION_COLUMN: &str = "state_cd";

/// Source column → output column
pub const DEMOGRAPHICS_COLUMNS: [(&str, &str); 9] = [
    ("City", "city"),
    ("State Code", "state_cd"),
    ("Median Age", "median_age"),
    ("Male Population", "male_pop"),
    ("Female Population", "female_pop"),
    ("Total Population", "total_pop"),
    ("Foreign-born", "foreign_born_pop"),
    ("Average Household Size", "avg_hh_size"),
    (AVG_TEMPERATURE_COLUMN, AVG_TEMPERATURE_COLUMN),
];

/// Left-join demographics with the per-city temperatures and project the dimension
///
/// Every demographics row survives the join; cities without a temperature
/// get a null `avg_temperature`. Exact duplicate rows (the source repeats
/// each city once per race) are dropped.
pub fn build_city_demographics(demographics: &Table, temperatures: &Table) -> Result<Table> {
    let table = demographics
        .left_join(temperatures, "City", CITY_COLUMN)?
        .select_as(&DEMOGRAPHICS_COLUMNS)?
        .drop_duplicates()?;
    Ok(table.with_name(DIM_CITY_DEMOGRAPHICS))
}

/// Read demographics and temperatures, then build, write and register the dimension
pub fn process_city_demographics_data(
    session: &Session,
    sink: &dyn Sink,
    sources: &SourcePaths,
    rules: &CleaningConfig,
    registry: TableRegistry,
) -> Result<TableRegistry> {
    let demographics = session.read_csv(&sources.demographics, CsvOptions::with_delimiter(b';'))?;
    log_stage("read demographics data");

    let raw_temperatures = session.read_csv(&sources.temperature, CsvOptions::default())?;
    log_stage("read temperature data");

    let temperatures = clean_temperature_data(&raw_temperatures, rules)?;
    log_stage("temperature data has been cleaned");

    let table = build_city_demographics(&demographics, &temperatures)?;
    sink.write(&table, DIM_CITY_DEMOGRAPHICS, &[PARTITION_COLUMN])?;
    log_stage("demographics data has been written");

    registry.register(DIM_CITY_DEMOGRAPHICS, table)
}
