//! Average 2013 temperature per U.S. city from the global land temperature data

use std::sync::Arc;

use arrow::array::{AsArray, Int32Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type};
use chrono::{Datelike, NaiveDate};

use crate::config::CleaningConfig;
use crate::error::Result;
use crate::filter::{Expr, LiteralValue};
use crate::table::Table;
use crate::utils::logging::log_stage;

/// Output column holding the city name (the demographics join key)
pub const CITY_COLUMN: &str = "t_city";

/// Output column holding the average temperature in °F
pub const AVG_TEMPERATURE_COLUMN: &str = "avg_temperature";

/// Observation year derived from `dt`
const YEAR_COLUMN: &str = "dt_year";

#[must_use]
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 1.8 + 32.0
}

/// Parse the date part of a `dt` value such as `2013-09-01` or `2013-09-01 00:00:00`
#[must_use]
pub fn parse_observation_date(value: &str) -> Option<NaiveDate> {
    let date_part = value
        .trim()
        .split(|c: char| c == ' ' || c == 'T')
        .next()
        .unwrap_or_default();
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Year of every `dt` value; unparseable dates give null
fn observation_years(table: &Table) -> Result<Int32Array> {
    let dates = cast(table.column("dt")?, &DataType::Utf8)?;
    let years = dates
        .as_string::<i32>()
        .iter()
        .map(|dt| dt.and_then(parse_observation_date).map(|date| date.year()))
        .collect();
    Ok(years)
}

/// Clean the raw temperature observations
///
/// 1. Keep only the configured country
/// 2. Keep only observations from the configured year
/// 3. Read `AverageTemperature` as a number; anything unparseable is missing
/// 4. Average per city
/// 5. Convert the averages from Celsius to Fahrenheit
///
/// Returns one row per city with columns `t_city` and `avg_temperature`. An
/// empty result is not an error here.
pub fn clean_temperature_data(raw: &Table, rules: &CleaningConfig) -> Result<Table> {
    log_stage("temperature data is being cleaned");

    let dated = raw.with_column(YEAR_COLUMN, Arc::new(observation_years(raw)?))?;
    let selected = dated.filter(&Expr::And(vec![
        Expr::eq_str("Country", &rules.temperature_country),
        Expr::Eq(
            YEAR_COLUMN.to_string(),
            LiteralValue::Int(i64::from(rules.temperature_year)),
        ),
    ]))?;
    let numeric = selected.cast_column("AverageTemperature", &DataType::Float64)?;

    let per_city = numeric.group_mean(
        "City",
        "AverageTemperature",
        CITY_COLUMN,
        AVG_TEMPERATURE_COLUMN,
    )?;

    let fahrenheit = per_city
        .column(AVG_TEMPERATURE_COLUMN)?
        .as_primitive::<Float64Type>()
        .unary::<_, Float64Type>(celsius_to_fahrenheit);

    let cleaned = per_city.with_column(AVG_TEMPERATURE_COLUMN, Arc::new(fahrenheit))?;
    log::debug!("{} cities have a temperature average", cleaned.num_rows());
    Ok(cleaned.with_name("temperature"))
}
