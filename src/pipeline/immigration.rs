//! The immigration fact table
//!
//! Arrival and departure dates arrive as SAS day counts and leave as ISO
//! date strings.

use std::fmt::Write as _;
use std::ops::RangeInclusive;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, StringBuilder, new_null_array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type};
use chrono::{Datelike, Days, NaiveDate};

use crate::config::SourcePaths;
use crate::error::{PipelineError, Result};
use crate::pipeline::TableRegistry;
use crate::session::Session;
use crate::sink::Sink;
use crate::table::Table;
use crate::utils::logging::log_stage;

/// Output table name
pub const FACT_IMMIGRATION: &str = "fact_immigration_i94";

/// Column the table is partitioned on
pub const PARTITION_COLUMN: &str = "i94_state_cd";

/// Source columns holding SAS day counts
pub const SAS_DATE_COLUMNS: [&str; 2] = ["arrdate", "depdate"];

/// Source column → output column
pub const FACT_COLUMNS: [(&str, &str); 18] = [
    ("cicid", "cic_id"),
    ("i94yr", "i94_year"),
    ("i94mon", "i94_month"),
    ("i94cit", "i94_cit"),
    ("i94res", "i94_res"),
    ("i94port", "i94_city_cd"),
    ("arrdate", "arr_date"),
    ("depdate", "dep_date"),
    ("i94addr", "i94_state_cd"),
    ("i94bir", "i94_resp_age"),
    ("i94visa", "i94_visa_cd"),
    ("visapost", "visa_post"),
    ("dtaddto", "us_adm_date"),
    ("admnum", "adm_num"),
    ("gender", "gender"),
    ("insnum", "ins_num"),
    ("airline", "airline"),
    ("fltno", "fl_num"),
];

/// Years a `YYYY-MM-DD` string can carry
const ISO_YEARS: RangeInclusive<i32> = 1..=9999;

/// Date for a SAS day count, day 0 being 1960-01-01
///
/// Fractional counts are floored. Returns `None` for non-finite values and
/// for dates outside years 1 to 9999, which have no four-digit ISO form.
#[must_use]
pub fn sas_date(days: f64) -> Option<NaiveDate> {
    if !days.is_finite() {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1960, 1, 1)?;
    let offset = days.floor();
    let date = if offset >= 0.0 {
        epoch.checked_add_days(Days::new(offset as u64))
    } else {
        epoch.checked_sub_days(Days::new((-offset) as u64))
    }?;
    ISO_YEARS.contains(&date.year()).then_some(date)
}

/// Decode a SAS date column into ISO `YYYY-MM-DD` strings
///
/// Numeric columns are read as day counts, text columns are parsed first.
/// Nulls stay null; any other value that does not decode aborts with
/// [`PipelineError::MalformedSasDate`].
pub fn convert_sas_dates(table: &Table, column: &str) -> Result<ArrayRef> {
    let values = table.column(column)?;
    match values.data_type() {
        DataType::Null => Ok(new_null_array(&DataType::Utf8, values.len())),
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => {
            let text = cast(values, &DataType::Utf8)?;
            let offsets = text.as_string::<i32>().iter().map(|value| {
                value.map(|s| s.trim().parse::<f64>().map_err(|_| s.to_string()))
            });
            encode_iso_dates(column, offsets)
        }
        data_type if data_type.is_numeric() => {
            let numbers = cast(values, &DataType::Float64)?;
            let offsets = numbers
                .as_primitive::<Float64Type>()
                .iter()
                .map(|value| value.map(Ok));
            encode_iso_dates(column, offsets)
        }
        other => Err(PipelineError::Schema(format!(
            "Column {column} of table {} has type {other}, expected a SAS day count",
            table.name()
        ))),
    }
}

fn encode_iso_dates<I>(column: &str, offsets: I) -> Result<ArrayRef>
where
    I: ExactSizeIterator<Item = Option<std::result::Result<f64, String>>>,
{
    let mut builder = StringBuilder::with_capacity(offsets.len(), offsets.len() * 10);
    for (row, offset) in offsets.enumerate() {
        let Some(offset) = offset else {
            builder.append_null();
            continue;
        };
        let date = match offset {
            Ok(days) => sas_date(days).ok_or_else(|| days.to_string()),
            Err(raw) => Err(raw),
        };
        match date {
            // `NaiveDate` displays as `YYYY-MM-DD` within `ISO_YEARS`
            Ok(date) => {
                write!(builder, "{date}").map_err(|e| {
                    PipelineError::Schema(format!("Cannot encode {date} in column {column}: {e}"))
                })?;
                builder.append_value("");
            }
            Err(value) => {
                return Err(PipelineError::MalformedSasDate {
                    column: column.to_string(),
                    row,
                    value,
                });
            }
        }
    }
    Ok(Arc::new(builder.finish()))
}

/// Decode the dates, project the eighteen fact columns and drop duplicate rows
pub fn build_fact_immigration(raw: &Table) -> Result<Table> {
    let mut decoded = raw.clone();
    for column in SAS_DATE_COLUMNS {
        let dates = convert_sas_dates(&decoded, column)?;
        decoded = decoded.with_column(column, dates)?;
    }

    let table = decoded.select_as(&FACT_COLUMNS)?.drop_duplicates()?;
    Ok(table.with_name(FACT_IMMIGRATION))
}

/// Read the immigration records, then build, write and register the fact table
pub fn process_immigration_data(
    session: &Session,
    sink: &dyn Sink,
    sources: &SourcePaths,
    registry: TableRegistry,
) -> Result<TableRegistry> {
    let raw = session.read_parquet(&sources.immigration)?;
    log_stage("read immigration data");

    let table = build_fact_immigration(&raw)?;
    sink.write(&table, FACT_IMMIGRATION, &[PARTITION_COLUMN])?;
    log_stage("immigration data has been written");

    registry.register(FACT_IMMIGRATION, table)
}
