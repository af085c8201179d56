//! Dimension tables from the I94 label reference files

use std::path::Path;

use crate::config::SourcePaths;
use crate::error::Result;
use crate::pipeline::TableRegistry;
use crate::session::{CsvOptions, Session};
use crate::sink::Sink;
use crate::table::Table;
use crate::utils::logging::log_stage;

/// One reference file and the dimension table built from it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelDimension {
    /// `dim_country` from the country codes
    Country,
    /// `dim_city` from the port/city codes
    City,
    /// `dim_state` from the state codes
    State,
    /// `dim_visa` from the visa codes
    Visa,
}

impl LabelDimension {
    /// All label dimensions, in production order
    pub const ALL: [Self; 4] = [Self::Country, Self::City, Self::State, Self::Visa];

    /// Output table name
    #[must_use]
    pub fn table_name(self) -> &'static str {
        match self {
            Self::Country => "dim_country",
            Self::City => "dim_city",
            Self::State => "dim_state",
            Self::Visa => "dim_visa",
        }
    }

    /// Plural used in progress messages
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Country => "countries",
            Self::City => "cities",
            Self::State => "states",
            Self::Visa => "visas",
        }
    }

    /// The (code, description) column pair kept from the source
    #[must_use]
    pub fn columns(self) -> [&'static str; 2] {
        match self {
            Self::Country => ["country_cd", "country_name"],
            Self::City => ["city_cd", "city_name"],
            Self::State => ["state_cd", "state_name"],
            Self::Visa => ["visa_cd", "visa_desc"],
        }
    }

    /// Source file for this dimension
    #[must_use]
    pub fn source(self, sources: &SourcePaths) -> &Path {
        match self {
            Self::Country => &sources.countries,
            Self::City => &sources.cities,
            Self::State => &sources.states,
            Self::Visa => &sources.visas,
        }
    }

    /// Project the code/description pair and drop duplicate pairs
    pub fn extract(self, source: &Table) -> Result<Table> {
        let table = source.select(&self.columns())?.drop_duplicates()?;
        Ok(table.with_name(self.table_name()))
    }
}

/// Build, write and register the country, city, state and visa dimensions
///
/// The files are processed one after the other and the first read or write
/// failure aborts the run.
pub fn process_i94_labels(
    session: &Session,
    sink: &dyn Sink,
    sources: &SourcePaths,
    registry: TableRegistry,
) -> Result<TableRegistry> {
    let mut registry = registry;
    for dimension in LabelDimension::ALL {
        let source = session.read_csv(dimension.source(sources), CsvOptions::default())?;
        log_stage(&format!("read {} data", dimension.label()));

        let table = dimension.extract(&source)?;
        sink.write(&table, dimension.table_name(), &[])?;
        log_stage(&format!("{} data has been written", dimension.label()));

        registry = registry.register(dimension.table_name(), table)?;
    }
    Ok(registry)
}
