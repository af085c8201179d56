//! Ordered registry of the tables produced in one run

use crate::error::{PipelineError, Result};
use crate::table::Table;

/// Tables in the order they were produced
///
/// Producers take the registry by value and hand it back with their tables
/// appended, so no stage holds it while another one runs.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: Vec<(String, Table)>,
}

impl TableRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a table; each name may be registered once
    pub fn register(mut self, name: impl Into<String>, table: Table) -> Result<Self> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(PipelineError::DuplicateTable(name));
        }
        self.tables.push((name, table));
        Ok(self)
    }

    /// Look up a table by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    /// Tables in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.tables.iter().map(|(n, t)| (n.as_str(), t))
    }
}
