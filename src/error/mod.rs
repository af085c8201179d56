//! Error handling for the ELT pipeline.

use std::io;
use std::path::PathBuf;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

/// Failures raised by the Quality Gate
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QualityError {
    /// Table has no rows
    #[error("Empty check failed. Table: {table_name} is empty ({row_count} rows).")]
    EmptyTable {
        /// Registry name of the offending table
        table_name: String,
        /// Observed row count (always 0)
        row_count: usize,
    },

    /// Table contains fully duplicated rows
    #[error(
        "Unique check failed. Table: {table_name} has {total_rows} rows, but there are only {distinct_rows} unique rows."
    )]
    DuplicateRows {
        /// Registry name of the offending table
        table_name: String,
        /// Total row count
        total_rows: usize,
        /// Count of fully-distinct rows
        distinct_rows: usize,
    },
}

/// Errors that can occur while running the pipeline
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Error opening, reading or writing a path
    #[error("IO error at {}: {source}", path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Malformed delimited text
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Arrow compute or construction error
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error reading or writing Parquet data
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Invalid configuration file or values
    #[error("Configuration error: {0}")]
    Config(String),

    /// A referenced column does not exist
    #[error("Column {column} not found in table {table}")]
    ColumnNotFound {
        /// Table (or source) being accessed
        table: String,
        /// Requested column name
        column: String,
    },

    /// Schema mismatch between inputs
    #[error("Schema error: {0}")]
    Schema(String),

    /// A non-null SAS date value that is not a usable day offset
    #[error("Malformed SAS date in column {column} at row {row}: {value}")]
    MalformedSasDate {
        /// Source column
        column: String,
        /// Row index within the table
        row: usize,
        /// Offending value as text
        value: String,
    },

    /// A table name was registered more than once in one run
    #[error("Table {0} is already registered")]
    DuplicateTable(String),

    /// Object store request or path failure
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// Output location the sink cannot write to
    #[error("Unsupported storage target: {0}")]
    UnsupportedStorage(String),

    /// A data-quality check failed
    #[error(transparent)]
    Quality(#[from] QualityError),
}

impl PipelineError {
    /// Wrap an IO error with the path it relates to
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a `ColumnNotFound` error
    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
