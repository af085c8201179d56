//! ELT pipeline turning the I94 immigration extract, U.S. city demographics and
//! global land temperatures into a star schema of partitioned Parquet tables,
//! guarded by a data-quality gate.

pub mod config;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod quality;
pub mod session;
pub mod sink;
pub mod table;
pub mod utils;

// Core types
pub use config::{PipelineConfig, StorageCredentials};
pub use error::{PipelineError, QualityError, Result};
pub use pipeline::{RunSummary, TableRegistry, run, run_with};
pub use session::{CsvOptions, Session};
pub use sink::{ObjectStoreSink, ParquetSink, Sink, WriteReport};
pub use table::Table;

// Filtering capabilities
pub use filter::{Expr, LiteralValue};

// Arrow types
pub use arrow::record_batch::RecordBatch;
