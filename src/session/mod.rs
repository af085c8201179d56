//! The execution session: the entry point for reading source data into tables
//!
//! There is one session per process. [`Session::get_or_create`] is idempotent:
//! the first call fixes the configuration and sizes the rayon pool, later calls
//! hand back the same session.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use arrow::array::{ArrayRef, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};

use crate::config::SessionConfig;
use crate::error::{PipelineError, Result};
use crate::table::{Table, rebuild};
use crate::utils::io::{load_parquet_files_parallel, read_parquet};
use crate::utils::logging::{log_operation_complete, log_operation_start};

static SESSION: OnceLock<Arc<Session>> = OnceLock::new();

/// Options for reading delimited text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    /// Field delimiter
    pub delimiter: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvOptions {
    /// Options for a file using `delimiter`
    #[must_use]
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }
}

/// Process-wide execution session
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
}

impl Session {
    /// Return the process session, creating it on first use
    pub fn get_or_create(config: SessionConfig) -> Arc<Session> {
        let session = SESSION.get_or_init(|| {
            if config.threads > 0 {
                if let Err(e) = rayon::ThreadPoolBuilder::new()
                    .num_threads(config.threads)
                    .build_global()
                {
                    log::warn!("Could not size the worker pool to {}: {e}", config.threads);
                }
            }
            log::info!(
                "Created session (batch size {}, {} worker threads)",
                config.batch_size,
                rayon::current_num_threads()
            );
            Arc::new(Session {
                config: config.clone(),
            })
        });

        if session.config != config {
            log::debug!("Session already exists, ignoring new configuration {config:?}");
        }
        Arc::clone(session)
    }

    /// Read a delimited text file with a header row
    ///
    /// Every column is nullable text; empty fields are read as null. Rows
    /// shorter than the header are padded with nulls, extra fields are ignored.
    pub fn read_csv(&self, path: &Path, options: CsvOptions) -> Result<Table> {
        let start = Instant::now();
        log_operation_start("Reading csv file", path);

        let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(BufReader::new(file));

        let headers = reader.headers()?.clone();
        let mut builders: Vec<StringBuilder> =
            headers.iter().map(|_| StringBuilder::new()).collect();

        let mut record = csv::StringRecord::new();
        let mut rows = 0usize;
        while reader.read_record(&mut record)? {
            for (idx, builder) in builders.iter_mut().enumerate() {
                match record.get(idx) {
                    Some(value) if !value.is_empty() => builder.append_value(value),
                    _ => builder.append_null(),
                }
            }
            rows += 1;
        }

        let schema = Arc::new(Schema::new(
            headers
                .iter()
                .map(|name| Field::new(name, DataType::Utf8, true))
                .collect::<Vec<_>>(),
        ));
        let columns: Vec<ArrayRef> = builders
            .iter_mut()
            .map(|b| Arc::new(b.finish()) as ArrayRef)
            .collect();
        let batch = rebuild(schema, columns, rows)?;

        log_operation_complete("read", path, rows, Some(start.elapsed()));
        Ok(Table::new(table_name(path), batch))
    }

    /// Read a Parquet file, or every Parquet file in a directory
    pub fn read_parquet(&self, path: &Path) -> Result<Table> {
        let (schema, batches) = if path.is_dir() {
            load_parquet_files_parallel(path, self.config.batch_size)?
        } else {
            read_parquet(path, self.config.batch_size)?
        };
        Table::from_batches(table_name(path), schema, &batches)
    }
}

fn table_name(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned())
}
