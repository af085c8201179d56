//! Parquet file operations
//!
//! Finding Parquet files and reading them into Arrow record batches.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use rayon::prelude::*;

use crate::error::{PipelineError, Result};
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

/// Validates that a directory exists and is a directory
fn validate_directory(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(PipelineError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "directory does not exist"),
        ));
    }
    Ok(())
}

/// Read a parquet file into Arrow record batches
///
/// The schema is returned alongside the batches so that files without rows
/// still describe their columns.
///
/// # Arguments
/// * `path` - Path to the Parquet file
/// * `batch_size` - Rows per returned batch
pub fn read_parquet(path: &Path, batch_size: usize) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let start = Instant::now();
    log_operation_start("Reading parquet file", path);

    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?.with_batch_size(batch_size);
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;

    let rows = batches.iter().map(RecordBatch::num_rows).sum();
    log_operation_complete("read", path, rows, Some(start.elapsed()));
    Ok((schema, batches))
}

/// Find all Parquet files directly inside a directory, sorted by file name
///
/// Hidden files and Spark/Hadoop markers (`_SUCCESS`, `.crc`) are skipped.
pub fn find_parquet_files(dir: &Path) -> Result<Vec<PathBuf>> {
    log_operation_start("Searching for parquet files in", dir);
    validate_directory(dir)?;

    let parquet_files = std::fs::read_dir(dir)
        .map_err(|e| PipelineError::io(dir, e))?
        .map(|entry| entry.map(|e| e.path()).map_err(|e| PipelineError::io(dir, e)))
        .filter_ok(|path| {
            let visible = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !n.starts_with('.') && !n.starts_with('_'));
            visible && path.is_file() && path.extension().is_some_and(|ext| ext == "parquet")
        })
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .sorted()
        .collect_vec();

    if parquet_files.is_empty() {
        log_warning("No Parquet files found in directory", Some(dir));
    }

    Ok(parquet_files)
}

/// Load all parquet files from a directory in parallel
///
/// Batches are returned in file-name order regardless of which file finished
/// first. The schema is taken from the first file; a directory without any
/// Parquet file is an error since there is no schema to report.
pub fn load_parquet_files_parallel(
    dir: &Path,
    batch_size: usize,
) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let parquet_files = find_parquet_files(dir)?;
    if parquet_files.is_empty() {
        return Err(PipelineError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "no parquet files in directory"),
        ));
    }

    let per_file: Vec<Result<(SchemaRef, Vec<RecordBatch>)>> = parquet_files
        .par_iter()
        .map(|path| read_parquet(path, batch_size))
        .collect();

    let mut schema = None;
    let mut combined = Vec::new();
    for result in per_file {
        let (file_schema, batches) = result?;
        schema.get_or_insert(file_schema);
        combined.extend(batches);
    }
    let schema = schema.ok_or_else(|| PipelineError::Schema("no parquet schema".to_string()))?;

    log::info!(
        "Successfully loaded {} batches from {} Parquet files",
        combined.len(),
        parquet_files.len()
    );

    Ok((schema, combined))
}
