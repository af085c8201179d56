//! Persisting tables as partitioned Parquet datasets
//!
//! Each table becomes a directory `<root>/<table>.parquet/` laid out the way
//! Spark and Hive write datasets:
//!
//! ```text
//! dim_city_demographics.parquet/
//!   _SUCCESS
//!   state_cd=CA/part-00000.snappy.parquet
//!   state_cd=__HIVE_DEFAULT_PARTITION__/part-00000.snappy.parquet
//! ```
//!
//! Writes go to a hidden staging location first and are moved into place only
//! once every file is complete. [`ParquetSink`] writes below a local
//! directory; [`ObjectStoreSink`] writes below an `s3://` or `s3a://` prefix.
//! [`open`] picks the backend from the configured root.

pub mod partition;
pub mod remote;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::array::UInt32Array;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use rayon::prelude::*;

use crate::config::{SinkConfig, StorageCredentials};
use crate::error::{PipelineError, Result};
use crate::table::{Table, take_batch};
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

pub use remote::ObjectStoreSink;

/// Marker file written last into every completed dataset
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// What a completed write produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    /// Dataset directory or object prefix
    pub path: PathBuf,
    /// Rows written
    pub rows: usize,
    /// Part files written
    pub files: usize,
    /// Partition directories written (0 for unpartitioned tables)
    pub partitions: usize,
}

/// Destination for produced tables
pub trait Sink {
    /// Persist `table` as `table_name`, replacing whatever was there
    ///
    /// `partition_by` may be empty (single output directory) or name one or
    /// more columns, which become nested `col=value` directories.
    fn write(&self, table: &Table, table_name: &str, partition_by: &[&str]) -> Result<WriteReport>;
}

/// Open the sink for `root`
///
/// URL roots go to object storage using `credentials`; anything else is a
/// local directory.
pub fn open(
    root: &str,
    credentials: Option<&StorageCredentials>,
    config: SinkConfig,
) -> Result<Box<dyn Sink>> {
    if root.contains("://") {
        Ok(Box::new(ObjectStoreSink::for_url(root, credentials, config)?))
    } else {
        Ok(Box::new(ParquetSink::new(root, config)?))
    }
}

/// One file of a planned dataset
#[derive(Debug)]
struct PartFile {
    /// Partition directory segments, outermost first
    dirs: Vec<String>,
    name: String,
    batch: RecordBatch,
}

impl PartFile {
    /// Path segments below the dataset directory
    fn segments(&self) -> impl Iterator<Item = &str> {
        self.dirs
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.name.as_str()))
    }
}

/// Files a table is split into
#[derive(Debug)]
struct Layout {
    parts: Vec<PartFile>,
    partitions: usize,
}

/// Split `table` into partition directories and part files
///
/// Partition columns are dropped from the file contents. A table without rows
/// still gets one schema-only part file at the top level.
fn plan_layout(table: &Table, partition_by: &[&str], config: &SinkConfig) -> Result<Layout> {
    if config.max_rows_per_file == 0 {
        return Err(PipelineError::Config(
            "sink.max_rows_per_file must be greater than zero".to_string(),
        ));
    }
    for column in partition_by {
        table.column(column)?;
    }

    if partition_by.is_empty() {
        return Ok(Layout {
            parts: split_parts(Vec::new(), table.batch(), config),
            partitions: 0,
        });
    }

    let data_columns: Vec<String> = table
        .column_names()
        .into_iter()
        .filter(|c| !partition_by.contains(&c.as_str()))
        .collect();
    let data_columns: Vec<&str> = data_columns.iter().map(String::as_str).collect();
    let data = table.select(&data_columns)?;

    let groups = partition::group_rows(table, partition_by)?;
    if groups.is_empty() {
        // Keep the schema discoverable even without rows
        return Ok(Layout {
            parts: split_parts(Vec::new(), data.batch(), config),
            partitions: 0,
        });
    }

    let parts = groups
        .par_iter()
        .map(|(segments, rows)| {
            let batch = take_batch(data.batch(), &UInt32Array::from(rows.clone()))?;
            Ok(split_parts(segments.clone(), &batch, config))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Layout {
        parts: parts.into_iter().flatten().collect(),
        partitions: groups.len(),
    })
}

/// Numbered part files of at most `max_rows_per_file` rows each
fn split_parts(dirs: Vec<String>, batch: &RecordBatch, config: &SinkConfig) -> Vec<PartFile> {
    let max_rows = config.max_rows_per_file;
    let mut parts = Vec::new();
    let mut offset = 0;
    loop {
        let len = max_rows.min(batch.num_rows() - offset);
        parts.push(PartFile {
            dirs: dirs.clone(),
            name: part_file_name(config, parts.len()),
            batch: batch.slice(offset, len),
        });
        offset += len;
        if offset >= batch.num_rows() {
            return parts;
        }
    }
}

fn part_file_name(config: &SinkConfig, part: usize) -> String {
    match config.compression.file_infix() {
        Some(infix) => format!("part-{part:05}.{infix}.parquet"),
        None => format!("part-{part:05}.parquet"),
    }
}

fn writer_properties(config: &SinkConfig) -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some(concat!("i94-elt ", env!("CARGO_PKG_VERSION")).to_string()),
    };
    WriterProperties::builder()
        .set_compression(config.compression.to_parquet())
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

/// Encode one batch as a complete Parquet file into `out`
fn encode_part<W: Write + Send>(out: W, batch: &RecordBatch, config: &SinkConfig) -> Result<W> {
    let mut writer = ArrowWriter::try_new(out, batch.schema(), Some(writer_properties(config)))?;
    writer.write(batch)?;
    Ok(writer.into_inner()?)
}

/// Name of this process's staging location for a table
fn staging_name(table_name: &str) -> String {
    format!("{}{}", staging_prefix(table_name), std::process::id())
}

/// Shared prefix of every staging location for a table, whichever process made it
fn staging_prefix(table_name: &str) -> String {
    format!(".{table_name}.parquet.staging-")
}

/// Sink writing Parquet datasets below a local directory
#[derive(Debug)]
pub struct ParquetSink {
    root: PathBuf,
    config: SinkConfig,
}

impl ParquetSink {
    /// Create a sink rooted at the local directory `root`
    ///
    /// URL roots belong to [`ObjectStoreSink`]; use [`open`] to choose.
    pub fn new(root: &str, config: SinkConfig) -> Result<Self> {
        if let Some((scheme, _)) = root.split_once("://") {
            return Err(PipelineError::UnsupportedStorage(format!(
                "{root}: scheme {scheme} is not a local directory"
            )));
        }
        if config.max_rows_per_file == 0 {
            return Err(PipelineError::Config(
                "sink.max_rows_per_file must be greater than zero".to_string(),
            ));
        }

        let root = PathBuf::from(root);
        fs::create_dir_all(&root).map_err(|e| PipelineError::io(&root, e))?;
        Ok(Self { root, config })
    }

    /// Directory a table is written to
    #[must_use]
    pub fn table_path(&self, table_name: &str) -> PathBuf {
        self.root.join(format!("{table_name}.parquet"))
    }

    fn staging_path(&self, table_name: &str) -> PathBuf {
        self.root.join(staging_name(table_name))
    }

    /// Remove staging directories left behind by interrupted runs
    fn sweep_staging(&self, table_name: &str) -> Result<()> {
        let prefix = staging_prefix(table_name);
        let entries = fs::read_dir(&self.root).map_err(|e| PipelineError::io(&self.root, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| PipelineError::io(&self.root, e))?;
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                let path = entry.path();
                log_warning("Removing stale staging directory", Some(&path));
                remove_path(&path)?;
            }
        }
        Ok(())
    }

    fn write_staged(&self, staging: &Path, layout: &Layout) -> Result<()> {
        layout.parts.par_iter().try_for_each(|part| {
            let dir = part.dirs.iter().fold(staging.to_path_buf(), |dir, d| dir.join(d));
            fs::create_dir_all(&dir).map_err(|e| PipelineError::io(&dir, e))?;
            let path = dir.join(&part.name);
            let file = File::create(&path).map_err(|e| PipelineError::io(&path, e))?;
            encode_part(file, &part.batch, &self.config)?;
            Ok::<(), PipelineError>(())
        })?;

        let marker = staging.join(SUCCESS_MARKER);
        File::create(&marker).map_err(|e| PipelineError::io(&marker, e))?;
        Ok(())
    }

    /// Swap the staged dataset into place, restoring the old one on failure
    fn commit(staging: &Path, target: &Path) -> Result<()> {
        let backup = target.with_extension("parquet.old");
        if backup.exists() {
            remove_path(&backup)?;
        }

        let had_target = target.exists();
        if had_target {
            fs::rename(target, &backup).map_err(|e| PipelineError::io(target, e))?;
        }

        if let Err(e) = fs::rename(staging, target) {
            if had_target {
                if let Err(restore) = fs::rename(&backup, target) {
                    log::error!(
                        "Could not restore {} from {}: {restore}",
                        target.display(),
                        backup.display()
                    );
                }
            }
            return Err(PipelineError::io(target, e));
        }

        if had_target {
            remove_path(&backup)?;
        }
        Ok(())
    }
}

impl Sink for ParquetSink {
    fn write(&self, table: &Table, table_name: &str, partition_by: &[&str]) -> Result<WriteReport> {
        let start = Instant::now();
        let target = self.table_path(table_name);
        log_operation_start("Writing table to", &target);

        let layout = plan_layout(table, partition_by, &self.config)?;
        self.sweep_staging(table_name)?;

        let staging = self.staging_path(table_name);
        let staged = self
            .write_staged(&staging, &layout)
            .and_then(|()| Self::commit(&staging, &target));
        if let Err(e) = staged {
            if staging.exists() && remove_path(&staging).is_err() {
                log_warning("Could not remove staging directory", Some(&staging));
            }
            return Err(e);
        }

        log_operation_complete("wrote", &target, table.num_rows(), Some(start.elapsed()));
        Ok(WriteReport {
            path: target,
            rows: table.num_rows(),
            files: layout.parts.len(),
            partitions: layout.partitions,
        })
    }
}

fn remove_path(path: &Path) -> Result<()> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| PipelineError::io(path, e))
}
