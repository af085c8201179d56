//! Shared helpers: Parquet IO and logging

pub mod io;
pub mod logging;

pub use io::{find_parquet_files, load_parquet_files_parallel, read_parquet};

/// Default batch size for Parquet reading
pub const DEFAULT_BATCH_SIZE: usize = 16384;
