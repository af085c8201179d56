//! IO utilities for file operations

pub mod parquet;

pub use self::parquet::{find_parquet_files, load_parquet_files_parallel, read_parquet};
