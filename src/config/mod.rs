//! Configuration for the pipeline.
//!
//! Everything has a default so the pipeline can run from the working directory
//! without a config file. When present, the file is TOML:
//!
//! ```toml
//! [aws]
//! access_key_id = "AKIA..."
//! secret_access_key = "..."
//! region = "us-west-2"
//!
//! [output]
//! root = "s3a://bucket/star"
//!
//! [cleaning]
//! temperature_year = 2013
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use serde::Deserialize;

use crate::error::{PipelineError, Result};

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "ELT_CONFIG";

/// Config file used when `ELT_CONFIG` is not set
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Top-level pipeline configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Object storage credentials handed to the sink
    #[serde(rename = "aws")]
    pub credentials: Option<StorageCredentials>,
    /// Source file locations
    pub sources: SourcePaths,
    /// Output location
    pub output: OutputConfig,
    /// Cleaning rules
    pub cleaning: CleaningConfig,
    /// Parquet writer settings
    pub sink: SinkConfig,
    /// Execution session settings
    pub session: SessionConfig,
}

/// Access key pair for the storage backend
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageCredentials {
    /// Access key id
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket region; the client default applies when absent
    #[serde(default)]
    pub region: Option<String>,
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

/// Locations of the source files
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourcePaths {
    /// I94 country codes (csv)
    pub countries: PathBuf,
    /// I94 port/city codes (csv)
    pub cities: PathBuf,
    /// I94 state codes (csv)
    pub states: PathBuf,
    /// I94 visa codes (csv)
    pub visas: PathBuf,
    /// US city demographics (semicolon-delimited csv)
    pub demographics: PathBuf,
    /// Global land temperatures by city (csv)
    pub temperature: PathBuf,
    /// Pre-parsed immigration records (parquet file or directory)
    pub immigration: PathBuf,
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            countries: PathBuf::from("i94_sas_label_data/i94_countries.csv"),
            cities: PathBuf::from("i94_sas_label_data/i94_cities.csv"),
            states: PathBuf::from("i94_sas_label_data/i94_states.csv"),
            visas: PathBuf::from("i94_sas_label_data/i94_visas.csv"),
            demographics: PathBuf::from("city_demo_data/us-cities-demographics.csv"),
            temperature: PathBuf::from("../../data2/GlobalLandTemperaturesByCity.csv"),
            immigration: PathBuf::from("sas_data"),
        }
    }
}

/// Where the output tables go
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Path prefix under which every `<table>.parquet` directory is written
    pub root: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: "output".to_string(),
        }
    }
}

/// Cleaning rules for the temperature source
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleaningConfig {
    /// Only observations for this country are kept
    pub temperature_country: String,
    /// Only observations from this year are kept
    pub temperature_year: i32,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            temperature_country: "United States".to_string(),
            // Latest year in the GlobalLandTemperaturesByCity snapshot
            temperature_year: 2013,
        }
    }
}

/// Parquet codec selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionCodec {
    /// Snappy (Spark's default)
    #[default]
    Snappy,
    /// Zstandard
    Zstd,
    /// Gzip
    Gzip,
    /// No compression
    Uncompressed,
}

impl CompressionCodec {
    /// Parquet compression setting for this codec
    #[must_use]
    pub fn to_parquet(self) -> Compression {
        match self {
            Self::Snappy => Compression::SNAPPY,
            Self::Zstd => Compression::ZSTD(ZstdLevel::default()),
            Self::Gzip => Compression::GZIP(GzipLevel::default()),
            Self::Uncompressed => Compression::UNCOMPRESSED,
        }
    }

    /// Infix used in part file names, e.g. `part-00000.snappy.parquet`
    #[must_use]
    pub fn file_infix(self) -> Option<&'static str> {
        match self {
            Self::Snappy => Some("snappy"),
            Self::Zstd => Some("zstd"),
            Self::Gzip => Some("gz"),
            Self::Uncompressed => None,
        }
    }
}

/// Parquet writer settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SinkConfig {
    /// Codec for all written files
    pub compression: CompressionCodec,
    /// Row count after which a new part file is started
    pub max_rows_per_file: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            compression: CompressionCodec::default(),
            max_rows_per_file: 1_000_000,
        }
    }
}

/// Settings for the execution session
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Batch size used when reading Parquet
    pub batch_size: usize,
    /// Worker threads; 0 uses the rayon default
    pub threads: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            batch_size: crate::utils::DEFAULT_BATCH_SIZE,
            threads: 0,
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| PipelineError::Config(e.message().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration from a file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::warn!(
                "Config file {} not found, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let config = Self::from_toml_str(&text)
            .map_err(|e| PipelineError::Config(format!("{}: {e}", path.display())))?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from `$ELT_CONFIG`, falling back to `config.toml`
    pub fn from_env() -> Result<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
        Self::load(&path)
    }

    fn validate(&self) -> Result<()> {
        if let Some(credentials) = &self.credentials {
            if credentials.access_key_id.is_empty() || credentials.secret_access_key.is_empty() {
                return Err(PipelineError::Config(
                    "[aws] requires both access_key_id and secret_access_key".to_string(),
                ));
            }
        }
        if self.sink.max_rows_per_file == 0 {
            return Err(PipelineError::Config(
                "sink.max_rows_per_file must be greater than zero".to_string(),
            ));
        }
        if self.session.batch_size == 0 {
            return Err(PipelineError::Config(
                "session.batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
