//! Configuration management and validation.
//!
//! Provides the remote catalog location, dataset boundaries, transfer
//! options and bulk conversion settings.

use crate::constants::{
    DATA_FTP_PATH, DEFAULT_DATA_DIR_NAME, DOC_FTP_PATH, FTP_ANONYMOUS_PASSWORD,
    FTP_ANONYMOUS_USER, FTP_HOST, FTP_PORT, START_YEAR,
};
use crate::error::{PnadcError, Result};
use polars::prelude::ParquetCompression;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Supported compression algorithms for parquet files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionAlgorithm {
    /// Snappy compression - good balance of speed and compression
    Snappy,
    /// ZSTD compression - better compression ratio, slower
    Zstd,
    /// LZ4 compression - fastest, lower compression ratio
    Lz4,
    Uncompressed,
}

impl CompressionAlgorithm {
    /// Convert to polars ParquetCompression type
    pub fn to_polars_compression(&self) -> ParquetCompression {
        match self {
            CompressionAlgorithm::Snappy => ParquetCompression::Snappy,
            CompressionAlgorithm::Zstd => ParquetCompression::Zstd(None),
            CompressionAlgorithm::Lz4 => ParquetCompression::Lz4Raw,
            CompressionAlgorithm::Uncompressed => ParquetCompression::Uncompressed,
        }
    }
}

impl FromStr for CompressionAlgorithm {
    type Err = PnadcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "snappy" => Ok(Self::Snappy),
            "zstd" => Ok(Self::Zstd),
            "lz4" => Ok(Self::Lz4),
            "none" | "uncompressed" => Ok(Self::Uncompressed),
            other => Err(PnadcError::Configuration {
                message: format!(
                    "Unknown compression '{}' (expected snappy, zstd, lz4 or none)",
                    other
                ),
            }),
        }
    }
}

/// Remote catalog connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Directory holding one subdirectory per year
    pub data_path: String,
    pub doc_path: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: FTP_HOST.to_string(),
            port: FTP_PORT,
            user: FTP_ANONYMOUS_USER.to_string(),
            password: FTP_ANONYMOUS_PASSWORD.to_string(),
            data_path: DATA_FTP_PATH.to_string(),
            doc_path: DOC_FTP_PATH.to_string(),
        }
    }
}

impl RemoteConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Remote directory of one data year
    pub fn year_path(&self, year: i32) -> String {
        format!("{}/{}", self.data_path.trim_end_matches('/'), year)
    }
}

/// Main configuration for fetching and converting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    pub remote: RemoteConfig,

    /// First year enumerated by a data sync
    pub start_year: i32,

    /// Show byte progress bars while transferring
    pub show_progress: bool,

    /// Parallel workers for bulk conversion
    pub workers: usize,

    pub compression: CompressionAlgorithm,

    /// Re-convert archives whose Parquet output already exists
    pub force_reconvert: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            remote: RemoteConfig::default(),
            start_year: START_YEAR,
            show_progress: true,
            workers: num_cpus::get().max(1),
            compression: CompressionAlgorithm::Snappy,
            force_reconvert: false,
        }
    }
}

impl FetcherConfig {
    /// Create configuration with a custom remote catalog
    pub fn with_remote(mut self, remote: RemoteConfig) -> Self {
        self.remote = remote;
        self
    }

    pub fn with_start_year(mut self, start_year: i32) -> Self {
        self.start_year = start_year;
        self
    }

    /// Disable transfer progress bars
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Create configuration with custom worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_compression(mut self, compression: CompressionAlgorithm) -> Self {
        self.compression = compression;
        self
    }

    /// Enable force reconversion
    pub fn with_force_reconvert(mut self) -> Self {
        self.force_reconvert = true;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(PnadcError::Configuration {
                message: "workers must be at least 1".to_string(),
            });
        }
        if self.remote.host.is_empty() {
            return Err(PnadcError::Configuration {
                message: "remote host must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Default local root for downloaded data
pub fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join(DEFAULT_DATA_DIR_NAME))
        .ok_or_else(|| PnadcError::Configuration {
            message: "Could not determine user data directory".to_string(),
        })
}
