//! Command-line argument definitions for the PNAD Contínua fetcher
//!
//! Every subcommand is idempotent: re-running it only does the work that is
//! still missing on disk.

use crate::config::{CompressionAlgorithm, FetcherConfig, default_data_dir};
use crate::constants::DOC_SUBDIR;
use crate::error::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for the PNAD Contínua fetcher
///
/// Mirrors the quarterly PNAD Contínua microdata published by IBGE, extracts
/// the archives and converts them to Parquet.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pnadc-fetcher",
    version,
    about = "Download and convert IBGE PNAD Contínua quarterly microdata",
    long_about = "Mirrors the IBGE FTP catalog of PNAD Contínua quarterly microdata into a local \
                  directory using stable, revision-stamped file names. Files already present are \
                  never downloaded twice. Downloaded archives can be extracted and decoded with the \
                  published SAS input dictionary into Parquet files."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Only show errors. Overrides verbose settings.
    #[arg(short = 'q', long = "quiet", global = true)]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Download the documentation directory
    Doc(DocArgs),
    /// Download the quarterly microdata archives
    Data(DataArgs),
    /// Download data, then documentation into `<data-dir>/[doc]`
    Fetch(DataArgs),
    /// Extract the newest revision of every period to text files
    Unzip(UnzipArgs),
    /// Decode microdata files to Parquet
    Convert(ConvertArgs),
    /// Parse and print a SAS input dictionary
    Dictionary(DictionaryArgs),
}

#[derive(Debug, Clone, Parser)]
pub struct DocArgs {
    /// Destination directory for documentation files
    #[arg(long = "doc-dir", value_name = "PATH")]
    pub doc_dir: Option<PathBuf>,

    /// Hide per-file transfer progress bars
    #[arg(long = "no-progress")]
    pub no_progress: bool,
}

impl DocArgs {
    pub fn doc_dir(&self) -> Result<PathBuf> {
        match &self.doc_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(default_data_dir()?.join(DOC_SUBDIR)),
        }
    }
}

#[derive(Debug, Clone, Parser)]
pub struct DataArgs {
    /// Destination directory for data archives
    #[arg(long = "data-dir", value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// First year to enumerate
    #[arg(long = "start-year", value_name = "YEAR")]
    pub start_year: Option<i32>,

    /// Hide per-file transfer progress bars
    #[arg(long = "no-progress")]
    pub no_progress: bool,
}

impl DataArgs {
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_data_dir(),
        }
    }

    pub fn to_config(&self) -> FetcherConfig {
        let mut config = FetcherConfig::default();
        if let Some(year) = self.start_year {
            config = config.with_start_year(year);
        }
        if self.no_progress {
            config = config.without_progress();
        }
        config
    }
}

#[derive(Debug, Clone, Parser)]
pub struct UnzipArgs {
    /// Directory holding downloaded archives
    #[arg(long = "data-dir", value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Directory receiving extracted text files (defaults to the data directory)
    #[arg(long = "dest-dir", value_name = "PATH")]
    pub dest_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Parser)]
pub struct ConvertArgs {
    /// Directory holding downloaded archives or extracted text files
    #[arg(long = "data-dir", value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// SAS input dictionary, plain or inside the dictionary zip
    ///
    /// Defaults to the newest `Dicionario_e_input` archive in `<data-dir>/[doc]`.
    #[arg(long = "dictionary", value_name = "FILE")]
    pub dictionary: Option<PathBuf>,

    /// Output directory for Parquet files (defaults to `<data-dir>/parquet`)
    #[arg(short = 'o', long = "output-dir", value_name = "PATH")]
    pub output_dir: Option<PathBuf>,

    /// Convert extracted `.txt` files instead of `.zip` archives
    #[arg(long = "from-text")]
    pub from_text: bool,

    /// Number of parallel workers
    #[arg(short = 'j', long = "workers", value_name = "COUNT")]
    pub workers: Option<usize>,

    /// Parquet compression algorithm (snappy, zstd, lz4, none)
    #[arg(long = "compression", default_value = "snappy")]
    pub compression: String,

    /// Re-convert files whose Parquet output already exists
    #[arg(long = "force")]
    pub force: bool,

    /// Hide the conversion progress bar
    #[arg(long = "no-progress")]
    pub no_progress: bool,
}

impl ConvertArgs {
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_data_dir(),
        }
    }

    pub fn to_config(&self) -> Result<FetcherConfig> {
        let compression: CompressionAlgorithm = self.compression.parse()?;
        let mut config = FetcherConfig::default().with_compression(compression);
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        if self.force {
            config = config.with_force_reconvert();
        }
        if self.no_progress {
            config = config.without_progress();
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Parser)]
pub struct DictionaryArgs {
    /// SAS input file, or the dictionary zip archive
    #[arg(value_name = "FILE")]
    pub path: PathBuf,
}

impl Args {
    /// Log level from the verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }
}
