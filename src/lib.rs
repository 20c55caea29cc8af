//! PNAD Contínua Fetcher Library
//!
//! Mirrors the IBGE quarterly PNAD Contínua microdata catalog into a local
//! directory and decodes the fixed-width microdata into Parquet.
//!
//! This library provides tools for:
//! - Parsing FTP `ls -l` listings into remote entries
//! - Resolving the reference quarter of each published data file
//! - Deriving stable, revision-stamped local file names
//! - Incremental, idempotent syncing through a [`sync::RemoteCatalog`]
//! - Parsing the SAS input dictionary and decoding fixed-width records
//! - Writing Parquet files in parallel

pub mod config;
pub mod constants;
pub mod convert;
pub mod decoder;
pub mod error;
pub mod ftp;
pub mod listing;
pub mod models;
pub mod naming;
pub mod period;
pub mod schema;
pub mod storage;
pub mod sync;
pub mod writer;

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use config::{CompressionAlgorithm, FetcherConfig, RemoteConfig};
pub use decoder::{FieldValue, FixedWidthDecoder};
pub use error::{CatalogError, PnadcError, Result};
pub use models::{FileRole, Period, RemoteEntry, SyncReport};
pub use schema::{ColumnSpec, ColumnType, SchemaDictionary};
pub use sync::{RemoteCatalog, SyncPlanner};
