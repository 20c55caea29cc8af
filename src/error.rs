//! Error handling for PNADC fetching and decoding operations.
//!
//! Provides error types with context for remote listing parsing, period
//! resolution, schema dictionary parsing, fixed-width decoding and transfer
//! failures.

use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by a remote catalog (the FTP server or a test double).
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The server refused access to a path. Entering a year directory that
    /// does not exist surfaces as this variant.
    #[error("Permission denied for remote path {path}: {reason}")]
    PermissionDenied { path: String, reason: String },

    #[error("Transport failure on remote path {path}: {reason}")]
    Transport { path: String, reason: String },
}

impl CatalogError {
    pub fn permission_denied(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn transport(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error signals a denied directory rather than a broken link
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }
}

#[derive(Error, Debug)]
pub enum PnadcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Remote catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Malformed listing line in {directory}: {reason} ({line:?})")]
    ListingParse {
        directory: String,
        line: String,
        reason: String,
    },

    #[error("No quarter/year token found in data filename: {filename}")]
    PeriodParse { filename: String },

    #[error("Cannot derive a canonical name for {filename}: {reason}")]
    InvalidFilename { filename: String, reason: String },

    #[error("Malformed schema line {line_number}: {reason}")]
    SchemaLine { line_number: usize, reason: String },

    #[error("Decode error on record {record} column {column}: invalid numeric value {value:?}")]
    Decode {
        record: usize,
        column: String,
        value: String,
    },

    #[error("Archive is empty: {path}")]
    EmptyArchive { path: PathBuf },

    #[error("Member {member} not found in archive {path}")]
    MissingArchiveMember { path: PathBuf, member: String },

    #[error("Invalid file pattern {pattern}: {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("Processing failed for file: {path} - {reason}")]
    ProcessingFailed { path: PathBuf, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Processing interrupted: {reason}")]
    Interrupted { reason: String },
}

pub type Result<T> = std::result::Result<T, PnadcError>;
