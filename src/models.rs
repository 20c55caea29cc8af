//! Core data structures and types for PNADC fetching.
//!
//! Defines remote listing entries, survey periods, sync decisions and
//! processing statistics used throughout the library.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One line of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Last modification time as reported by the server
    pub modified: NaiveDateTime,
    /// Size in bytes, absent when the listing field is not numeric
    pub size: Option<u64>,
    pub filename: String,
    /// Directory joined with the filename
    pub full_path: String,
}

/// Survey period identifying one quarterly release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub quarter: u32,
}

impl Period {
    pub fn new(year: i32, quarter: u32) -> Self {
        Self { year, quarter }
    }

    /// `YYYYQQ` label used in canonical names and directory names
    pub fn label(&self) -> String {
        format!("{}{:02}", self.year, self.quarter)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Q{}", self.year, self.quarter)
    }
}

/// Role of a remote entry, which decides its naming scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileRole {
    Documentation,
    Data,
}

/// Per-entry decision of a sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    /// Destination absent, retrieve it
    Fetch,
    /// Destination already present, leave it alone
    Skip,
}

/// Remote entry mapped to its local destination
#[derive(Debug, Clone)]
pub struct PlannedTransfer {
    pub entry: RemoteEntry,
    pub destination: PathBuf,
    pub decision: SyncDecision,
}

/// Entry that could not be planned or fetched
#[derive(Debug)]
pub struct EntryFailure {
    pub remote_path: String,
    pub error: crate::error::PnadcError,
}

/// Outcome of one sync pass
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Destinations written during this pass
    pub fetched: Vec<PathBuf>,
    /// Destinations that already existed
    pub skipped: Vec<PathBuf>,
    /// Entries rejected while planning
    pub failures: Vec<EntryFailure>,
    pub bytes_transferred: u64,
}

impl SyncReport {
    pub fn merge(&mut self, other: SyncReport) {
        self.fetched.extend(other.fetched);
        self.skipped.extend(other.skipped);
        self.failures.extend(other.failures);
        self.bytes_transferred += other.bytes_transferred;
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Statistics for a bulk conversion run
#[derive(Debug, Default)]
pub struct ConversionStats {
    pub files_converted: usize,
    pub files_skipped: usize,
    pub total_rows: usize,
    pub failures: Vec<(PathBuf, String)>,
    pub outputs: Vec<PathBuf>,
    pub processing_time_ms: u128,
}

impl ConversionStats {
    pub fn files_failed(&self) -> usize {
        self.failures.len()
    }
}
