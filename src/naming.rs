//! Canonical local names for remote catalog entries.
//!
//! Names are pure functions of the original filename, the revision
//! timestamp and, for data archives, the survey period:
//!
//! ```text
//! documentation: {stem}@{YYYYMMDD}.{suffix}
//! data:          {YYYY}{QQ}/pnadc_{YYYY}{QQ}_{YYYYMMDD}.{extension}
//! ```
//!
//! Re-released files carry a new revision date and therefore a new name,
//! which makes repeated syncs idempotent.

use crate::constants::{DATASET_TAG, REVISION_DATE_FORMAT};
use crate::error::{PnadcError, Result};
use crate::models::{FileRole, Period, RemoteEntry};
use crate::period::resolve_period;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// Documentation name: `{stem}@{YYYYMMDD}.{suffix}`
pub fn doc_filename(stem: &str, revision: &NaiveDateTime, suffix: &str) -> String {
    format!("{}@{}.{}", stem, revision.format(REVISION_DATE_FORMAT), suffix)
}

/// Data name: `pnadc_{YYYY}{QQ}_{YYYYMMDD}.{extension}`
pub fn data_filename(period: &Period, revision: &NaiveDateTime, extension: &str) -> String {
    format!(
        "{}_{}_{}.{}",
        DATASET_TAG,
        period.label(),
        revision.format(REVISION_DATE_FORMAT),
        extension
    )
}

/// Split a documentation filename on its single dot
fn split_doc_filename(filename: &str) -> Result<(&str, &str)> {
    let invalid = |reason: &str| PnadcError::InvalidFilename {
        filename: filename.to_string(),
        reason: reason.to_string(),
    };

    match filename.split_once('.') {
        Some((_, suffix)) if suffix.contains('.') => Err(invalid("more than one '.'")),
        Some((stem, suffix)) if !stem.is_empty() && !suffix.is_empty() => Ok((stem, suffix)),
        _ => Err(invalid("expected exactly one '.' separating stem and suffix")),
    }
}

/// Extension after the last dot of a data filename
fn data_extension(filename: &str) -> Result<&str> {
    match filename.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => Ok(ext),
        _ => Err(PnadcError::InvalidFilename {
            filename: filename.to_string(),
            reason: "missing extension".to_string(),
        }),
    }
}

/// Destination of a documentation entry inside `doc_dir`
pub fn doc_destination(entry: &RemoteEntry, doc_dir: &Path) -> Result<PathBuf> {
    let (stem, suffix) = split_doc_filename(&entry.filename)?;
    Ok(doc_dir.join(doc_filename(stem, &entry.modified, suffix)))
}

/// Destination of a data entry inside `data_dir`, under its period directory
pub fn data_destination(entry: &RemoteEntry, data_dir: &Path) -> Result<PathBuf> {
    let period = resolve_period(&entry.filename)?;
    let extension = data_extension(&entry.filename)?;
    Ok(data_dir
        .join(period.label())
        .join(data_filename(&period, &entry.modified, extension)))
}

/// Destination for an entry of the given role
pub fn destination(entry: &RemoteEntry, role: FileRole, root: &Path) -> Result<PathBuf> {
    match role {
        FileRole::Documentation => doc_destination(entry, root),
        FileRole::Data => data_destination(entry, root),
    }
}
