//! Local archive store helpers.
//!
//! Works on files already laid out by the data sync: recognises canonical
//! data names, selects the newest revision of each period and extracts
//! archives to fixed-width text files.

use crate::constants::{ARCHIVE_EXTENSION, DATASET_TAG, REVISION_DATE_FORMAT, TEXT_EXTENSION};
use crate::error::{PnadcError, Result};
use crate::models::Period;
use crate::schema::{SchemaDictionary, SchemaLineError};
use chrono::NaiveDate;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tempfile::NamedTempFile;
use tracing::{debug, info};

static STORED_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^pnadc_(\d{4})(\d{2})_(\d{8})$").expect("stored name pattern is a valid regex")
});

/// Directory as a literal glob prefix; the documentation directory is `[doc]`
fn escaped_dir(dir: &Path) -> String {
    glob::Pattern::escape(&dir.display().to_string())
}

/// A canonical data file found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArchive {
    pub path: PathBuf,
    pub period: Period,
    pub revision: NaiveDate,
}

impl StoredArchive {
    /// Recognise `pnadc_{YYYY}{QQ}_{YYYYMMDD}.{ext}`
    pub fn from_path(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?;
        let captures = STORED_NAME_PATTERN.captures(stem)?;

        let year = captures[1].parse().ok()?;
        let quarter: u32 = captures[2].parse().ok()?;
        if !(1..=4).contains(&quarter) {
            return None;
        }
        let revision = NaiveDate::parse_from_str(&captures[3], REVISION_DATE_FORMAT).ok()?;

        Some(Self {
            path: path.to_path_buf(),
            period: Period::new(year, quarter),
            revision,
        })
    }

    /// File name of the extracted text member
    pub fn text_filename(&self) -> String {
        format!(
            "{}_{}_{}.{}",
            DATASET_TAG,
            self.period.label(),
            self.revision.format(REVISION_DATE_FORMAT),
            TEXT_EXTENSION
        )
    }
}

/// Newest revision of every period under `data_dir`, ordered by period
pub fn latest_files(data_dir: &Path, extension: &str) -> Result<Vec<StoredArchive>> {
    let pattern = format!(
        "{}/**/{}_*.{}",
        escaped_dir(data_dir),
        DATASET_TAG,
        extension
    );
    let paths = glob::glob(&pattern).map_err(|e| PnadcError::Pattern {
        pattern: pattern.clone(),
        reason: e.to_string(),
    })?;

    let mut latest: BTreeMap<Period, StoredArchive> = BTreeMap::new();
    for path in paths {
        let path = path.map_err(|e| PnadcError::Io(e.into_error()))?;
        let Some(archive) = StoredArchive::from_path(&path) else {
            debug!("Ignoring non-canonical file {}", path.display());
            continue;
        };

        match latest.get(&archive.period) {
            Some(current) if current.revision >= archive.revision => {}
            _ => {
                latest.insert(archive.period, archive);
            }
        }
    }

    Ok(latest.into_values().collect())
}

/// Extract the first member of `archive` to
/// `{dest_dir}/{YYYY}{QQ}/pnadc_{YYYY}{QQ}_{YYYYMMDD}.txt`
///
/// Returns `None` when the text file already exists.
pub fn unzip_archive(archive: &StoredArchive, dest_dir: &Path) -> Result<Option<PathBuf>> {
    let period_dir = dest_dir.join(archive.period.label());
    let destination = period_dir.join(archive.text_filename());
    if destination.exists() {
        info!("{} already exists, skipping", destination.display());
        return Ok(None);
    }
    std::fs::create_dir_all(&period_dir)?;

    let mut zip = zip::ZipArchive::new(File::open(&archive.path)?)?;
    if zip.len() == 0 {
        return Err(PnadcError::EmptyArchive {
            path: archive.path.clone(),
        });
    }
    let mut member = zip.by_index(0)?;
    info!(
        "Extracting {} from {} to {}",
        member.name(),
        archive.path.display(),
        destination.display()
    );

    let mut temp = NamedTempFile::new_in(&period_dir)?;
    io::copy(&mut member, temp.as_file_mut())?;
    temp.persist(&destination).map_err(|e| e.error)?;

    Ok(Some(destination))
}

/// Newest stored revision of the documentation archive `archive_name`
///
/// Documentation files are stored as `{stem}@{YYYYMMDD}.{suffix}`, so the
/// lexicographically greatest match is the newest revision.
pub fn find_doc_revision(doc_dir: &Path, archive_name: &str) -> Result<Option<PathBuf>> {
    let (stem, suffix) = archive_name
        .rsplit_once('.')
        .unwrap_or((archive_name, ""));
    let pattern = format!("{}/{}@*.{}", escaped_dir(doc_dir), stem, suffix);
    let paths = glob::glob(&pattern).map_err(|e| PnadcError::Pattern {
        pattern: pattern.clone(),
        reason: e.to_string(),
    })?;

    let mut newest: Option<PathBuf> = None;
    for path in paths {
        let path = path.map_err(|e| PnadcError::Io(e.into_error()))?;
        if newest.as_ref().is_none_or(|current| path > *current) {
            newest = Some(path);
        }
    }
    Ok(newest)
}

/// Read the SAS input dictionary stored as `member` inside a zip archive
pub fn read_dictionary_from_zip(
    archive_path: &Path,
    member: &str,
) -> Result<(SchemaDictionary, Vec<SchemaLineError>)> {
    let mut zip = zip::ZipArchive::new(File::open(archive_path)?)?;

    let mut found = None;
    for i in 0..zip.len() {
        let name = zip.by_index(i)?.name().to_string();
        if name.rsplit('/').next() == Some(member) {
            found = Some(i);
            break;
        }
    }
    let index = found.ok_or_else(|| PnadcError::MissingArchiveMember {
        path: archive_path.to_path_buf(),
        member: member.to_string(),
    })?;

    let file = zip.by_index(index)?;
    SchemaDictionary::parse(BufReader::new(file))
}

/// Read a dictionary from a plain SAS input file, or from a zip archive
/// holding `member`
pub fn load_dictionary(path: &Path, member: &str) -> Result<(SchemaDictionary, Vec<SchemaLineError>)> {
    let is_zip = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION));
    if is_zip {
        read_dictionary_from_zip(path, member)
    } else {
        SchemaDictionary::parse(BufReader::new(File::open(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_zip(path: &Path, member: &str, content: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        zip.start_file(member, zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(content).unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn test_stored_archive_from_path() {
        let archive =
            StoredArchive::from_path(Path::new("/d/201204/pnadc_201204_20210101.zip")).unwrap();
        assert_eq!(archive.period, Period::new(2012, 4));
        assert_eq!(archive.revision, NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        assert_eq!(archive.text_filename(), "pnadc_201204_20210101.txt");

        assert!(StoredArchive::from_path(Path::new("/d/PNADC_042012.zip")).is_none());
        assert!(StoredArchive::from_path(Path::new("/d/pnadc_201204_2021.zip")).is_none());
        assert!(StoredArchive::from_path(Path::new("/d/pnadc_201200_20210101.zip")).is_none());
    }

    #[test]
    fn test_latest_files_keeps_newest_revision() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for name in [
            "201201/pnadc_201201_20190101.zip",
            "201201/pnadc_201201_20210315.zip",
            "201202/pnadc_201202_20200101.zip",
            "201202/notes.zip",
        ] {
            let path = root.join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, b"").unwrap();
        }

        let latest = latest_files(root, "zip").unwrap();
        let names: Vec<_> = latest
            .iter()
            .map(|a| a.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["pnadc_201201_20210315.zip", "pnadc_201202_20200101.zip"]
        );
    }

    #[test]
    fn test_unzip_archive_renames_member_and_skips_existing() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = temp_dir.path().join("raw/201301/pnadc_201301_20200101.zip");
        write_zip(&zip_path, "PNADC_012013.txt", b"2013135 1.0\n");
        let archive = StoredArchive::from_path(&zip_path).unwrap();
        let dest = temp_dir.path().join("text");

        let extracted = unzip_archive(&archive, &dest).unwrap().unwrap();
        assert_eq!(extracted, dest.join("201301/pnadc_201301_20200101.txt"));
        assert_eq!(std::fs::read(&extracted).unwrap(), b"2013135 1.0\n");

        assert_eq!(unzip_archive(&archive, &dest).unwrap(), None);
    }

    #[test]
    fn test_find_doc_revision_picks_newest() {
        let temp_dir = TempDir::new().unwrap();
        let doc_dir = temp_dir.path().join("[doc]");
        std::fs::create_dir_all(&doc_dir).unwrap();
        for name in [
            "Dicionario_e_input@20190101.zip",
            "Dicionario_e_input@20231109.zip",
            "Deflatores@20240101.zip",
        ] {
            std::fs::write(doc_dir.join(name), b"").unwrap();
        }

        let found = find_doc_revision(&doc_dir, "Dicionario_e_input.zip").unwrap();
        assert_eq!(found, Some(doc_dir.join("Dicionario_e_input@20231109.zip")));
        assert_eq!(find_doc_revision(&doc_dir, "Leia_me.pdf").unwrap(), None);
    }

    #[test]
    fn test_read_dictionary_from_zip() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = temp_dir.path().join("Dicionario_e_input@20231109.zip");
        write_zip(
            &zip_path,
            "Input_PNADC_trimestral.txt",
            b"input\n@0001 Ano $4. /* Ano */\n@0005 Trimestre $1. /* Trimestre */\n;\n",
        );

        let (dictionary, rejected) =
            read_dictionary_from_zip(&zip_path, "Input_PNADC_trimestral.txt").unwrap();
        assert_eq!(dictionary.len(), 2);
        assert!(rejected.is_empty());

        let missing = read_dictionary_from_zip(&zip_path, "Other.txt");
        assert!(matches!(missing, Err(PnadcError::MissingArchiveMember { .. })));
    }
}
