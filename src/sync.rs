//! Incremental mirroring of the remote catalog.
//!
//! A sync pass lists remote entries, maps each to its canonical local
//! destination and fetches only the destinations that do not exist yet.
//! Transfers stream into a temporary file next to the destination which is
//! renamed into place on success, so an aborted transfer never looks like a
//! completed file to the next pass.

use crate::config::FetcherConfig;
use crate::error::{CatalogError, Result};
use crate::listing::parse_listing_in_year;
use crate::models::{
    EntryFailure, FileRole, PlannedTransfer, RemoteEntry, SyncDecision, SyncReport,
};
use crate::naming::destination;
use chrono::{Datelike, Local};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// File transfer capability consumed by the sync passes
///
/// Every call names its remote path explicitly. Implementations are used by
/// one operation at a time.
pub trait RemoteCatalog {
    /// Raw `ls -l` style lines of a remote directory
    fn list_directory(&mut self, path: &str) -> std::result::Result<Vec<String>, CatalogError>;

    /// Stream a remote file into `sink`, returning the bytes written
    fn retrieve(
        &mut self,
        remote_path: &str,
        sink: &mut dyn Write,
    ) -> std::result::Result<u64, CatalogError>;

    /// Size of a remote file when the server reports one
    fn size_of(&mut self, remote_path: &str) -> std::result::Result<Option<u64>, CatalogError>;
}

/// Decide whether a destination still needs fetching
pub fn decide(destination: &Path) -> SyncDecision {
    if destination.exists() {
        SyncDecision::Skip
    } else {
        SyncDecision::Fetch
    }
}

/// Map remote entries to destinations under `root`
///
/// Entries whose canonical name cannot be derived are returned as failures
/// and excluded from the plan.
pub fn plan(
    entries: Vec<RemoteEntry>,
    role: FileRole,
    root: &Path,
) -> (Vec<PlannedTransfer>, Vec<EntryFailure>) {
    let mut transfers = Vec::with_capacity(entries.len());
    let mut failures = Vec::new();

    for entry in entries {
        match destination(&entry, role, root) {
            Ok(destination) => {
                let decision = decide(&destination);
                transfers.push(PlannedTransfer {
                    entry,
                    destination,
                    decision,
                });
            }
            Err(error) => {
                warn!("Cannot plan {}: {}", entry.full_path, error);
                failures.push(EntryFailure {
                    remote_path: entry.full_path,
                    error,
                });
            }
        }
    }

    (transfers, failures)
}

fn transfer_progress(show: bool, label: &str, size: Option<u64>) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }

    let pb = match size {
        Some(total) => {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▉▊▋▌▍▎▏  "),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg} {bytes} ({bytes_per_sec})")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb
        }
    };
    pb.set_message(label.to_string());
    pb
}

/// Drives sync passes against one remote catalog
pub struct SyncPlanner<'a, C: RemoteCatalog + ?Sized> {
    catalog: &'a mut C,
    config: &'a FetcherConfig,
    current_year: i32,
}

impl<'a, C: RemoteCatalog + ?Sized> SyncPlanner<'a, C> {
    pub fn new(catalog: &'a mut C, config: &'a FetcherConfig) -> Self {
        Self {
            catalog,
            config,
            current_year: Local::now().year(),
        }
    }

    /// Override the calendar year used for year enumeration and listings
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = year;
        self
    }

    /// List and parse one remote directory as a single unit
    pub fn list_entries(&mut self, directory: &str) -> Result<Vec<RemoteEntry>> {
        let lines = self.catalog.list_directory(directory)?;
        parse_listing_in_year(&lines, directory, self.current_year)
    }

    /// Enumerate data entries year by year until the server denies a year
    pub fn list_data_entries(&mut self) -> Result<Vec<RemoteEntry>> {
        let mut entries = Vec::new();

        for year in self.config.start_year..=self.current_year + 1 {
            let path = self.config.remote.year_path(year);
            let lines = match self.catalog.list_directory(&path) {
                Ok(lines) => lines,
                Err(e) if e.is_permission_denied() => {
                    debug!("No data published for {} ({})", year, e);
                    break;
                }
                Err(e) => return Err(e.into()),
            };
            let year_entries = parse_listing_in_year(&lines, &path, self.current_year)?;
            debug!("Found {} entries for {}", year_entries.len(), year);
            entries.extend(year_entries);
        }

        Ok(entries)
    }

    /// Mirror the documentation directory into `doc_dir`
    pub fn sync_documentation(&mut self, doc_dir: &Path) -> Result<SyncReport> {
        let doc_path = self.config.remote.doc_path.clone();
        info!("Syncing documentation from {}", doc_path);
        let entries = self.list_entries(&doc_path)?;
        let (transfers, failures) = plan(entries, FileRole::Documentation, doc_dir);
        self.execute(transfers, failures)
    }

    /// Mirror every published data year into `data_dir`
    pub fn sync_data(&mut self, data_dir: &Path) -> Result<SyncReport> {
        info!(
            "Syncing data from {} starting at {}",
            self.config.remote.data_path, self.config.start_year
        );
        let entries = self.list_data_entries()?;
        let (transfers, failures) = plan(entries, FileRole::Data, data_dir);
        self.execute(transfers, failures)
    }

    fn execute(
        &mut self,
        transfers: Vec<PlannedTransfer>,
        failures: Vec<EntryFailure>,
    ) -> Result<SyncReport> {
        let mut report = SyncReport {
            failures,
            ..Default::default()
        };

        for transfer in transfers {
            match transfer.decision {
                SyncDecision::Skip => {
                    info!("{} already exists", transfer.destination.display());
                    report.skipped.push(transfer.destination);
                }
                SyncDecision::Fetch => {
                    let bytes = self.fetch(&transfer.entry, &transfer.destination)?;
                    report.bytes_transferred += bytes;
                    report.fetched.push(transfer.destination);
                }
            }
        }

        info!(
            "Sync pass complete: {} fetched, {} skipped, {} failed",
            report.fetched.len(),
            report.skipped.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Retrieve one entry into `destination` via a temporary file
    pub fn fetch(&mut self, entry: &RemoteEntry, destination: &Path) -> Result<u64> {
        let parent = destination.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let expected_size = match entry.size {
            Some(size) => Some(size),
            None => self.catalog.size_of(&entry.full_path).unwrap_or_else(|e| {
                debug!("Size unavailable for {}: {}", entry.full_path, e);
                None
            }),
        };

        info!("Downloading {} --> {}", entry.full_path, destination.display());

        let label = destination
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| entry.filename.clone());
        let progress = transfer_progress(self.config.show_progress, &label, expected_size);

        let mut temp = NamedTempFile::new_in(parent)?;
        let bytes = {
            let mut sink = progress.wrap_write(temp.as_file_mut());
            self.catalog.retrieve(&entry.full_path, &mut sink)?
        };
        temp.as_file_mut().flush()?;
        temp.as_file().sync_all()?;
        temp.persist(destination).map_err(|e| e.error)?;

        progress.finish_and_clear();
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PnadcError;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeCatalog {
        directories: HashMap<String, Vec<String>>,
        files: HashMap<String, Vec<u8>>,
        fail_retrieval: bool,
        retrievals: usize,
    }

    impl RemoteCatalog for FakeCatalog {
        fn list_directory(&mut self, path: &str) -> std::result::Result<Vec<String>, CatalogError> {
            self.directories
                .get(path)
                .cloned()
                .ok_or_else(|| CatalogError::permission_denied(path, "550 No such directory"))
        }

        fn retrieve(
            &mut self,
            remote_path: &str,
            sink: &mut dyn Write,
        ) -> std::result::Result<u64, CatalogError> {
            self.retrievals += 1;
            let data = self
                .files
                .get(remote_path)
                .ok_or_else(|| CatalogError::transport(remote_path, "missing"))?;
            sink.write_all(&data[..data.len() / 2])
                .map_err(|e| CatalogError::transport(remote_path, e.to_string()))?;
            if self.fail_retrieval {
                return Err(CatalogError::transport(remote_path, "connection reset"));
            }
            sink.write_all(&data[data.len() / 2..])
                .map_err(|e| CatalogError::transport(remote_path, e.to_string()))?;
            Ok(data.len() as u64)
        }

        fn size_of(&mut self, remote_path: &str) -> std::result::Result<Option<u64>, CatalogError> {
            Ok(self.files.get(remote_path).map(|d| d.len() as u64))
        }
    }

    fn config() -> FetcherConfig {
        let mut config = FetcherConfig::default().without_progress();
        config.remote.data_path = "/data".to_string();
        config.remote.doc_path = "/doc".to_string();
        config
    }

    fn doc_catalog() -> FakeCatalog {
        let mut catalog = FakeCatalog::default();
        catalog.directories.insert(
            "/doc".to_string(),
            vec![
                "-rw-r--r-- 1 ftp ftp 4 Nov 09 2023 Dicionario_e_input.zip".to_string(),
                "-rw-r--r-- 1 ftp ftp 4 Nov 09 2023 Notas.v2.pdf".to_string(),
            ],
        );
        catalog
            .files
            .insert("/doc/Dicionario_e_input.zip".to_string(), b"dict".to_vec());
        catalog
    }

    #[test]
    fn test_documentation_sync_reports_bad_names() {
        let temp_dir = TempDir::new().unwrap();
        let config = config();
        let mut catalog = doc_catalog();

        let report = SyncPlanner::new(&mut catalog, &config)
            .sync_documentation(temp_dir.path())
            .unwrap();

        let expected = temp_dir.path().join("Dicionario_e_input@20231109.zip");
        assert_eq!(report.fetched, vec![expected.clone()]);
        assert_eq!(std::fs::read(&expected).unwrap(), b"dict");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].remote_path, "/doc/Notas.v2.pdf");
        assert_eq!(report.bytes_transferred, 4);
    }

    #[test]
    fn test_failed_transfer_leaves_no_destination() {
        let temp_dir = TempDir::new().unwrap();
        let config = config();
        let mut catalog = doc_catalog();
        catalog.fail_retrieval = true;

        let result = SyncPlanner::new(&mut catalog, &config).sync_documentation(temp_dir.path());
        assert!(matches!(result, Err(PnadcError::Catalog(CatalogError::Transport { .. }))));

        let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path()).unwrap().collect();
        assert!(leftovers.is_empty(), "partial download was left behind");

        // The next pass must try again rather than skip
        catalog.fail_retrieval = false;
        let report = SyncPlanner::new(&mut catalog, &config)
            .sync_documentation(temp_dir.path())
            .unwrap();
        assert_eq!(report.fetched.len(), 1);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_year_enumeration_stops_at_denied_directory() {
        let config = config();
        let mut catalog = FakeCatalog::default();
        catalog.directories.insert(
            "/data/2012".to_string(),
            vec!["-rw-r--r-- 1 ftp ftp 4 Jan 01 2020 PNADC_012012.zip".to_string()],
        );
        // 2013 missing: enumeration must not reach 2014
        catalog.directories.insert(
            "/data/2014".to_string(),
            vec!["-rw-r--r-- 1 ftp ftp 4 Jan 01 2020 PNADC_012014.zip".to_string()],
        );

        let entries = SyncPlanner::new(&mut catalog, &config)
            .with_current_year(2015)
            .list_data_entries()
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].filename, "PNADC_012012.zip");
    }

    #[test]
    fn test_year_enumeration_includes_next_year() {
        let config = config().with_start_year(2023);
        let mut catalog = FakeCatalog::default();
        for year in 2023..=2025 {
            catalog.directories.insert(
                format!("/data/{}", year),
                vec![format!(
                    "-rw-r--r-- 1 ftp ftp 4 Jan 01 2020 PNADC_01{}.zip",
                    year
                )],
            );
        }

        let entries = SyncPlanner::new(&mut catalog, &config)
            .with_current_year(2024)
            .list_data_entries()
            .unwrap();
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn test_plan_marks_existing_destinations() {
        let temp_dir = TempDir::new().unwrap();
        let existing = temp_dir.path().join("201201").join("pnadc_201201_20200101.zip");
        std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
        std::fs::write(&existing, b"x").unwrap();

        let entries = parse_listing_in_year(
            &[
                "-rw-r--r-- 1 ftp ftp 4 Jan 01 2020 PNADC_012012.zip",
                "-rw-r--r-- 1 ftp ftp 4 Jan 01 2020 PNADC_022012.zip",
                "-rw-r--r-- 1 ftp ftp 4 Jan 01 2020 Leia_me.txt",
            ],
            "/data/2012",
            2024,
        )
        .unwrap();

        let (transfers, failures) = plan(entries, FileRole::Data, temp_dir.path());
        assert_eq!(transfers.len(), 2);
        assert_eq!(transfers[0].decision, SyncDecision::Skip);
        assert_eq!(transfers[1].decision, SyncDecision::Fetch);
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].error, PnadcError::PeriodParse { .. }));
    }

    #[test]
    fn test_listing_error_fails_the_pass() {
        let temp_dir = TempDir::new().unwrap();
        let config = config();
        let mut catalog = FakeCatalog::default();
        catalog
            .directories
            .insert("/doc".to_string(), vec!["not a listing line".to_string()]);

        let result = SyncPlanner::new(&mut catalog, &config).sync_documentation(temp_dir.path());
        assert!(matches!(result, Err(PnadcError::ListingParse { .. })));
        assert_eq!(catalog.retrievals, 0);
    }
}
