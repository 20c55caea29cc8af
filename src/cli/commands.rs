//! Command implementations for the PNAD Contínua fetcher CLI
//!
//! FTP sessions are blocking, so every sync pass runs on a blocking worker
//! thread while the async runtime stays free to observe Ctrl+C.

use crate::cli::args::{Args, Commands, ConvertArgs, DataArgs, DictionaryArgs, DocArgs, UnzipArgs};
use crate::config::FetcherConfig;
use crate::constants::{
    ARCHIVE_EXTENSION, DICTIONARY_ARCHIVE, DICTIONARY_MEMBER, DOC_SUBDIR, TEXT_EXTENSION,
};
use crate::convert::BulkConverter;
use crate::error::PnadcError;
use crate::ftp::FtpCatalog;
use crate::models::{ConversionStats, SyncReport};
use crate::storage::{find_doc_revision, latest_files, load_dictionary, unzip_archive};
use crate::sync::SyncPlanner;
use anyhow::{Context, Result};
use colored::*;
use indicatif::HumanDuration;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::task;
use tracing::{debug, info, warn};

/// Set up structured logging on stderr
pub fn setup_logging(args: &Args) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pnadc_fetcher={}", log_level)));

    if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    debug!("Logging initialized at level: {}", log_level);
}

/// Dispatch to the subcommand handler
pub async fn run(args: Args) -> Result<()> {
    let Some(command) = args.command else {
        anyhow::bail!("No command given; run with --help to list commands");
    };

    match command {
        Commands::Doc(doc_args) => run_doc(doc_args).await,
        Commands::Data(data_args) => run_data(data_args).await,
        Commands::Fetch(data_args) => run_fetch(data_args).await,
        Commands::Unzip(unzip_args) => run_unzip(unzip_args).await,
        Commands::Convert(convert_args) => run_convert(convert_args).await,
        Commands::Dictionary(dictionary_args) => run_dictionary(dictionary_args),
    }
}

/// Drive `command` until it finishes or `signal` delivers an interrupt
///
/// A signal listener that fails to install never interrupts the command.
pub async fn run_until_interrupted<F, S>(command: F, signal: S) -> Result<()>
where
    F: Future<Output = Result<()>>,
    S: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(command);
    tokio::select! {
        result = &mut command => result,
        signal = signal => match signal {
            Ok(()) => {
                eprintln!("\nReceived CTRL+C, shutting down...");
                Err(PnadcError::Interrupted {
                    reason: "Interrupted by user".to_string(),
                }
                .into())
            }
            Err(e) => {
                warn!("Failed to listen for CTRL+C: {}", e);
                command.await
            }
        },
    }
}

/// Open one FTP session, hand it to `f` and close it
fn with_ftp_session<T>(
    config: &FetcherConfig,
    f: impl FnOnce(&mut SyncPlanner<'_, FtpCatalog>) -> crate::Result<T>,
) -> crate::Result<T> {
    let mut catalog = FtpCatalog::connect(&config.remote)?;
    let result = {
        let mut planner = SyncPlanner::new(&mut catalog, config);
        f(&mut planner)
    };
    if let Err(e) = catalog.quit() {
        warn!("Failed to close FTP session: {}", e);
    }
    result
}

async fn run_doc(args: DocArgs) -> Result<()> {
    let doc_dir = args.doc_dir()?;
    let mut config = FetcherConfig::default();
    if args.no_progress {
        config = config.without_progress();
    }
    config.validate()?;

    let started = Instant::now();
    let target = doc_dir.clone();
    let report = task::spawn_blocking(move || {
        with_ftp_session(&config, |planner| planner.sync_documentation(&target))
    })
    .await
    .context("Documentation sync task failed")?
    .with_context(|| format!("Failed to sync documentation into {}", doc_dir.display()))?;

    print_sync_report("Documentation", &doc_dir, &report, started.elapsed());
    check_sync_failures(&[&report])
}

async fn run_data(args: DataArgs) -> Result<()> {
    let data_dir = args.data_dir()?;
    let config = args.to_config();
    config.validate()?;

    let started = Instant::now();
    let target = data_dir.clone();
    let report = task::spawn_blocking(move || {
        with_ftp_session(&config, |planner| planner.sync_data(&target))
    })
    .await
    .context("Data sync task failed")?
    .with_context(|| format!("Failed to sync data into {}", data_dir.display()))?;

    print_sync_report("Data", &data_dir, &report, started.elapsed());
    check_sync_failures(&[&report])
}

async fn run_fetch(args: DataArgs) -> Result<()> {
    let data_dir = args.data_dir()?;
    let doc_dir = data_dir.join(DOC_SUBDIR);
    let config = args.to_config();
    config.validate()?;

    let started = Instant::now();
    let (data_target, doc_target) = (data_dir.clone(), doc_dir.clone());
    let (data_report, doc_report) = task::spawn_blocking(move || {
        with_ftp_session(&config, |planner| {
            let data = planner.sync_data(&data_target)?;
            let docs = planner.sync_documentation(&doc_target)?;
            Ok((data, docs))
        })
    })
    .await
    .context("Fetch task failed")?
    .with_context(|| format!("Failed to fetch into {}", data_dir.display()))?;

    let elapsed = started.elapsed();
    print_sync_report("Data", &data_dir, &data_report, elapsed);
    print_sync_report("Documentation", &doc_dir, &doc_report, elapsed);
    check_sync_failures(&[&data_report, &doc_report])
}

async fn run_unzip(args: UnzipArgs) -> Result<()> {
    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => crate::config::default_data_dir()?,
    };
    let dest_dir = args.dest_dir.unwrap_or_else(|| data_dir.clone());

    let (extracted, skipped) = task::spawn_blocking(move || -> Result<(Vec<PathBuf>, usize)> {
        let archives = latest_files(&data_dir, ARCHIVE_EXTENSION)?;
        info!("Found {} periods in {}", archives.len(), data_dir.display());

        let mut extracted = Vec::new();
        let mut skipped = 0;
        for archive in &archives {
            match unzip_archive(archive, &dest_dir)
                .with_context(|| format!("Failed to extract {}", archive.path.display()))?
            {
                Some(path) => extracted.push(path),
                None => skipped += 1,
            }
        }
        Ok((extracted, skipped))
    })
    .await
    .context("Unzip task failed")??;

    println!("\n{}", "Extraction complete".bright_green().bold());
    println!("   • Extracted: {}", extracted.len().to_string().bright_cyan());
    println!("   • Already present: {}", skipped);
    for path in &extracted {
        println!("     {}", path.display());
    }
    Ok(())
}

/// Dictionary path given on the command line, or the newest stored revision
fn resolve_dictionary(args: &ConvertArgs, data_dir: &Path) -> Result<PathBuf> {
    if let Some(path) = &args.dictionary {
        return Ok(path.clone());
    }
    let doc_dir = data_dir.join(DOC_SUBDIR);
    find_doc_revision(&doc_dir, DICTIONARY_ARCHIVE)?.with_context(|| {
        format!(
            "No {} found in {}; run `doc` or pass --dictionary",
            DICTIONARY_ARCHIVE,
            doc_dir.display()
        )
    })
}

async fn run_convert(args: ConvertArgs) -> Result<()> {
    let data_dir = args.data_dir()?;
    let config = args.to_config()?;
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| data_dir.join("parquet"));

    let dictionary_path = resolve_dictionary(&args, &data_dir)?;
    let (dictionary, rejected) = load_dictionary(&dictionary_path, DICTIONARY_MEMBER)
        .with_context(|| format!("Failed to read dictionary {}", dictionary_path.display()))?;
    if dictionary.is_empty() {
        anyhow::bail!("Dictionary {} has no columns", dictionary_path.display());
    }
    info!(
        "Loaded {} columns from {} ({} lines rejected)",
        dictionary.len(),
        dictionary_path.display(),
        rejected.len()
    );

    let extension = if args.from_text {
        TEXT_EXTENSION
    } else {
        ARCHIVE_EXTENSION
    };
    let inputs: Vec<PathBuf> = latest_files(&data_dir, extension)?
        .into_iter()
        .map(|archive| archive.path)
        .collect();
    if inputs.is_empty() {
        warn!("No .{} files found in {}", extension, data_dir.display());
    }

    let converter = BulkConverter::new(dictionary, output_dir.clone(), config);
    let stats = converter.convert_all(inputs).await?;

    print_conversion_stats(&output_dir, &stats);
    if !stats.failures.is_empty() {
        anyhow::bail!("{} files failed to convert", stats.files_failed());
    }
    Ok(())
}

fn run_dictionary(args: DictionaryArgs) -> Result<()> {
    let (dictionary, rejected) = load_dictionary(&args.path, DICTIONARY_MEMBER)
        .with_context(|| format!("Failed to read dictionary {}", args.path.display()))?;

    println!(
        "{} {} columns, record width {}",
        "Dictionary:".bright_green().bold(),
        dictionary.len(),
        dictionary.record_width()
    );
    for spec in dictionary.columns() {
        println!(
            "  {:>6} {:>4}  {:<12} {:<8} {}",
            spec.start,
            spec.width,
            spec.name.bright_cyan(),
            format!("{:?}", spec.column_type),
            spec.description
        );
    }

    if !rejected.is_empty() {
        println!("\n{} {}", "Rejected lines:".yellow().bold(), rejected.len());
        for error in &rejected {
            println!("  line {}: {} ({})", error.line_number, error.line.trim(), error.reason);
        }
    }
    if !dictionary.offsets_are_ordered() {
        warn!("Column start offsets decrease somewhere in the dictionary");
    }
    Ok(())
}

/// Format a byte count in human-readable units
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Fail the command when any entry of the given passes failed
fn check_sync_failures(reports: &[&SyncReport]) -> Result<()> {
    let failed: usize = reports.iter().map(|r| r.failures.len()).sum();
    if failed > 0 {
        anyhow::bail!("{} remote entries failed to sync", failed);
    }
    Ok(())
}

fn print_sync_report(title: &str, root: &Path, report: &SyncReport, elapsed: Duration) {
    println!(
        "\n{} {}",
        format!("{} sync complete:", title).bright_green().bold(),
        root.display()
    );
    println!("   • Fetched: {}", report.fetched.len().to_string().bright_cyan());
    println!("   • Already present: {}", report.skipped.len());
    println!("   • Transferred: {}", format_size(report.bytes_transferred));
    println!("   • Time: {}", HumanDuration(elapsed));

    if report.has_failures() {
        println!(
            "{}",
            format!("   Failed: {} entries", report.failures.len()).red()
        );
        for failure in &report.failures {
            println!("     {}: {}", failure.remote_path, failure.error);
        }
    }
}

fn print_conversion_stats(output_dir: &Path, stats: &ConversionStats) {
    println!(
        "\n{} {}",
        "Conversion complete:".bright_green().bold(),
        output_dir.display()
    );
    println!("   • Converted: {}", stats.files_converted.to_string().bright_cyan());
    println!("   • Already converted: {}", stats.files_skipped);
    println!("   • Rows written: {}", stats.total_rows);
    println!(
        "   • Time: {}",
        HumanDuration(Duration::from_millis(stats.processing_time_ms as u64))
    );

    if !stats.failures.is_empty() {
        println!("{}", format!("   Failed: {}", stats.files_failed()).red());
        for (path, reason) in &stats.failures {
            println!("     {}: {}", path.display(), reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryFailure;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_entry_failures_fail_the_command() {
        let clean = SyncReport::default();
        assert!(check_sync_failures(&[&clean]).is_ok());

        let failed = SyncReport {
            failures: vec![EntryFailure {
                remote_path: "/Trimestral/Microdados/2012/PNADC_002012.zip".to_string(),
                error: PnadcError::PeriodParse {
                    filename: "PNADC_002012.zip".to_string(),
                },
            }],
            ..Default::default()
        };
        let err = check_sync_failures(&[&clean, &failed]).unwrap_err();
        assert!(err.to_string().contains("1 remote entries failed"));
    }

    #[test]
    fn test_resolve_dictionary_prefers_explicit_path() {
        let temp_dir = TempDir::new().unwrap();
        let args = Args::parse_from([
            "pnadc-fetcher",
            "convert",
            "--dictionary",
            "/tmp/input.txt",
        ]);
        let Some(Commands::Convert(convert)) = args.command else {
            panic!("Expected convert command");
        };
        assert_eq!(
            resolve_dictionary(&convert, temp_dir.path()).unwrap(),
            PathBuf::from("/tmp/input.txt")
        );
    }

    #[test]
    fn test_resolve_dictionary_falls_back_to_doc_dir() {
        let temp_dir = TempDir::new().unwrap();
        let doc_dir = temp_dir.path().join(DOC_SUBDIR);
        std::fs::create_dir_all(&doc_dir).unwrap();

        let args = Args::parse_from(["pnadc-fetcher", "convert"]);
        let Some(Commands::Convert(convert)) = args.command else {
            panic!("Expected convert command");
        };
        assert!(resolve_dictionary(&convert, temp_dir.path()).is_err());

        std::fs::write(doc_dir.join("Dicionario_e_input@20231109.zip"), b"").unwrap();
        assert_eq!(
            resolve_dictionary(&convert, temp_dir.path()).unwrap(),
            doc_dir.join("Dicionario_e_input@20231109.zip")
        );
    }

    #[tokio::test]
    async fn test_failed_signal_listener_does_not_interrupt() {
        let signal = async { Err(std::io::Error::other("no signal handler")) };
        let command = async {
            tokio::task::yield_now().await;
            Ok(())
        };
        assert!(run_until_interrupted(command, signal).await.is_ok());
    }

    #[tokio::test]
    async fn test_delivered_signal_interrupts() {
        let signal = async { Ok(()) };
        let command = std::future::pending::<Result<()>>();
        let err = run_until_interrupted(command, signal).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PnadcError>(),
            Some(PnadcError::Interrupted { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_without_command_fails() {
        let args = Args::parse_from(["pnadc-fetcher"]);
        assert!(run(args).await.is_err());
    }
}
