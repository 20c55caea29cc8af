//! Bulk conversion of fetched archives to Parquet.
//!
//! Archives are independent, so each one is decoded on its own blocking
//! worker with a shared read-only dictionary. A failing archive is recorded
//! in the statistics and does not stop the others.

use crate::config::FetcherConfig;
use crate::decoder::{FixedWidthDecoder, with_record_source};
use crate::error::{PnadcError, Result};
use crate::models::ConversionStats;
use crate::schema::SchemaDictionary;
use crate::writer::{FrameBuilder, ParquetSink};

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task;
use tracing::{debug, info, warn};

/// Result of converting one archive
#[derive(Debug)]
pub enum ConversionOutcome {
    Converted { output: PathBuf, rows: usize },
    Skipped { output: PathBuf },
}

/// Parquet path for an archive: same stem, `.parquet` extension
pub fn output_path_for(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    output_dir.join(format!("{}.parquet", stem))
}

/// Decode one archive and write its Parquet file
pub fn convert_file(
    dictionary: &SchemaDictionary,
    input: &Path,
    output: &Path,
    sink: &ParquetSink,
) -> Result<usize> {
    let decoder = FixedWidthDecoder::new(dictionary);

    let mut df = with_record_source(input, |reader| {
        let mut builder = FrameBuilder::new(dictionary);
        for row in decoder.rows(reader) {
            builder.push_row(row?);
        }
        builder.finish()
    })
    .map_err(|e| match e {
        PnadcError::Decode { .. } | PnadcError::Polars(_) => PnadcError::ProcessingFailed {
            path: input.to_path_buf(),
            reason: e.to_string(),
        },
        other => other,
    })?;

    let rows = df.height();
    sink.write(&mut df, output)?;
    Ok(rows)
}

/// Converts many archives in parallel
pub struct BulkConverter {
    dictionary: Arc<SchemaDictionary>,
    output_dir: PathBuf,
    config: FetcherConfig,
}

impl BulkConverter {
    pub fn new(dictionary: SchemaDictionary, output_dir: PathBuf, config: FetcherConfig) -> Self {
        Self {
            dictionary: Arc::new(dictionary),
            output_dir,
            config,
        }
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) | {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        pb.set_message("Converting");
        pb
    }

    /// Convert `inputs`, at most `config.workers` at a time
    pub async fn convert_all(&self, inputs: Vec<PathBuf>) -> Result<ConversionStats> {
        let start_time = Instant::now();
        let workers = self.config.workers.max(1);
        let progress = self.progress_bar(inputs.len());
        let sink = ParquetSink::new(self.config.compression);

        info!(
            "Converting {} archives with {} workers into {}",
            inputs.len(),
            workers,
            self.output_dir.display()
        );

        let results: Vec<(PathBuf, Result<ConversionOutcome>)> = stream::iter(inputs)
            .map(|input| {
                let dictionary = Arc::clone(&self.dictionary);
                let output = output_path_for(&input, &self.output_dir);
                let force = self.config.force_reconvert;
                let sink = sink.clone();
                let progress = progress.clone();

                async move {
                    let task_input = input.clone();
                    let outcome = task::spawn_blocking(move || -> Result<ConversionOutcome> {
                        if !force && output.exists() {
                            debug!("{} already converted", output.display());
                            return Ok(ConversionOutcome::Skipped { output });
                        }
                        let rows = convert_file(&dictionary, &task_input, &output, &sink)?;
                        Ok(ConversionOutcome::Converted { output, rows })
                    })
                    .await
                    .unwrap_or_else(|e| {
                        Err(PnadcError::ProcessingFailed {
                            path: input.clone(),
                            reason: format!("Worker task failed: {}", e),
                        })
                    });

                    progress.inc(1);
                    (input, outcome)
                }
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        let mut stats = ConversionStats::default();
        for (input, outcome) in results {
            match outcome {
                Ok(ConversionOutcome::Converted { output, rows }) => {
                    stats.files_converted += 1;
                    stats.total_rows += rows;
                    stats.outputs.push(output);
                }
                Ok(ConversionOutcome::Skipped { .. }) => stats.files_skipped += 1,
                Err(e) => {
                    warn!("Failed to convert {}: {}", input.display(), e);
                    stats.failures.push((input, e.to_string()));
                }
            }
        }
        stats.outputs.sort();

        progress.finish_with_message(format!(
            "{} converted, {} skipped, {} failed",
            stats.files_converted,
            stats.files_skipped,
            stats.files_failed()
        ));
        stats.processing_time_ms = start_time.elapsed().as_millis();
        Ok(stats)
    }
}
