use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Instant;

use super::chunk_reader::{Chunk, ChunkReader};
use super::cluster::{cluster_by_parameter, ParameterClusters};
use super::config::Config;
use super::error::{ProcessFailure, ProcessorError, SkipReason};
use super::extractor::{Extractor, LineOutcome};
use super::merger::Merger;
use super::record::{CanonicalRecord, DatasetRow, RawStatRecord};
use super::registry::Registry;
use super::statistics::{RunStatistics, SkippedLine};
use super::validator::validate;
use super::worker_status::{CancelToken, WorkerStatus};

/// A candidate after extraction and validation: either ready to merge or skipped
type Candidate = Result<RawStatRecord, SkippedLine>;

/// Everything produced for one log file
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    /// Merged records ordered by canonical name then timestamp
    pub dataset: Vec<CanonicalRecord>,
    pub clusters: Vec<ParameterClusters>,
    pub stats: RunStatistics,
}

impl FileReport {
    pub fn rows(&self) -> Vec<DatasetRow> {
        self.dataset.iter().map(|r| r.to_row()).collect()
    }
}

/// Outcome of one file in a batch
pub type FileOutcome = Result<FileReport, ProcessFailure>;

/// Extract and validate every candidate in a chunk, in line order
fn extract_chunk(extractor: &Extractor, chunk: &Chunk) -> Vec<Candidate> {
    extractor
        .extract(chunk)
        .map(|outcome| match outcome {
            LineOutcome::Record(record) => {
                let line_number = record.line_number;
                let identifier = record.raw_identifier.clone();
                validate(record).map_err(|reason| SkippedLine {
                    line_number,
                    identifier,
                    reason,
                })
            }
            LineOutcome::Skipped(skipped) => Err(skipped),
        })
        .collect()
}

/// Extract a batch of chunks in parallel, one scoped thread per chunk.
/// Results come back in chunk order.
fn extract_batch(
    extractor: &Extractor,
    batch: &[Chunk],
) -> Result<Vec<Vec<Candidate>>, ProcessorError> {
    if let [chunk] = batch {
        return Ok(vec![extract_chunk(extractor, chunk)]);
    }
    std::thread::scope(|s| {
        let handles: Vec<_> = batch
            .iter()
            .map(|chunk| s.spawn(move || extract_chunk(extractor, chunk)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().map_err(|_| ProcessorError::WorkerPanic))
            .collect()
    })
}

/// Feed one candidate into the run statistics and, if valid, the merger
fn tally(candidate: Candidate, merger: &mut Merger, stats: &mut RunStatistics) {
    match candidate {
        Ok(record) => {
            stats.observe_identifier(&record.raw_identifier, true);
            if let (Some(unit), Some(def)) = (
                record.unit.as_deref(),
                merger.registry().lookup(&record.raw_identifier),
            ) {
                if !unit.eq_ignore_ascii_case(&def.unit) {
                    stats.unit_mismatches += 1;
                }
            }
            let line_number = record.line_number;
            let identifier = record.raw_identifier.clone();
            match merger.push(record) {
                Ok(()) => stats.valid_records += 1,
                Err(reason) => stats.record_skip(SkippedLine {
                    line_number,
                    identifier,
                    reason,
                }),
            }
        }
        Err(skipped) => {
            let admitted = skipped.reason != SkipReason::UnmappedIdentifier;
            stats.observe_identifier(&skipped.identifier, admitted);
            stats.record_skip(skipped);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_file(
    path: &Path,
    file_index: usize,
    config: &Config,
    registry: &Registry,
    tx: &Sender<WorkerStatus>,
    worker_id: usize,
    cancel: &CancelToken,
    stats: &mut RunStatistics,
) -> Result<(Vec<CanonicalRecord>, Vec<ParameterClusters>), ProcessorError> {
    let extractor = Extractor::new(registry)?;
    let mut reader = ChunkReader::new(path, config.chunk_size_bytes)?;
    let total_data_size = reader.get_total_data_size();
    spdlog::info!(
        "Total file size: {}",
        human_bytes::human_bytes(total_data_size as f64)
    );

    let n_threads = config.n_threads.max(1) as usize;
    let mut merger = Merger::new(registry);
    tx.send(WorkerStatus::new(0.0, file_index, worker_id))?;

    loop {
        if cancel.is_cancelled() {
            spdlog::warn!("Processing of {} was cancelled", path.display());
            return Err(ProcessorError::Cancelled);
        }

        let mut batch: Vec<Chunk> = Vec::with_capacity(n_threads);
        let mut read_error = None;
        while batch.len() < n_threads {
            match reader.get_next_chunk() {
                Ok(Some(chunk)) => batch.push(chunk),
                Ok(None) => break,
                Err(e) => {
                    read_error = Some(e);
                    break;
                }
            }
        }

        // Chunks read before a failure still count toward the partial statistics
        for (chunk, candidates) in batch.iter().zip(extract_batch(&extractor, &batch)?) {
            stats.lines_read += chunk.n_lines;
            stats.bytes_read += chunk.n_bytes;
            stats.chunks_processed += 1;
            for candidate in candidates {
                tally(candidate, &mut merger, stats);
            }
        }

        if let Some(e) = read_error {
            return Err(e.into());
        }
        if batch.is_empty() {
            break;
        }

        spdlog::debug!(
            "Processed {} chunk(s) up to line {}, {} records pending merge",
            batch.len(),
            reader.get_lines_read(),
            merger.len()
        );
        let progress = if total_data_size > 0 {
            reader.get_bytes_read() as f32 / total_data_size as f32
        } else {
            1.0
        };
        tx.send(WorkerStatus::new(progress, file_index, worker_id))?;
    }

    let dataset = merger.finish();
    stats.merged_records = dataset.len() as u64;
    let clusters = cluster_by_parameter(&dataset, &config.gap_policy.to_policy()?)?;
    tx.send(WorkerStatus::new(1.0, file_index, worker_id))?;
    Ok((dataset, clusters))
}

/// Run the full pipeline over a single log file.
///
/// A failure aborts the file; the statistics collected up to that point travel with the
/// error.
pub fn process_file(
    config: &Config,
    registry: &Registry,
    file_index: usize,
    tx: &Sender<WorkerStatus>,
    worker_id: usize,
    cancel: &CancelToken,
) -> FileOutcome {
    let start = Instant::now();
    let mut stats = RunStatistics::new(config.max_skip_samples);
    let path = config.log_paths.get(file_index).cloned().unwrap_or_default();
    let result = run_file(
        &path, file_index, config, registry, tx, worker_id, cancel, &mut stats,
    );
    stats.elapsed_secs = start.elapsed().as_secs_f64();

    match result {
        Ok((dataset, clusters)) => {
            if stats.valid_records == 0 {
                spdlog::warn!("No valid statistics records were found in {}", path.display());
            }
            if stats.unit_mismatches > 0 {
                spdlog::warn!(
                    "{} records in {} declared a unit that differs from the registry",
                    stats.unit_mismatches,
                    path.display()
                );
            }
            spdlog::info!(
                "Finished {}: {} lines, {} valid records, {} skipped, {} merged records in {:.2} s",
                path.display(),
                stats.lines_read,
                stats.valid_records,
                stats.skipped_total(),
                stats.merged_records,
                stats.elapsed_secs
            );
            Ok(FileReport {
                path,
                dataset,
                clusters,
                stats,
            })
        }
        Err(e) => {
            spdlog::error!("Failed to process {}: {}", path.display(), e);
            Err(ProcessFailure::new(e, stats))
        }
    }
}

/// The main loop of linac_trend.
///
/// This takes in a config (and progress monitor) and processes every configured log file in
/// order. Loading the registry is the only failure that stops the whole batch; each file
/// otherwise gets its own outcome. Cancellation ends the batch after the file it hit.
pub fn process(
    config: &Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
    cancel: CancelToken,
) -> Result<Vec<FileOutcome>, ProcessorError> {
    config.validate()?;
    let registry = Registry::new(config.mapping_path.as_deref())?;
    spdlog::info!(
        "Loaded {} parameters from {} raw identifiers",
        registry.len(),
        registry.alias_count()
    );

    let mut outcomes = Vec::with_capacity(config.log_paths.len());
    for (file_index, path) in config.log_paths.iter().enumerate() {
        spdlog::info!("Processing log file {}...", path.display());
        let outcome = process_file(config, &registry, file_index, &tx, worker_id, &cancel);
        let cancelled = matches!(
            &outcome,
            Err(ProcessFailure {
                error: ProcessorError::Cancelled,
                ..
            })
        );
        outcomes.push(outcome);
        if cancelled {
            break;
        }
    }
    Ok(outcomes)
}
