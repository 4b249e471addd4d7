//! # linac_trend_cli
//!
//! Command line front end for liblinac_trend.
//!
//! ## Use
//!
//! Make a template configuration file
//!
//! ```bash
//! linac_trend_cli -p config.yml new
//! ```
//!
//! edit the log paths and output directory, then run
//!
//! ```bash
//! linac_trend_cli -p config.yml
//! ```
//!
//! Detailed library logs are written to `./linac_trend.log`.
use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;

use liblinac_trend::config::Config;
use liblinac_trend::dataset_writer::DatasetWriter;
use liblinac_trend::process::{process, FileReport};
use liblinac_trend::statistics::RunStatistics;
use liblinac_trend::worker_status::{CancelToken, WorkerStatus};

const LOG_FILE: &str = "./linac_trend.log";

fn make_template_config(path: &Path) {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).expect("Could not serialize template config!");
    let mut file = File::create(path).expect("Could create template config file!");
    file.write_all(yaml_str.as_bytes())
        .expect("Failed to write yaml data to file!");
}

/// Send library logs to a file so they do not fight the progress bars
fn init_file_logger() -> Result<(), spdlog::Error> {
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from(LOG_FILE))
            .truncate(true)
            .build()?,
    );
    let logger = Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .build()?,
    );
    spdlog::set_default_logger(logger);
    Ok(())
}

fn log_summary(report: &FileReport) {
    let stats: &RunStatistics = &report.stats;
    log::info!("Results for {}:", report.path.to_string_lossy());
    log::info!(
        "  Read {} lines ({}) in {:.2} s, {:.0} lines/s",
        stats.lines_read,
        human_bytes::human_bytes(stats.bytes_read as f64),
        stats.elapsed_secs,
        stats.lines_per_second()
    );
    log::info!(
        "  Identifiers seen: {} Matched: {} Parameters detected: {}",
        stats.distinct_identifiers_seen,
        stats.distinct_identifiers_matched,
        stats.parameters_detected
    );
    log::info!(
        "  Valid records: {} Merged records: {} Clustered parameters: {}",
        stats.valid_records,
        stats.merged_records,
        report.clusters.len()
    );
    log::info!(
        "  Skipped: {} (unmapped {}, malformed {}, non-finite {}, invalid range {}, non-positive count {})",
        stats.skipped_total(),
        stats.skipped.unmapped_identifier,
        stats.skipped.malformed_value,
        stats.skipped.non_finite_value,
        stats.skipped.invalid_range,
        stats.skipped.non_positive_count
    );
    if stats.valid_records == 0 {
        log::warn!("  No data found in this file.");
    }
}

fn main() {
    // Create a cli
    let matches = Command::new("linac_trend_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");

    if let Err(e) = init_file_logger() {
        log::warn!("Could not create log file {LOG_FILE}: {e}");
    }

    // Parse the cli
    let config_path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );

        make_template_config(&config_path);
        log::info!("Done.");
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");
    for path in config.log_paths.iter() {
        log::info!("Log Path: {}", path.to_string_lossy());
    }
    match &config.mapping_path {
        Some(path) => log::info!("Mapping Path: {}", path.to_string_lossy()),
        None => log::info!("Mapping Path: bundled default"),
    }
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    log::info!(
        "Chunk Size: {} Threads: {}",
        human_bytes::human_bytes(config.chunk_size_bytes as f64),
        config.n_threads
    );

    let output_dir = match config.get_output_directory() {
        Ok(dir) => dir.to_path_buf(),
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };

    // Setup the progress bar
    let pb = pb_manager.add(ProgressBar::new(100));
    pb.set_style(
        ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    let cancel = CancelToken::new();
    let worker_config = config.clone();
    // Spawn the task!
    let handle = std::thread::spawn(move || process(&worker_config, tx, 0, cancel));

    // The channel closes when the worker finishes
    for status in rx.iter() {
        let file_name = config
            .log_paths
            .get(status.file_index)
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        pb.set_message(file_name);
        pb.set_position((status.progress * 100.0) as u64);
    }
    pb.finish();

    let outcomes = match handle.join() {
        Ok(Ok(outcomes)) => outcomes,
        Ok(Err(e)) => {
            log::error!("Processing failed with error: {e}");
            return;
        }
        Err(_) => {
            log::error!("Failed to join processing task!");
            return;
        }
    };

    let writer = DatasetWriter::new(&output_dir);
    for outcome in outcomes {
        match outcome {
            Ok(report) => {
                log_summary(&report);
                match writer.write(&report) {
                    Ok(paths) => log::info!("  Dataset written to {}", paths.dataset.to_string_lossy()),
                    Err(e) => log::error!("  Failed to write outputs: {e}"),
                }
            }
            Err(failure) => {
                log::error!("Processing failed with error: {}", failure.error);
                log::error!(
                    "  Before failing: {} lines read, {} valid records, {} skipped. Check {LOG_FILE} for details.",
                    failure.partial_stats.lines_read,
                    failure.partial_stats.valid_records,
                    failure.partial_stats.skipped_total()
                );
            }
        }
    }

    log::info!("Done.");
}
