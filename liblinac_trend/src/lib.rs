//! # linac_trend
//!
//! linac_trend turns the equipment logs of a linear-accelerator monitoring device into a
//! clean, time-indexed dataset of named physical parameters (flows, voltages, temperatures,
//! humidity, fan speeds). Statistics blocks are picked out of the noisy log text, filtered
//! against a parameter registry, merged across identifiers that describe the same quantity
//! and finally split into gap-free time clusters ready for charting.
//!
//! ## Installation
//!
//! The only method of install is from source. If you have not used Rust before, you will
//! most likely need to install the Rust tool chain. See the
//! [Rust docs](https://www.rust-lang.org/tools/install) for installation instructions.
//!
//! To build and install the CLI use `cargo install --path ./linac_trend_cli` from the top
//! level linac_trend repository.
//!
//! ## Pipeline
//!
//! Each log file is read in line-aligned chunks. Batches of chunks are handed to worker
//! threads which extract and validate statistics blocks; the results are merged in file
//! order by a single merger, which owns all grouping state. Once the file is exhausted the
//! merged series of every parameter is clustered.
//!
//! A statistics block is any line with a `count=` key preceded by a device identifier, for
//! example
//!
//! ```text
//! 2024-03-01 12:00:05 magnetronFlow count=10 min=1.0 max=2.0 avg=1.5
//! 2024-03-01	12:00:05	STN	Info	...	logStatistics CoolingmagnetronFlowLowStatistics: count=5, min=1.2, max=1.8, avg=1.6 L/min
//! ```
//!
//! Only identifiers present in the registry are parsed further. Anything else that is
//! rejected is counted by reason in the run statistics rather than raised as an error.
//!
//! ## Configuration
//!
//! Configuration is a YAML file. The format is as follows:
//!
//! ```yml
//! log_paths:
//! - /data/linac/2024-03-01.log
//! mapping_path: null
//! output_path: /data/linac/out
//! chunk_size_bytes: 1048576
//! n_threads: 4
//! max_skip_samples: 50
//! gap_policy:
//!   interval_multiplier: 3.0
//!   span_fraction: 0.01
//!   min_threshold_secs: 300
//!   max_threshold_secs: 604800
//! ```
//!
//! Note that if the `mapping_path` field is set to `null`, the bundled default map will be
//! used.
//!
//! ### Mapping Format
//!
//! The mapping is a text file with one raw identifier per line:
//!
//! ```text
//! raw identifier | canonical name | unit | category [| expected min | expected max]
//! ```
//!
//! Lines starting with `#` are comments. Repeating a canonical name makes the raw
//! identifiers aliases, whose records are merged. Aliases must agree on unit and category.
//! The category is one of `cooling`, `voltages`, `temperature`, `environmental` or
//! `diagnostics`.
//!
//! ## Output
//!
//! For every log file three files are written to the output directory: a CSV dataset with
//! one row per merged record, a YAML run report and a YAML outline of the time clusters.
//! Detailed progress is written to a log file; check it whenever a warning shows up in the
//! terminal.
pub mod category;
pub mod chunk_reader;
pub mod cluster;
pub mod config;
pub mod dataset_writer;
pub mod error;
pub mod extractor;
pub mod merger;
pub mod parameter;
pub mod process;
pub mod record;
pub mod registry;
pub mod statistics;
pub mod validator;
pub mod worker_status;
