use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use super::statistics::RunStatistics;
use super::worker_status::WorkerStatus;

/// The non-fatal reasons a candidate line or record is left out of the dataset.
///
/// These are never raised; they are tallied in [`RunStatistics`] and attributed to the
/// line they came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    #[error("identifier is not present in the parameter registry")]
    UnmappedIdentifier,
    #[error("statistics block is missing a field or timestamp, or a field failed to parse")]
    MalformedValue,
    #[error("statistics block contains a non-finite value")]
    NonFiniteValue,
    #[error("statistics block has min greater than max")]
    InvalidRange,
    #[error("statistics block has a sample count less than or equal to zero")]
    NonPositiveCount,
}

#[derive(Debug, Error)]
pub enum RegistryLoadError {
    #[error("Registry failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Registry could not be loaded because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Registry was given a mapping with the incorrect format at line {0}; most likely the number of columns is incorrect")]
    BadFileFormat(usize),
    #[error("Registry found an unknown category tag '{tag}' at line {line}")]
    BadCategory { line: usize, tag: String },
    #[error("Registry failed to parse the expected range at line {line}: {source}")]
    BadRange {
        line: usize,
        source: std::num::ParseFloatError,
    },
    #[error("Registry found conflicting units for parameter '{name}': '{first}' and '{second}'")]
    ConflictingUnits {
        name: String,
        first: String,
        second: String,
    },
    #[error("Registry found conflicting categories for parameter '{name}': {first} and {second}")]
    ConflictingCategories {
        name: String,
        first: String,
        second: String,
    },
    #[error("Registry found raw identifier '{raw}' mapped to both '{first}' and '{second}'")]
    AliasConflict {
        raw: String,
        first: String,
        second: String,
    },
    #[error("Registry mapping did not contain any parameter definitions")]
    Empty,
}

#[derive(Debug, Error)]
#[error("Chunk starting at line {first_line} could not be decoded as text: {source}")]
pub struct ChunkDecodeError {
    pub first_line: u64,
    pub source: std::str::Utf8Error,
}

#[derive(Debug, Error)]
pub enum ChunkReaderError {
    #[error("ChunkReader could not open log file {0:?} because it does not exist")]
    BadFilePath(PathBuf),
    #[error("ChunkReader failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("ChunkReader failed to decode a chunk: {0}")]
    DecodeError(#[from] ChunkDecodeError),
}

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("Clusterer was given records out of time order at index {0}")]
    Unsorted(usize),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config requested {0} threads; at least one is required")]
    BadThreadCount(i32),
    #[error("Config requested a chunk size of {0} bytes; at least one byte is required")]
    BadChunkSize(usize),
    #[error("Config has an invalid gap policy: {0}")]
    BadGapPolicy(String),
}

#[derive(Debug, Error)]
pub enum DatasetWriterError {
    #[error("DatasetWriter failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("DatasetWriter failed to write CSV: {0}")]
    CsvError(#[from] csv::Error),
    #[error("DatasetWriter failed to convert to yaml: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("DatasetWriter could not derive an output name from {0:?}")]
    BadFileName(PathBuf),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Registry error: {0}")]
    RegistryError(#[from] RegistryLoadError),
    #[error("Processor failed to build a log pattern: {0}")]
    PatternError(#[from] regex::Error),
    #[error("Processor failed due to ChunkReader error: {0}")]
    ReaderError(#[from] ChunkReaderError),
    #[error("Processor failed due to Cluster error: {0}")]
    ClusterError(#[from] ClusterError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to DatasetWriter error: {0}")]
    WriterError(#[from] DatasetWriterError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed because a chunk worker panicked")]
    WorkerPanic,
    #[error("Processor was cancelled")]
    Cancelled,
}

/// A per-file failure, carrying whatever statistics were collected before it happened
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ProcessFailure {
    #[source]
    pub error: ProcessorError,
    pub partial_stats: RunStatistics,
}

impl ProcessFailure {
    pub fn new(error: ProcessorError, partial_stats: RunStatistics) -> Self {
        Self {
            error,
            partial_stats,
        }
    }
}
