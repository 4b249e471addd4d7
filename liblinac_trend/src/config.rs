use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::Duration;

use super::cluster::AdaptiveGapPolicy;
use super::error::ConfigError;

const DEFAULT_CHUNK_SIZE_BYTES: usize = 1024 * 1024;
const DEFAULT_MAX_SKIP_SAMPLES: usize = 50;

/// Coefficients of the adaptive gap threshold used to cluster each parameter series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapPolicyConfig {
    pub interval_multiplier: f64,
    pub span_fraction: f64,
    pub min_threshold_secs: u64,
    pub max_threshold_secs: u64,
}

impl Default for GapPolicyConfig {
    fn default() -> Self {
        let policy = AdaptiveGapPolicy::default();
        Self {
            interval_multiplier: policy.interval_multiplier,
            span_fraction: policy.span_fraction,
            min_threshold_secs: policy.min_threshold.whole_seconds() as u64,
            max_threshold_secs: policy.max_threshold.whole_seconds() as u64,
        }
    }
}

fn threshold(secs: u64) -> Result<Duration, ConfigError> {
    i64::try_from(secs).map(Duration::seconds).map_err(|_| {
        ConfigError::BadGapPolicy(format!("a threshold of {secs} seconds is out of range"))
    })
}

impl GapPolicyConfig {
    /// Build the policy, refusing thresholds out of order or out of range and coefficients
    /// that are negative or not finite
    pub fn to_policy(&self) -> Result<AdaptiveGapPolicy, ConfigError> {
        let min_threshold = threshold(self.min_threshold_secs)?;
        let max_threshold = threshold(self.max_threshold_secs)?;
        if min_threshold > max_threshold {
            return Err(ConfigError::BadGapPolicy(format!(
                "min_threshold_secs ({}) is greater than max_threshold_secs ({})",
                self.min_threshold_secs, self.max_threshold_secs
            )));
        }
        for (name, value) in [
            ("interval_multiplier", self.interval_multiplier),
            ("span_fraction", self.span_fraction),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::BadGapPolicy(format!(
                    "{name} must be finite and not negative, got {value}"
                )));
            }
        }
        Ok(AdaptiveGapPolicy {
            interval_multiplier: self.interval_multiplier,
            span_fraction: self.span_fraction,
            min_threshold,
            max_threshold,
        })
    }
}

/// Structure representing the application configuration. Contains pathing and run information
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub log_paths: Vec<PathBuf>,
    pub mapping_path: Option<PathBuf>,
    pub output_path: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: usize,
    pub n_threads: i32,
    #[serde(default = "default_max_skip_samples")]
    pub max_skip_samples: usize,
    #[serde(default)]
    pub gap_policy: GapPolicyConfig,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE_BYTES
}

fn default_max_skip_samples() -> usize {
    DEFAULT_MAX_SKIP_SAMPLES
}

impl Default for Config {
    /// Generate a new Config object. Paths will be empty/invalid
    fn default() -> Self {
        Self {
            log_paths: vec![PathBuf::from("None")],
            mapping_path: None,
            output_path: PathBuf::from("None"),
            chunk_size_bytes: DEFAULT_CHUNK_SIZE_BYTES,
            n_threads: 1,
            max_skip_samples: DEFAULT_MAX_SKIP_SAMPLES,
            gap_policy: GapPolicyConfig::default(),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Check the settings that would make processing impossible before any file is opened
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_n_threads_valid() {
            return Err(ConfigError::BadThreadCount(self.n_threads));
        }
        if !self.is_chunk_size_valid() {
            return Err(ConfigError::BadChunkSize(self.chunk_size_bytes));
        }
        self.gap_policy.to_policy()?;
        Ok(())
    }

    /// Get the output directory, which must already exist
    pub fn get_output_directory(&self) -> Result<&Path, ConfigError> {
        if self.output_path.is_dir() {
            Ok(&self.output_path)
        } else {
            Err(ConfigError::BadFilePath(self.output_path.clone()))
        }
    }

    /// Get the path of a log file to process, if it exists
    pub fn get_log_file(&self, index: usize) -> Result<&Path, ConfigError> {
        match self.log_paths.get(index) {
            Some(path) if path.exists() => Ok(path),
            Some(path) => Err(ConfigError::BadFilePath(path.clone())),
            None => Err(ConfigError::BadFilePath(PathBuf::new())),
        }
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }

    pub fn is_chunk_size_valid(&self) -> bool {
        self.chunk_size_bytes >= 1
    }

    pub fn has_custom_mapping(&self) -> bool {
        self.mapping_path.is_some()
    }
}
