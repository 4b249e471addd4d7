use fxhash::FxHashSet;
use serde::Serialize;

use super::error::SkipReason;

/// A candidate line that was left out of the dataset, and why
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedLine {
    pub line_number: u64,
    pub identifier: String,
    pub reason: SkipReason,
}

/// Tally of skipped candidates per reason
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    pub unmapped_identifier: u64,
    pub malformed_value: u64,
    pub non_finite_value: u64,
    pub invalid_range: u64,
    pub non_positive_count: u64,
}

impl SkipCounts {
    pub fn increment(&mut self, reason: SkipReason) {
        *self.slot(reason) += 1;
    }

    pub fn get(&self, reason: SkipReason) -> u64 {
        match reason {
            SkipReason::UnmappedIdentifier => self.unmapped_identifier,
            SkipReason::MalformedValue => self.malformed_value,
            SkipReason::NonFiniteValue => self.non_finite_value,
            SkipReason::InvalidRange => self.invalid_range,
            SkipReason::NonPositiveCount => self.non_positive_count,
        }
    }

    pub fn total(&self) -> u64 {
        self.unmapped_identifier
            + self.malformed_value
            + self.non_finite_value
            + self.invalid_range
            + self.non_positive_count
    }

    pub fn absorb(&mut self, other: &SkipCounts) {
        self.unmapped_identifier += other.unmapped_identifier;
        self.malformed_value += other.malformed_value;
        self.non_finite_value += other.non_finite_value;
        self.invalid_range += other.invalid_range;
        self.non_positive_count += other.non_positive_count;
    }

    fn slot(&mut self, reason: SkipReason) -> &mut u64 {
        match reason {
            SkipReason::UnmappedIdentifier => &mut self.unmapped_identifier,
            SkipReason::MalformedValue => &mut self.malformed_value,
            SkipReason::NonFiniteValue => &mut self.non_finite_value,
            SkipReason::InvalidRange => &mut self.invalid_range,
            SkipReason::NonPositiveCount => &mut self.non_positive_count,
        }
    }
}

/// The run report for one pipeline invocation over one file.
///
/// Every call to the processor builds its own instance; nothing here is shared between
/// invocations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStatistics {
    pub lines_read: u64,
    pub bytes_read: u64,
    pub chunks_processed: u64,
    /// Distinct identifiers found in front of a statistics block
    pub distinct_identifiers_seen: u64,
    /// Distinct identifiers the registry admitted
    pub distinct_identifiers_matched: u64,
    /// Candidate lines whose identifier the registry admitted
    pub parameters_detected: u64,
    pub valid_records: u64,
    pub skipped: SkipCounts,
    /// The first few skipped lines, for diagnostics
    pub skipped_samples: Vec<SkippedLine>,
    pub merged_records: u64,
    /// Valid records whose declared unit differs from the registry unit
    pub unit_mismatches: u64,
    pub elapsed_secs: f64,
    #[serde(skip)]
    seen: FxHashSet<String>,
    #[serde(skip)]
    matched: FxHashSet<String>,
    #[serde(skip)]
    max_skip_samples: usize,
}

impl RunStatistics {
    pub fn new(max_skip_samples: usize) -> Self {
        Self {
            max_skip_samples,
            ..Default::default()
        }
    }

    /// Note an identifier found in front of a statistics block.
    ///
    /// Identifiers are told apart the way the registry tells them apart, ignoring ASCII case.
    pub fn observe_identifier(&mut self, identifier: &str, admitted: bool) {
        let key = identifier.to_ascii_lowercase();
        if admitted {
            self.parameters_detected += 1;
            if !self.matched.contains(&key) {
                self.matched.insert(key.clone());
                self.distinct_identifiers_matched = self.matched.len() as u64;
            }
        }
        if !self.seen.contains(&key) {
            self.seen.insert(key);
            self.distinct_identifiers_seen = self.seen.len() as u64;
        }
    }

    pub fn record_skip(&mut self, skipped: SkippedLine) {
        self.skipped.increment(skipped.reason);
        if self.skipped_samples.len() < self.max_skip_samples {
            self.skipped_samples.push(skipped);
        }
    }

    pub fn skipped_total(&self) -> u64 {
        self.skipped.total()
    }

    /// Lines per second over the whole invocation
    pub fn lines_per_second(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.lines_read as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }

    /// Valid records per second over the whole invocation
    pub fn records_per_second(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.valid_records as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }
}
