use serde::Serialize;
use time::{Duration, PrimitiveDateTime};

use super::error::ClusterError;
use super::record::{format_timestamp, CanonicalRecord};

/// Decides how long a silence has to be before a series counts as broken.
pub trait GapThresholdPolicy {
    /// `span` is last minus first timestamp, `count` the number of records (at least 2)
    fn threshold(&self, span: Duration, count: usize) -> Duration;
}

/// A threshold that grows with both the mean sampling interval and the total span.
///
/// `threshold = clamp(interval_multiplier * span / (count - 1) + span_fraction * span, min, max)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveGapPolicy {
    pub interval_multiplier: f64,
    pub span_fraction: f64,
    pub min_threshold: Duration,
    pub max_threshold: Duration,
}

impl Default for AdaptiveGapPolicy {
    fn default() -> Self {
        Self {
            interval_multiplier: 3.0,
            span_fraction: 0.01,
            min_threshold: Duration::minutes(5),
            max_threshold: Duration::days(7),
        }
    }
}

impl GapThresholdPolicy for AdaptiveGapPolicy {
    fn threshold(&self, span: Duration, count: usize) -> Duration {
        let span_secs = span.as_seconds_f64();
        let mean_interval = if count > 1 {
            span_secs / (count - 1) as f64
        } else {
            0.0
        };
        let raw = self.interval_multiplier * mean_interval + self.span_fraction * span_secs;
        let lower = self.min_threshold.as_seconds_f64();
        let upper = self.max_threshold.as_seconds_f64().max(lower);
        if raw.is_nan() {
            return self.min_threshold;
        }
        Duration::seconds_f64(raw.clamp(lower, upper))
    }
}

/// The same threshold regardless of the series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedGapPolicy(pub Duration);

impl GapThresholdPolicy for FixedGapPolicy {
    fn threshold(&self, _span: Duration, _count: usize) -> Duration {
        self.0
    }
}

/// A contiguous run of records with no internal gap above the threshold
#[derive(Debug, Clone, PartialEq)]
pub struct TimeCluster {
    pub start: PrimitiveDateTime,
    pub end: PrimitiveDateTime,
    pub records: Vec<CanonicalRecord>,
}

impl TimeCluster {
    fn open(record: CanonicalRecord) -> Self {
        Self {
            start: record.timestamp,
            end: record.timestamp,
            records: vec![record],
        }
    }

    fn extend(&mut self, record: CanonicalRecord) {
        self.end = record.timestamp;
        self.records.push(record);
    }

    /// The (timestamp, average) points to chart
    pub fn points(&self) -> Vec<(PrimitiveDateTime, f64)> {
        self.records.iter().map(|r| r.point()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn summary(&self) -> ClusterSpan {
        ClusterSpan {
            start: format_timestamp(&self.start),
            end: format_timestamp(&self.end),
            count: self.records.len(),
        }
    }
}

/// Serializable outline of a cluster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSpan {
    pub start: String,
    pub end: String,
    pub count: usize,
}

/// All clusters for one canonical parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterClusters {
    pub canonical_name: String,
    pub clusters: Vec<TimeCluster>,
}

/// Partition a time-ordered series into gap-free clusters.
///
/// The threshold is computed once from the whole series, so feeding back the concatenation
/// of the returned clusters reproduces the same partition.
pub fn cluster(
    records: &[CanonicalRecord],
    policy: &dyn GapThresholdPolicy,
) -> Result<Vec<TimeCluster>, ClusterError> {
    if let Some(idx) = records
        .windows(2)
        .position(|pair| pair[1].timestamp < pair[0].timestamp)
    {
        return Err(ClusterError::Unsorted(idx + 1));
    }

    let (Some(first), Some(last)) = (records.first(), records.last()) else {
        return Ok(Vec::new());
    };
    let threshold = policy.threshold(last.timestamp - first.timestamp, records.len());

    let mut clusters: Vec<TimeCluster> = Vec::new();
    for record in records {
        match clusters.last_mut() {
            Some(current) if record.timestamp - current.end <= threshold => {
                current.extend(record.clone())
            }
            _ => clusters.push(TimeCluster::open(record.clone())),
        }
    }
    Ok(clusters)
}

/// Cluster a merged dataset parameter by parameter.
///
/// The dataset must be ordered by canonical name then timestamp, as the merger returns it.
pub fn cluster_by_parameter(
    records: &[CanonicalRecord],
    policy: &dyn GapThresholdPolicy,
) -> Result<Vec<ParameterClusters>, ClusterError> {
    let mut result = Vec::new();
    let mut start = 0;
    while start < records.len() {
        let name = records[start].canonical_name();
        let len = records[start..]
            .iter()
            .take_while(|r| r.canonical_name() == name)
            .count();
        let series = &records[start..start + len];
        let clusters = cluster(series, policy).map_err(|e| match e {
            ClusterError::Unsorted(idx) => ClusterError::Unsorted(start + idx),
        })?;
        result.push(ParameterClusters {
            canonical_name: name.to_string(),
            clusters,
        });
        start += len;
    }
    Ok(result)
}
