use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use time::PrimitiveDateTime;

use super::error::SkipReason;
use super::parameter::ParameterDefinition;
use super::record::{CanonicalRecord, RawStatRecord};
use super::registry::Registry;
use super::statistics::SkipCounts;

/// The running combination of every record for one (parameter, timestamp)
#[derive(Debug)]
struct MergeGroup {
    parameter: Arc<ParameterDefinition>,
    count: u64,
    min: f64,
    max: f64,
    average: f64,
    sources: BTreeSet<String>,
}

impl MergeGroup {
    fn new(parameter: Arc<ParameterDefinition>) -> Self {
        Self {
            parameter,
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            average: 0.0,
            sources: BTreeSet::new(),
        }
    }

    /// Fold one contribution in as if its samples were pooled with the rest.
    ///
    /// A contribution that would overflow the pooled count is refused and leaves the group
    /// untouched.
    fn absorb(
        &mut self,
        count: u64,
        min: f64,
        max: f64,
        average: f64,
        source: String,
    ) -> Result<(), SkipReason> {
        let total = self
            .count
            .checked_add(count)
            .ok_or(SkipReason::MalformedValue)?;
        // Incremental count-weighted mean; exact for the first contribution
        self.average += (average - self.average) * (count as f64 / total as f64);
        self.count = total;
        self.min = self.min.min(min);
        self.max = self.max.max(max);
        self.sources.insert(source);
        Ok(())
    }

    fn into_record(self, timestamp: PrimitiveDateTime) -> CanonicalRecord {
        CanonicalRecord {
            parameter: self.parameter,
            timestamp,
            count: self.count,
            min: self.min,
            max: self.max,
            average: self.average,
            sources: self.sources.into_iter().collect(),
        }
    }
}

/// Merger owns all grouping state for one file.
///
/// Validated records are pushed in any order. Records from different raw identifiers that
/// resolve to the same canonical parameter at the same timestamp are pooled:
/// counts add, min and max take the extremes and the average is weighted by count.
#[derive(Debug)]
pub struct Merger<'r> {
    registry: &'r Registry,
    groups: BTreeMap<(String, PrimitiveDateTime), MergeGroup>,
    records_in: u64,
}

impl<'r> Merger<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            groups: BTreeMap::new(),
            records_in: 0,
        }
    }

    /// Add a validated record to its group
    pub fn push(&mut self, record: RawStatRecord) -> Result<(), SkipReason> {
        let parameter = self
            .registry
            .lookup(&record.raw_identifier)
            .ok_or(SkipReason::UnmappedIdentifier)?;
        let count = u64::try_from(record.count)
            .ok()
            .filter(|c| *c > 0)
            .ok_or(SkipReason::NonPositiveCount)?;

        let key = (parameter.canonical_name.clone(), record.timestamp);
        self.groups
            .entry(key)
            .or_insert_with(|| MergeGroup::new(parameter.clone()))
            .absorb(
                count,
                record.min,
                record.max,
                record.average,
                record.raw_identifier,
            )?;
        self.records_in += 1;
        Ok(())
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Number of records accepted so far
    pub fn records_in(&self) -> u64 {
        self.records_in
    }

    /// Number of (parameter, timestamp) groups so far
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Consume the merger, returning records ordered by canonical name then timestamp
    pub fn finish(self) -> Vec<CanonicalRecord> {
        self.groups
            .into_iter()
            .map(|((_, timestamp), group)| group.into_record(timestamp))
            .collect()
    }
}

/// The merged dataset and a tally of the records that were refused on the way
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub records: Vec<CanonicalRecord>,
    pub refused: SkipCounts,
}

/// Merge a whole sequence of validated records in one call.
///
/// Refused records are left out of the dataset and counted by reason.
pub fn merge<I>(registry: &Registry, records: I) -> MergeOutcome
where
    I: IntoIterator<Item = RawStatRecord>,
{
    let mut merger = Merger::new(registry);
    let mut refused = SkipCounts::default();
    for record in records {
        if let Err(reason) = merger.push(record) {
            refused.increment(reason);
        }
    }
    MergeOutcome {
        records: merger.finish(),
        refused,
    }
}
