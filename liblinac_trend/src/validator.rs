use super::error::SkipReason;
use super::record::RawStatRecord;

/// Check that a raw record is internally consistent.
///
/// Returns the record unchanged if it passes, otherwise the first failed check in the order
/// non-finite values, min above max, non-positive count. A record with min == max is valid.
pub fn validate(record: RawStatRecord) -> Result<RawStatRecord, SkipReason> {
    if !(record.min.is_finite() && record.max.is_finite() && record.average.is_finite()) {
        return Err(SkipReason::NonFiniteValue);
    }
    if record.min > record.max {
        return Err(SkipReason::InvalidRange);
    }
    if record.count <= 0 {
        return Err(SkipReason::NonPositiveCount);
    }
    Ok(record)
}
