// Most lines in a device log are unrelated to sensor statistics. The extractor keeps the
// regular expressions off those lines: it first does a plain byte scan for the statistics
// keys, takes the token in front of the earliest one as the identifier and asks the registry
// about it. Only admitted identifiers pay for the structured parse.
use regex::Regex;
use time::{Date, Month, PrimitiveDateTime, Time};

use super::chunk_reader::Chunk;
use super::error::SkipReason;
use super::record::RawStatRecord;
use super::registry::Registry;
use super::statistics::SkippedLine;

const COUNT_KEY: &[u8] = b"count";
const VALUE_KEYS: [&[u8]; 5] = [b"min", b"max", b"avg", b"average", b"mean"];

// key = value, where value is a decimal in plain or scientific notation, or nan/inf
const FIELD_PATTERN: &str = r"(?i)\b(count|min|max|avg|average|mean)\s*=\s*([-+]?(?:\d+(?:\.\d*)?|\.\d+)(?:e[-+]?\d+)?|[-+]?(?:nan|infinity|inf))";
const DATETIME_PATTERN: &str = r"(\d{4})-(\d{2})-(\d{2})[ \tT]+(\d{2}):(\d{2}):(\d{2})";
const DATETIME_ALT_PATTERN: &str = r"(\d{1,2})/(\d{1,2})/(\d{4})[ \t]+(\d{1,2}):(\d{2}):(\d{2})";

/// What the extractor made of a candidate line
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Record(RawStatRecord),
    Skipped(SkippedLine),
}

/// Find the start of a `key=` pair (any case, whitespace allowed before the `=`)
fn find_key(line: &str, key: &[u8]) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut start = 0;
    while start + key.len() <= bytes.len() {
        let idx = start
            + bytes[start..]
                .windows(key.len())
                .position(|w| w.eq_ignore_ascii_case(key))?;
        let at_boundary =
            idx == 0 || !(bytes[idx - 1].is_ascii_alphanumeric() || bytes[idx - 1] == b'_');
        let rest = &bytes[idx + key.len()..];
        let next = rest.iter().find(|b| !b.is_ascii_whitespace());
        if at_boundary && next == Some(&b'=') {
            return Some(idx);
        }
        start = idx + 1;
    }
    None
}

/// Start of the earliest statistics key, and whether the line has a `count=` key at all
fn find_fields(line: &str) -> Option<(usize, bool)> {
    let count = find_key(line, COUNT_KEY);
    let first = VALUE_KEYS
        .iter()
        .filter_map(|key| find_key(line, key))
        .chain(count)
        .min()?;
    Some((first, count.is_some()))
}

/// The identifier is the last word before the statistics fields, minus separators.
/// Tokens made only of separators (`magnetronFlow : count=...`) are passed over.
fn identifier_before(line: &str, key_start: usize) -> Option<&str> {
    line[..key_start]
        .split_whitespace()
        .rev()
        .map(|token| token.trim_matches(|c: char| !(c.is_ascii_alphanumeric() || c == '_')))
        .find(|token| !token.is_empty())
}

/// A unit directly after the average value, e.g. `avg=12.1 L/min` or `avg=12.1L/min`
fn unit_after(tail: &str) -> Option<String> {
    let rest = tail.trim_start_matches([' ', '\t']);
    let end = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '%' || c == '°' || c == '/'))
        .unwrap_or(rest.len());
    let token = &rest[..end];
    if !token.starts_with(|c: char| c.is_alphabetic() || c == '%' || c == '°') {
        return None;
    }
    // Another key, not a unit
    if rest[end..].trim_start().starts_with('=') {
        return None;
    }
    Some(token.to_string())
}

/// Extractor finds statistics blocks for registry-known identifiers in log text.
///
/// The extractor only borrows the registry, so a single instance can be shared by every
/// chunk worker.
#[derive(Debug)]
pub struct Extractor<'r> {
    registry: &'r Registry,
    field_re: Regex,
    datetime_re: Regex,
    datetime_alt_re: Regex,
}

impl<'r> Extractor<'r> {
    pub fn new(registry: &'r Registry) -> Result<Self, regex::Error> {
        Ok(Self {
            registry,
            field_re: Regex::new(FIELD_PATTERN)?,
            datetime_re: Regex::new(DATETIME_PATTERN)?,
            datetime_alt_re: Regex::new(DATETIME_ALT_PATTERN)?,
        })
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Lazily extract every statistics block in a chunk.
    ///
    /// Lines that are not statistics blocks produce nothing. Calling this again on the same
    /// chunk starts over from the first line.
    pub fn extract<'e, 't>(&'e self, chunk: &'t Chunk) -> Extraction<'e, 'r, 't> {
        Extraction {
            extractor: self,
            lines: chunk.text.lines(),
            line_number: chunk.first_line,
            fold: String::new(),
        }
    }

    /// Examine a single line. Returns None if the line is not a statistics block at all.
    ///
    /// A line with a `count=` key is always a statistics block. A line with only the other
    /// keys is one when its identifier is known to the registry, in which case the missing
    /// count makes it malformed.
    pub fn extract_line(&self, line: &str, line_number: u64) -> Option<LineOutcome> {
        self.extract_line_with(line, line_number, &mut String::new())
    }

    /// `extract_line` with a caller-owned buffer for the case-folded registry key
    fn extract_line_with(
        &self,
        line: &str,
        line_number: u64,
        fold: &mut String,
    ) -> Option<LineOutcome> {
        let (key_start, has_count) = find_fields(line)?;
        let identifier = identifier_before(line, key_start)?;
        let known = self.registry.lookup_folded(identifier, fold).is_some();
        if !has_count && !known {
            return None;
        }

        let skip = |reason: SkipReason| {
            Some(LineOutcome::Skipped(SkippedLine {
                line_number,
                identifier: identifier.to_string(),
                reason,
            }))
        };

        if !known {
            return skip(SkipReason::UnmappedIdentifier);
        }

        let Some(timestamp) = self.parse_timestamp(line) else {
            return skip(SkipReason::MalformedValue);
        };

        let mut count: Option<&str> = None;
        let mut min: Option<&str> = None;
        let mut max: Option<&str> = None;
        let mut avg: Option<(&str, usize)> = None;
        let fields = &line[key_start..];
        for caps in self.field_re.captures_iter(fields) {
            let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            match key.as_str().to_ascii_lowercase().as_str() {
                "count" => {
                    count.get_or_insert(value.as_str());
                }
                "min" => {
                    min.get_or_insert(value.as_str());
                }
                "max" => {
                    max.get_or_insert(value.as_str());
                }
                _ => {
                    avg.get_or_insert((value.as_str(), value.end()));
                }
            }
        }

        let (Some(count), Some(min), Some(max), Some((avg, avg_end))) = (count, min, max, avg)
        else {
            return skip(SkipReason::MalformedValue);
        };
        let parsed = (
            count.parse::<i64>(),
            min.parse::<f64>(),
            max.parse::<f64>(),
            avg.parse::<f64>(),
        );
        let (Ok(count), Ok(min), Ok(max), Ok(average)) = parsed else {
            return skip(SkipReason::MalformedValue);
        };

        Some(LineOutcome::Record(RawStatRecord {
            raw_identifier: identifier.to_string(),
            line_number,
            timestamp,
            count,
            min,
            max,
            average,
            unit: unit_after(&fields[avg_end..]),
        }))
    }

    /// Find the first device timestamp anywhere in the line
    fn parse_timestamp(&self, line: &str) -> Option<PrimitiveDateTime> {
        if let Some(caps) = self.datetime_re.captures(line) {
            let n = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u16>().ok());
            return build_datetime(n(1)?, n(2)?, n(3)?, n(4)?, n(5)?, n(6)?);
        }
        if let Some(caps) = self.datetime_alt_re.captures(line) {
            let n = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u16>().ok());
            return build_datetime(n(3)?, n(1)?, n(2)?, n(4)?, n(5)?, n(6)?);
        }
        None
    }
}

fn build_datetime(
    year: u16,
    month: u16,
    day: u16,
    hour: u16,
    minute: u16,
    second: u16,
) -> Option<PrimitiveDateTime> {
    let month = Month::try_from(u8::try_from(month).ok()?).ok()?;
    let date = Date::from_calendar_date(year as i32, month, u8::try_from(day).ok()?).ok()?;
    let time = Time::from_hms(
        u8::try_from(hour).ok()?,
        u8::try_from(minute).ok()?,
        u8::try_from(second).ok()?,
    )
    .ok()?;
    Some(PrimitiveDateTime::new(date, time))
}

/// Iterator over the statistics blocks of one chunk
#[derive(Debug)]
pub struct Extraction<'e, 'r, 't> {
    extractor: &'e Extractor<'r>,
    lines: std::str::Lines<'t>,
    line_number: u64,
    fold: String,
}

impl Iterator for Extraction<'_, '_, '_> {
    type Item = LineOutcome;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            let line_number = self.line_number;
            self.line_number += 1;
            if let Some(outcome) =
                self.extractor
                    .extract_line_with(line, line_number, &mut self.fold)
            {
                return Some(outcome);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const MAP: &str = "\
magnetronFlow | Magnetron Flow | L/min | cooling
CoolingmagnetronFlowLowStatistics | Magnetron Flow | L/min | cooling
FanhumidityStatistics | Room Humidity | % | environmental
";

    fn registry() -> Registry {
        Registry::from_mapping_str(MAP).unwrap()
    }

    fn record(outcome: Option<LineOutcome>) -> RawStatRecord {
        match outcome {
            Some(LineOutcome::Record(r)) => r,
            other => panic!("expected a record, got {other:?}"),
        }
    }

    fn skip_reason(outcome: Option<LineOutcome>) -> SkipReason {
        match outcome {
            Some(LineOutcome::Skipped(s)) => s.reason,
            other => panic!("expected a skip, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_line() {
        let registry = registry();
        let ex = Extractor::new(&registry).unwrap();
        let r = record(ex.extract_line(
            "2024-03-01 12:00:05 magnetronFlow count=10 min=1.0 max=2.0 avg=1.5",
            7,
        ));
        assert_eq!(r.raw_identifier, "magnetronFlow");
        assert_eq!(r.line_number, 7);
        assert_eq!(r.timestamp, datetime!(2024-03-01 12:00:05));
        assert_eq!(r.count, 10);
        assert_eq!((r.min, r.max, r.average), (1.0, 2.0, 1.5));
        assert_eq!(r.unit, None);
    }

    #[test]
    fn test_tab_separated_device_line() {
        let registry = registry();
        let ex = Extractor::new(&registry).unwrap();
        let line = "2024-03-01\t12:00:05\tSTN\tInfo\t1709294405\tSN# 2182\tCooling\tStats\t\
                    logStatistics CoolingmagnetronFlowLowStatistics: count=5, max=1.8, min=1.2, avg=1.6 L/min (window 60s)";
        let r = record(ex.extract_line(line, 1));
        assert_eq!(r.raw_identifier, "CoolingmagnetronFlowLowStatistics");
        assert_eq!(r.count, 5);
        assert_eq!((r.min, r.max, r.average), (1.2, 1.8, 1.6));
        assert_eq!(r.unit.as_deref(), Some("L/min"));
    }

    #[test]
    fn test_timestamp_mid_line_and_scientific_notation() {
        let registry = registry();
        let ex = Extractor::new(&registry).unwrap();
        let r = record(ex.extract_line(
            "[node 3] at 3/7/2024 9:05:00 FanhumidityStatistics: COUNT = 2 avg=4.5e1 min=4.0E1 max=5e+1 trailing junk, more junk",
            1,
        ));
        assert_eq!(r.timestamp, datetime!(2024-03-07 09:05:00));
        assert_eq!((r.min, r.max, r.average), (40.0, 50.0, 45.0));
        assert_eq!(r.count, 2);
    }

    #[test]
    fn test_unit_is_not_a_following_key() {
        assert_eq!(unit_after(" min=3"), None);
        assert_eq!(unit_after(", max=3"), None);
        assert_eq!(unit_after("%"), Some(String::from("%")));
        assert_eq!(unit_after(" °C"), Some(String::from("°C")));
    }

    #[test]
    fn test_unrelated_lines_yield_nothing() {
        let registry = registry();
        let ex = Extractor::new(&registry).unwrap();
        assert_eq!(ex.extract_line("2024-03-01 12:00:05 SystemMode:Treatment", 1), None);
        assert_eq!(ex.extract_line("", 2), None);
        assert_eq!(ex.extract_line("discount=5 on magnetronFlow", 3), None);
        assert_eq!(ex.extract_line("count=5 min=1 max=2 avg=1", 4), None);
    }

    #[test]
    fn test_spaced_colon_identifier() {
        let registry = registry();
        let ex = Extractor::new(&registry).unwrap();
        let r = record(ex.extract_line(
            "2024-03-01 12:00:05 logStatistics magnetronFlow : count=10, min=1, max=2, avg=1.5",
            3,
        ));
        assert_eq!(r.raw_identifier, "magnetronFlow");
        assert_eq!(r.count, 10);
        assert_eq!(identifier_before("a - : count=1", 6), Some("a"));
    }

    #[test]
    fn test_known_identifier_without_count_is_malformed() {
        let registry = registry();
        let ex = Extractor::new(&registry).unwrap();
        match ex.extract_line("2024-03-01 12:00:05 magnetronFlow min=1 max=2 avg=1.5", 9) {
            Some(LineOutcome::Skipped(s)) => {
                assert_eq!(s.reason, SkipReason::MalformedValue);
                assert_eq!(s.identifier, "magnetronFlow");
                assert_eq!(s.line_number, 9);
            }
            other => panic!("expected a skip, got {other:?}"),
        }
        // Fields in any order, the identifier still sits before the first one
        let r = record(ex.extract_line(
            "2024-03-01 12:00:05 magnetronFlow avg=1.5 count=10 min=1 max=2",
            1,
        ));
        assert_eq!(r.raw_identifier, "magnetronFlow");
        assert_eq!(r.average, 1.5);
        // Without a count an unknown identifier is just noise
        assert_eq!(
            ex.extract_line("2024-03-01 12:00:05 Setpoint changed min=1 max=2", 2),
            None
        );
    }

    #[test]
    fn test_unmapped_identifier() {
        let registry = registry();
        let ex = Extractor::new(&registry).unwrap();
        let outcome = ex.extract_line("2024-03-01 12:00:05 someUnknownSensor count=3 avg=9", 4);
        match outcome {
            Some(LineOutcome::Skipped(s)) => {
                assert_eq!(s.reason, SkipReason::UnmappedIdentifier);
                assert_eq!(s.identifier, "someUnknownSensor");
                assert_eq!(s.line_number, 4);
            }
            other => panic!("expected a skip, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_lines() {
        let registry = registry();
        let ex = Extractor::new(&registry).unwrap();
        // No average
        assert_eq!(
            skip_reason(ex.extract_line("2024-03-01 12:00:05 magnetronFlow count=10 min=1 max=2", 1)),
            SkipReason::MalformedValue
        );
        // No timestamp
        assert_eq!(
            skip_reason(ex.extract_line("magnetronFlow count=10 min=1 max=2 avg=1.5", 1)),
            SkipReason::MalformedValue
        );
        // Fractional count
        assert_eq!(
            skip_reason(ex.extract_line("2024-03-01 12:00:05 magnetronFlow count=1.5 min=1 max=2 avg=1.5", 1)),
            SkipReason::MalformedValue
        );
        // Impossible date
        assert_eq!(
            skip_reason(ex.extract_line("2024-02-31 12:00:05 magnetronFlow count=1 min=1 max=2 avg=1.5", 1)),
            SkipReason::MalformedValue
        );
    }

    #[test]
    fn test_non_finite_values_are_extracted_for_validation() {
        let registry = registry();
        let ex = Extractor::new(&registry).unwrap();
        let r = record(ex.extract_line(
            "2024-03-01 12:00:05 magnetronFlow count=3 min=nan max=inf avg=1e999",
            1,
        ));
        assert!(r.min.is_nan());
        assert!(r.max.is_infinite());
        assert!(r.average.is_infinite());
    }

    #[test]
    fn test_extract_chunk_is_restartable() {
        let registry = registry();
        let ex = Extractor::new(&registry).unwrap();
        let chunk = Chunk {
            index: 0,
            first_line: 41,
            n_lines: 4,
            n_bytes: 0,
            text: String::from(
                "boot complete\n\
                 2024-03-01 12:00:05 magnetronFlow count=10 min=1 max=2 avg=1.5\n\
                 2024-03-01 12:00:05 someUnknownSensor count=3 avg=9\n\
                 2024-03-01 12:01:05 magnetronFlow: count=4, min=1, max=3, avg=2\n",
            ),
        };
        let first: Vec<LineOutcome> = ex.extract(&chunk).collect();
        let second: Vec<LineOutcome> = ex.extract(&chunk).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        match &first[1] {
            LineOutcome::Skipped(s) => assert_eq!(s.line_number, 43),
            other => panic!("expected a skip, got {other:?}"),
        }
        match &first[2] {
            LineOutcome::Record(r) => assert_eq!(r.line_number, 44),
            other => panic!("expected a record, got {other:?}"),
        }
    }
}
