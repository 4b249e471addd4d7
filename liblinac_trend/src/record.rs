use serde::Serialize;
use std::sync::Arc;
use time::PrimitiveDateTime;

use super::category::{categorize, Category};
use super::parameter::{ParameterDefinition, Quality};

/// Render a device timestamp the way the device writes it, `YYYY-MM-DD HH:MM:SS`
pub fn format_timestamp(ts: &PrimitiveDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        ts.year(),
        ts.month() as u8,
        ts.day(),
        ts.hour(),
        ts.minute(),
        ts.second()
    )
}

/// A single statistics block as it was found in the log text.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStatRecord {
    pub raw_identifier: String,
    pub line_number: u64,
    pub timestamp: PrimitiveDateTime,
    pub count: i64,
    pub min: f64,
    pub max: f64,
    pub average: f64,
    pub unit: Option<String>,
}

/// A statistics record for one canonical parameter at one timestamp, after every alias
/// contribution at that timestamp has been combined.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub parameter: Arc<ParameterDefinition>,
    pub timestamp: PrimitiveDateTime,
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub average: f64,
    pub sources: Vec<String>,
}

impl CanonicalRecord {
    pub fn canonical_name(&self) -> &str {
        &self.parameter.canonical_name
    }

    pub fn unit(&self) -> &str {
        &self.parameter.unit
    }

    pub fn category(&self) -> Category {
        categorize(&self.parameter)
    }

    pub fn quality(&self) -> Quality {
        Quality::assess(&self.parameter, self.average, self.count)
    }

    /// The (timestamp, value) point charted for this record
    pub fn point(&self) -> (PrimitiveDateTime, f64) {
        (self.timestamp, self.average)
    }

    /// Flatten into the row handed to storage
    pub fn to_row(&self) -> DatasetRow {
        DatasetRow {
            canonical_name: self.parameter.canonical_name.clone(),
            unit: self.parameter.unit.clone(),
            category: self.category().as_str(),
            timestamp: format_timestamp(&self.timestamp),
            count: self.count,
            min: self.min,
            max: self.max,
            average: self.average,
            quality: self.quality().as_str(),
            sources: self.sources.join(";"),
        }
    }
}

/// One row of the finished tabular dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetRow {
    pub canonical_name: String,
    pub unit: String,
    pub category: &'static str,
    pub timestamp: String,
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub average: f64,
    pub quality: &'static str,
    pub sources: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_row() {
        let def = Arc::new(ParameterDefinition::new(
            "Speed FAN 1",
            "RPM",
            Category::Environmental,
            vec![String::from("FanfanSpeed1Statistics")],
            None,
        ));
        let record = CanonicalRecord {
            parameter: def,
            timestamp: datetime!(2024-01-05 07:08:09),
            count: 12,
            min: 2000.0,
            max: 2100.0,
            average: 2050.0,
            sources: vec![String::from("FanfanSpeed1Statistics"), String::from("fanSpeed1")],
        };
        let row = record.to_row();
        assert_eq!(row.canonical_name, "Speed FAN 1");
        assert_eq!(row.category, "environmental");
        assert_eq!(row.timestamp, "2024-01-05 07:08:09");
        assert_eq!(row.quality, "fair");
        assert_eq!(row.sources, "FanfanSpeed1Statistics;fanSpeed1");
        assert_eq!(record.point(), (datetime!(2024-01-05 07:08:09), 2050.0));
    }
}
