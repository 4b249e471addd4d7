use serde::Serialize;

use super::category::Category;

/// An inclusive operating range declared for a parameter in the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExpectedRange {
    pub min: f64,
    pub max: f64,
}

impl ExpectedRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// ParameterDefinition is the canonical identity that one or more raw device identifiers
/// resolve to.
///
/// Definitions are built once by the Registry and shared read-only by every pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDefinition {
    pub canonical_name: String,
    pub unit: String,
    pub category: Category,
    pub aliases: Vec<String>,
    pub expected_range: Option<ExpectedRange>,
}

impl ParameterDefinition {
    pub fn new(
        canonical_name: &str,
        unit: &str,
        category: Category,
        aliases: Vec<String>,
        expected_range: Option<ExpectedRange>,
    ) -> Self {
        Self {
            canonical_name: canonical_name.to_string(),
            unit: unit.to_string(),
            category,
            aliases,
            expected_range,
        }
    }

    /// Check if a raw identifier is one of this definition's aliases (ASCII case-insensitive)
    pub fn has_alias(&self, raw_identifier: &str) -> bool {
        self.aliases
            .iter()
            .any(|a| a.eq_ignore_ascii_case(raw_identifier))
    }
}

/// A coarse grade for a merged statistics record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Quality {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl Quality {
    /// Grade a record: anything outside the expected range is poor, otherwise it depends on
    /// how many samples back the statistics
    pub fn assess(definition: &ParameterDefinition, average: f64, count: u64) -> Self {
        if let Some(range) = &definition.expected_range {
            if !range.contains(average) {
                return Self::Poor;
            }
        }
        if count > 100 {
            Self::Excellent
        } else if count > 50 {
            Self::Good
        } else {
            Self::Fair
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Poor => "poor",
            Self::Fair => "fair",
            Self::Good => "good",
            Self::Excellent => "excellent",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow() -> ParameterDefinition {
        ParameterDefinition::new(
            "Magnetron Flow",
            "L/min",
            Category::Cooling,
            vec![
                String::from("magnetronFlow"),
                String::from("CoolingmagnetronFlowLowStatistics"),
            ],
            Some(ExpectedRange {
                min: 8.0,
                max: 18.0,
            }),
        )
    }

    #[test]
    fn test_has_alias() {
        let def = flow();
        assert!(def.has_alias("magnetronflow"));
        assert!(def.has_alias("CoolingmagnetronFlowLowStatistics"));
        assert!(!def.has_alias("magnetronTemp"));
    }

    #[test]
    fn test_quality() {
        let def = flow();
        assert_eq!(Quality::assess(&def, 2.0, 500), Quality::Poor);
        assert_eq!(Quality::assess(&def, 12.0, 101), Quality::Excellent);
        assert_eq!(Quality::assess(&def, 12.0, 100), Quality::Good);
        assert_eq!(Quality::assess(&def, 12.0, 50), Quality::Fair);

        let mut unbounded = flow();
        unbounded.expected_range = None;
        assert_eq!(Quality::assess(&unbounded, -40.0, 60), Quality::Good);
    }
}
