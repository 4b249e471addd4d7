use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use super::parameter::ParameterDefinition;

/// The functional groups parameters are charted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Cooling,
    Voltages,
    Temperature,
    Environmental,
    Diagnostics,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Cooling,
        Category::Voltages,
        Category::Temperature,
        Category::Environmental,
        Category::Diagnostics,
    ];

    /// The tag used for this category in a mapping file
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cooling => "cooling",
            Self::Voltages => "voltages",
            Self::Temperature => "temperature",
            Self::Environmental => "environmental",
            Self::Diagnostics => "diagnostics",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(tag))
            .ok_or_else(|| tag.to_string())
    }
}

/// Assign a parameter to its category.
///
/// The category is fixed when the registry is loaded, so this never guesses.
pub fn categorize(definition: &ParameterDefinition) -> Category {
    definition.category
}
