//! Disease categories a prediction can belong to.
//!
//! The set is closed: every record in the history carries exactly one of
//! these, and nothing outside it can be recorded.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RiskwatchError;

/// Disease category of a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Heart,
    Diabetes,
    Liver,
    Kidney,
}

impl Category {
    /// All categories, in canonical order.
    pub const ALL: [Category; 4] = [
        Category::Heart,
        Category::Diabetes,
        Category::Liver,
        Category::Kidney,
    ];

    /// Lowercase identifier used in storage and on the command line.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Heart => "heart",
            Category::Diabetes => "diabetes",
            Category::Liver => "liver",
            Category::Kidney => "kidney",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Heart => "Heart Disease",
            Category::Diabetes => "Diabetes",
            Category::Liver => "Liver Disease",
            Category::Kidney => "Kidney Disease",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = RiskwatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "heart" => Ok(Category::Heart),
            "diabetes" => Ok(Category::Diabetes),
            "liver" => Ok(Category::Liver),
            "kidney" => Ok(Category::Kidney),
            _ => Err(RiskwatchError::invalid_category(s)),
        }
    }
}
