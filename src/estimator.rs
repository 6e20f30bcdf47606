//! Risk estimation from input parameters.
//!
//! The history store does not know how estimates are produced; it only
//! records them. [`HeuristicEstimator`] is a deterministic weighted sum per
//! category and makes no claim of diagnostic accuracy.

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::history::Parameters;

/// Lowest probability the heuristic reports.
pub const MIN_PROBABILITY: f64 = 0.1;

/// Highest probability the heuristic reports.
pub const MAX_PROBABILITY: f64 = 0.9;

/// Probabilities above this are flagged at risk.
pub const RISK_THRESHOLD: f64 = 0.5;

/// Outcome of one estimation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Estimate {
    pub at_risk: bool,
    pub probability: f64,
}

impl Estimate {
    /// Build an estimate from a probability, flagging it against [`RISK_THRESHOLD`].
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        Self {
            at_risk: probability > RISK_THRESHOLD,
            probability,
        }
    }
}

/// Turns input parameters into a risk estimate.
///
/// Implementations must be pure: same inputs, same output, no side effects.
pub trait Estimator: Send + Sync {
    fn estimate(&self, category: Category, parameters: &Parameters) -> Estimate;
}

/// Weighted-sum heuristic over a few numeric inputs per category.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator;

impl HeuristicEstimator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Input fields the heuristic reads for a category.
    #[must_use]
    pub fn fields(category: Category) -> &'static [&'static str] {
        match category {
            Category::Heart => &["age", "cholesterol", "bloodPressure"],
            Category::Diabetes => &["glucose", "bmi"],
            Category::Liver => &["bilirubinTotal", "albumin"],
            Category::Kidney => &["creatinine", "urea"],
        }
    }

    fn raw_score(category: Category, parameters: &Parameters) -> f64 {
        // Missing or non-numeric inputs count as zero.
        let num = |key: &str| {
            parameters
                .get(key)
                .and_then(|v| v.as_number())
                .unwrap_or(0.0)
        };

        match category {
            Category::Heart => {
                (num("age") / 100.0) * 0.3
                    + (num("cholesterol") / 300.0) * 0.4
                    + (num("bloodPressure") / 180.0) * 0.3
            }
            Category::Diabetes => (num("glucose") / 200.0) * 0.6 + (num("bmi") / 40.0) * 0.4,
            Category::Liver => {
                (num("bilirubinTotal") / 20.0) * 0.5 + (1.0 - num("albumin") / 5.0) * 0.5
            }
            Category::Kidney => (num("creatinine") / 10.0) * 0.6 + (num("urea") / 100.0) * 0.4,
        }
    }
}

impl Estimator for HeuristicEstimator {
    fn estimate(&self, category: Category, parameters: &Parameters) -> Estimate {
        let score = Self::raw_score(category, parameters);
        let clamped = if score.is_nan() {
            MIN_PROBABILITY
        } else {
            score.clamp(MIN_PROBABILITY, MAX_PROBABILITY)
        };
        let rounded = (clamped * 100.0).round() / 100.0;
        Estimate::from_probability(rounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::ParamValue;

    fn params(pairs: &[(&str, f64)]) -> Parameters {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), ParamValue::Number(*v)))
            .collect()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_heart_weighted_sum() {
        let estimate = HeuristicEstimator.estimate(
            Category::Heart,
            &params(&[("age", 54.0), ("cholesterol", 240.0), ("bloodPressure", 140.0)]),
        );
        // 0.162 + 0.32 + 0.2333 = 0.7153 -> 0.72
        assert_close(estimate.probability, 0.72);
        assert!(estimate.at_risk);
    }

    #[test]
    fn test_diabetes_weighted_sum() {
        let estimate = HeuristicEstimator
            .estimate(Category::Diabetes, &params(&[("glucose", 100.0), ("bmi", 20.0)]));
        // 0.3 + 0.2
        assert_close(estimate.probability, 0.5);
        assert!(!estimate.at_risk);
    }

    #[test]
    fn test_liver_low_albumin_raises_risk() {
        let estimate = HeuristicEstimator.estimate(
            Category::Liver,
            &params(&[("bilirubinTotal", 2.0), ("albumin", 1.0)]),
        );
        // 0.05 + 0.4
        assert_close(estimate.probability, 0.45);
    }

    #[test]
    fn test_kidney_clamps_to_upper_bound() {
        let estimate = HeuristicEstimator.estimate(
            Category::Kidney,
            &params(&[("creatinine", 50.0), ("urea", 400.0)]),
        );
        assert_close(estimate.probability, MAX_PROBABILITY);
        assert!(estimate.at_risk);
    }

    #[test]
    fn test_missing_inputs_clamp_to_lower_bound() {
        let estimate = HeuristicEstimator.estimate(Category::Heart, &Parameters::new());
        assert_close(estimate.probability, MIN_PROBABILITY);
        assert!(!estimate.at_risk);
    }

    #[test]
    fn test_non_numeric_inputs_count_as_zero() {
        let mut p = params(&[("urea", 100.0)]);
        p.insert("creatinine".into(), ParamValue::Text("high".into()));
        let estimate = HeuristicEstimator.estimate(Category::Kidney, &p);
        assert_close(estimate.probability, 0.4);
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let p = params(&[("glucose", 180.0), ("bmi", 31.0)]);
        let a = HeuristicEstimator.estimate(Category::Diabetes, &p);
        let b = HeuristicEstimator.estimate(Category::Diabetes, &p);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fields_listed_per_category() {
        assert!(HeuristicEstimator::fields(Category::Heart).contains(&"bloodPressure"));
        assert_eq!(HeuristicEstimator::fields(Category::Kidney).len(), 2);
    }
}
