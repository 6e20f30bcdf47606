//! Prediction records and their opaque parameter bags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::category::Category;
use crate::error::{Result, RiskwatchError};

/// Unique identifier of a prediction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generate a new random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Input parameters of a prediction, keyed by field name.
pub type Parameters = BTreeMap<String, ParamValue>;

/// A single parameter value.
///
/// Serialized untagged, so a parameter bag reads as plain JSON:
/// `{"age": 54, "smoker": false, "notes": "fasting"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Flag(bool),
    Number(f64),
    Text(String),
    Group(Parameters),
}

impl ParamValue {
    /// Numeric view of the value, if it is a number.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Parse a command-line literal: booleans, then numbers, otherwise text.
    #[must_use]
    pub fn parse_literal(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed {
            "true" => return ParamValue::Flag(true),
            "false" => return ParamValue::Flag(false),
            _ => {}
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => ParamValue::Number(n),
            _ => ParamValue::Text(trimmed.to_string()),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Flag(b) => write!(f, "{b}"),
            ParamValue::Number(n) => write!(f, "{n}"),
            ParamValue::Text(s) => f.write_str(s),
            ParamValue::Group(group) => {
                f.write_str("{")?;
                for (i, (key, value)) in group.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Number(value as f64)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Flag(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<Parameters> for ParamValue {
    fn from(value: Parameters) -> Self {
        ParamValue::Group(value)
    }
}

/// Parse a `key=value` assignment into a parameter entry.
///
/// # Errors
///
/// Returns [`RiskwatchError::InvalidParameter`] if there is no `=` or the key is empty.
pub fn parse_assignment(input: &str) -> Result<(String, ParamValue)> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| RiskwatchError::invalid_parameter(input, "expected key=value"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(RiskwatchError::invalid_parameter(input, "empty key"));
    }
    Ok((key.to_string(), ParamValue::parse_literal(value)))
}

/// Check that every number in a parameter bag, including nested groups, is finite.
///
/// JSON has no representation for NaN or infinity, so such values could be
/// written but never read back.
///
/// # Errors
///
/// Returns [`RiskwatchError::InvalidParameter`] naming the dotted path of the
/// first offending value.
pub fn validate_parameters(parameters: &Parameters) -> Result<()> {
    fn walk(prefix: &str, parameters: &Parameters) -> Result<()> {
        for (key, value) in parameters {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            match value {
                ParamValue::Number(n) if !n.is_finite() => {
                    return Err(RiskwatchError::invalid_parameter(
                        format!("{path}={n}"),
                        "numbers must be finite",
                    ));
                }
                ParamValue::Group(group) => walk(&path, group)?,
                _ => {}
            }
        }
        Ok(())
    }

    walk("", parameters)
}

/// One completed estimation, as stored in the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    /// Unique identifier, never reused.
    pub id: RecordId,
    /// Disease category.
    pub category: Category,
    /// Outcome flag.
    pub at_risk: bool,
    /// Estimated probability in [0, 1].
    pub probability: f64,
    /// When the record was added.
    pub created_at: DateTime<Utc>,
    /// Inputs the estimate was computed from, stored verbatim.
    #[serde(default)]
    pub parameters: Parameters,
}

impl PredictionRecord {
    /// Label shown for the outcome.
    #[must_use]
    pub fn risk_label(&self) -> &'static str {
        if self.at_risk {
            "High Risk"
        } else {
            "Low Risk"
        }
    }

    /// Probability as a percentage.
    #[must_use]
    pub fn probability_percent(&self) -> f64 {
        self.probability * 100.0
    }

    /// One-line summary for list views.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} {} {:.0}% ({})",
            self.created_at.format("%Y-%m-%d %H:%M"),
            self.category.display_name(),
            self.probability_percent(),
            self.risk_label()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> PredictionRecord {
        let mut parameters = Parameters::new();
        parameters.insert("age".into(), ParamValue::Number(54.0));
        parameters.insert("cholesterol".into(), ParamValue::Number(240.0));
        PredictionRecord {
            id: RecordId::new(),
            category: Category::Heart,
            at_risk: true,
            probability: 0.73,
            created_at: Utc::now(),
            parameters,
        }
    }

    #[test]
    fn test_record_ids_are_distinct() {
        let a = RecordId::new();
        let b = RecordId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_record_id_parses_from_display() {
        let id = RecordId::new();
        let parsed: RecordId = id.to_string().parse().expect("valid uuid");
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let json = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(json["category"], "heart");
        assert_eq!(json["atRisk"], true);
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["parameters"]["age"], 54.0);
    }

    #[test]
    fn test_record_ignores_unknown_fields_and_defaults_parameters() {
        let json = r#"{
            "id": "5f0c6f4e-8a1b-4a53-9d3e-2f0b1f6c9a10",
            "category": "liver",
            "atRisk": false,
            "probability": 0.2,
            "createdAt": "2024-03-01T12:00:00Z",
            "futureField": {"anything": [1, 2, 3]}
        }"#;
        let record: PredictionRecord = serde_json::from_str(json).expect("forward-readable");
        assert_eq!(record.category, Category::Liver);
        assert!(record.parameters.is_empty());
    }

    #[test]
    fn test_nested_parameters_roundtrip() {
        let mut labs = Parameters::new();
        labs.insert("albumin".into(), ParamValue::Number(3.4));
        labs.insert("lab".into(), "north".into());

        let mut record = sample_record();
        record.parameters.insert("labs".into(), ParamValue::Group(labs));
        record.parameters.insert("smoker".into(), false.into());

        let json = serde_json::to_string(&record).unwrap();
        let back: PredictionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!(ParamValue::parse_literal("54"), ParamValue::Number(54.0));
        assert_eq!(ParamValue::parse_literal("2.5"), ParamValue::Number(2.5));
        assert_eq!(ParamValue::parse_literal("true"), ParamValue::Flag(true));
        assert_eq!(
            ParamValue::parse_literal("male"),
            ParamValue::Text("male".into())
        );
        assert_eq!(
            ParamValue::parse_literal("NaN"),
            ParamValue::Text("NaN".into())
        );
    }

    /// splitmix64, for reproducible arbitrary bit patterns.
    fn next_bits(state: &mut u64) -> u64 {
        *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = *state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    #[test]
    fn test_full_precision_floats_roundtrip() {
        let mut state = 0x5EED_u64;
        for _ in 0..20_000 {
            let mut record = sample_record();
            // uniform over [0, 1) with all 53 mantissa bits used
            record.probability = (next_bits(&mut state) >> 11) as f64 / (1u64 << 53) as f64;

            let arbitrary = f64::from_bits(next_bits(&mut state));
            if arbitrary.is_finite() {
                record
                    .parameters
                    .insert("raw".into(), ParamValue::Number(arbitrary));
            }

            let json = serde_json::to_string(&record).unwrap();
            let back: PredictionRecord = serde_json::from_str(&json).unwrap();
            assert_eq!(back.probability.to_bits(), record.probability.to_bits());
            assert_eq!(back, record);
        }
    }

    #[test]
    fn test_edge_numbers_roundtrip() {
        let edges = [
            (1u64 << 53) as f64 + 2.0,
            (1u64 << 60) as f64,
            -((1u64 << 62) as f64),
            f64::MAX,
            f64::MIN_POSITIVE,
            5e-324,
            0.1 + 0.2,
            -0.0,
        ];
        let mut record = sample_record();
        for (i, value) in edges.iter().enumerate() {
            record
                .parameters
                .insert(format!("edge{i}"), ParamValue::Number(*value));
        }

        let json = serde_json::to_string_pretty(&record).unwrap();
        let back: PredictionRecord = serde_json::from_str(&json).unwrap();
        for (i, value) in edges.iter().enumerate() {
            let restored = back.parameters[&format!("edge{i}")].as_number().unwrap();
            assert_eq!(restored.to_bits(), value.to_bits(), "edge{i}");
        }
    }

    #[test]
    fn test_validate_parameters_rejects_non_finite_numbers() {
        let mut params = Parameters::new();
        params.insert("age".into(), ParamValue::Number(54.0));
        assert!(validate_parameters(&params).is_ok());

        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut flat = params.clone();
            flat.insert("glucose".into(), ParamValue::Number(bad));
            let err = validate_parameters(&flat).unwrap_err();
            assert!(matches!(err, RiskwatchError::InvalidParameter { ref input, .. } if input.starts_with("glucose=")));
        }

        let mut labs = Parameters::new();
        labs.insert("albumin".into(), ParamValue::Number(f64::NAN));
        let mut nested = params.clone();
        nested.insert("labs".into(), ParamValue::Group(labs));
        let err = validate_parameters(&nested).unwrap_err();
        assert!(err.to_string().contains("labs.albumin"));
    }

    #[test]
    fn test_parse_assignment() {
        let (key, value) = parse_assignment("glucose=140").unwrap();
        assert_eq!(key, "glucose");
        assert_eq!(value, ParamValue::Number(140.0));

        assert!(parse_assignment("glucose").is_err());
        assert!(parse_assignment("=140").is_err());
    }

    #[test]
    fn test_risk_label_and_summary() {
        let record = sample_record();
        assert_eq!(record.risk_label(), "High Risk");
        assert!(record.summary().contains("Heart Disease"));
        assert!(record.summary().contains("73%"));
    }
}
