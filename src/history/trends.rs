//! Derived views over the history: per-category risk trends and summaries.
//!
//! Everything here is computed on demand from the records; nothing is cached.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::PredictionRecord;
use crate::category::Category;

/// Number of recent predictions shown in a trend by default.
pub const DEFAULT_TREND_WINDOW: usize = 10;

/// One point of a risk trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    /// 1-based position, oldest first.
    pub index: usize,
    /// Probability scaled to 0-100.
    pub probability_percent: f64,
    pub at_risk: bool,
    pub created_at: DateTime<Utc>,
}

/// Aggregate figures for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub category: Category,
    /// Number of predictions recorded.
    pub total: usize,
    /// Number of predictions flagged at risk.
    pub at_risk: usize,
    /// Mean probability, `None` when there are no predictions.
    pub average_probability: Option<f64>,
    /// Time of the newest prediction.
    pub latest: Option<DateTime<Utc>>,
}

impl CategorySummary {
    fn empty(category: Category) -> Self {
        Self {
            category,
            total: 0,
            at_risk: 0,
            average_probability: None,
            latest: None,
        }
    }

    /// Share of predictions flagged at risk, in [0, 1].
    #[must_use]
    pub fn at_risk_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.at_risk as f64 / self.total as f64
        }
    }
}

/// Build the risk trend for `category` from newest-first records.
///
/// Takes the `window` most recent matching records and returns them oldest
/// first, so the last point is the latest prediction.
pub fn trend<'a>(
    records: impl IntoIterator<Item = &'a PredictionRecord>,
    category: Category,
    window: usize,
) -> Vec<TrendPoint> {
    let mut recent: Vec<&PredictionRecord> = records
        .into_iter()
        .filter(|r| r.category == category)
        .take(window)
        .collect();
    recent.reverse();

    recent
        .into_iter()
        .enumerate()
        .map(|(i, r)| TrendPoint {
            index: i + 1,
            probability_percent: r.probability_percent(),
            at_risk: r.at_risk,
            created_at: r.created_at,
        })
        .collect()
}

/// Summarize newest-first records per category.
///
/// Every category is present in the result, in canonical order.
pub fn summarize<'a>(
    records: impl IntoIterator<Item = &'a PredictionRecord>,
) -> Vec<CategorySummary> {
    let mut summaries: Vec<CategorySummary> =
        Category::ALL.iter().copied().map(CategorySummary::empty).collect();
    let mut sums = [0.0_f64; Category::ALL.len()];

    for record in records {
        let Some(slot) = Category::ALL.iter().position(|c| *c == record.category) else {
            continue;
        };
        let summary = &mut summaries[slot];
        summary.total += 1;
        if record.at_risk {
            summary.at_risk += 1;
        }
        sums[slot] += record.probability;
        summary.latest = Some(match summary.latest {
            Some(latest) => latest.max(record.created_at),
            None => record.created_at,
        });
    }

    for (summary, sum) in summaries.iter_mut().zip(sums) {
        if summary.total > 0 {
            summary.average_probability = Some(sum / summary.total as f64);
        }
    }

    summaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{Parameters, RecordId};
    use chrono::Duration;

    fn record(category: Category, probability: f64, minutes_ago: i64) -> PredictionRecord {
        PredictionRecord {
            id: RecordId::new(),
            category,
            at_risk: probability > 0.5,
            probability,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            parameters: Parameters::new(),
        }
    }

    #[test]
    fn test_trend_is_chronological_and_filtered() {
        // newest first
        let records = vec![
            record(Category::Heart, 0.8, 1),
            record(Category::Liver, 0.3, 2),
            record(Category::Heart, 0.4, 3),
        ];

        let points = trend(&records, Category::Heart, DEFAULT_TREND_WINDOW);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].index, 1);
        assert!((points[0].probability_percent - 40.0).abs() < 1e-9);
        assert!((points[1].probability_percent - 80.0).abs() < 1e-9);
        assert!(points[1].at_risk);
    }

    #[test]
    fn test_trend_keeps_only_most_recent_window() {
        let records: Vec<PredictionRecord> = (0..15)
            .map(|i| record(Category::Kidney, 0.1 + i as f64 * 0.01, i))
            .collect();

        let points = trend(&records, Category::Kidney, 10);
        assert_eq!(points.len(), 10);
        // last point is the newest record
        assert!((points[9].probability_percent - 10.0).abs() < 1e-9);
        assert_eq!(points[9].created_at, records[0].created_at);
    }

    #[test]
    fn test_trend_empty_for_unmatched_category() {
        let records = vec![record(Category::Heart, 0.5, 0)];
        assert!(trend(&records, Category::Diabetes, 10).is_empty());
    }

    #[test]
    fn test_summarize_covers_every_category() {
        let records = vec![
            record(Category::Heart, 0.9, 0),
            record(Category::Heart, 0.3, 5),
            record(Category::Diabetes, 0.6, 10),
        ];

        let summaries = summarize(&records);
        assert_eq!(summaries.len(), 4);

        let heart = &summaries[0];
        assert_eq!(heart.category, Category::Heart);
        assert_eq!(heart.total, 2);
        assert_eq!(heart.at_risk, 1);
        assert!((heart.average_probability.unwrap() - 0.6).abs() < 1e-9);
        assert_eq!(heart.latest, Some(records[0].created_at));
        assert!((heart.at_risk_ratio() - 0.5).abs() < 1e-9);

        let liver = &summaries[2];
        assert_eq!(liver.total, 0);
        assert!(liver.average_probability.is_none());
        assert_eq!(liver.at_risk_ratio(), 0.0);
    }
}
