//! Aggregate views over quality reports and classification runs.

use indexmap::IndexMap;
use itertools::Itertools;
use serde::Serialize;

use crate::core::{
    advisor::ConfidenceLevel,
    batch::BugClassification,
    quality::{QualityGrade, QualityReport},
    records::UNDETERMINED,
};

/// Portfolio-level roll-up of feature reports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualitySummary
{
    pub feature_count: usize,
    /// Grades that occur, best first
    pub grade_distribution: IndexMap<String, usize>,
    pub mean_quality_score: f64,
    pub mean_resolution_rate: f64,
    pub total_bugs: usize,
    pub open_bugs: usize,
    pub resolved_bugs: usize,
    pub mean_avg_resolution_time: f64,
}

fn mean(values: impl Iterator<Item = f64>) -> f64
{
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

impl QualitySummary
{
    /// Means are 0 over an empty list.
    pub fn from_reports(reports: &[QualityReport]) -> Self
    {
        let counts = reports
            .iter()
            .map(|r| r.quality_grade)
            .counts();

        let grade_distribution = QualityGrade::ALL
            .iter()
            .filter_map(|g| {
                counts
                    .get(g)
                    .map(|n| (g.to_string(), *n))
            })
            .collect();

        Self {
            feature_count: reports.len(),
            grade_distribution,
            mean_quality_score: mean(
                reports
                    .iter()
                    .map(|r| r.quality_score),
            ),
            mean_resolution_rate: mean(
                reports
                    .iter()
                    .map(|r| r.resolution_rate),
            ),
            total_bugs: reports
                .iter()
                .map(|r| r.total_bugs)
                .sum(),
            open_bugs: reports
                .iter()
                .map(|r| r.open_bugs)
                .sum(),
            resolved_bugs: reports
                .iter()
                .map(|r| r.resolved_bugs)
                .sum(),
            mean_avg_resolution_time: mean(
                reports
                    .iter()
                    .map(|r| r.avg_resolution_time),
            ),
        }
    }
}

/// Confidence buckets of a classification run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfidenceCounts
{
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unknown: usize,
}

/// How much of a bug list a classification run managed to link
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BugStatistics
{
    pub total_bugs: usize,
    pub bugs_with_feature: usize,
    /// Percentage; 0 for an empty run
    pub linking_rate: f64,
    pub confidence: ConfidenceCounts,
}

impl BugStatistics
{
    pub fn from_results(results: &[BugClassification]) -> Self
    {
        let bugs_with_feature = results
            .iter()
            .filter(|r| {
                let f = r
                    .feature_id
                    .trim();
                !f.is_empty() && !f.eq_ignore_ascii_case(UNDETERMINED)
            })
            .count();

        let mut confidence = ConfidenceCounts::default();
        for r in results
        {
            match ConfidenceLevel::from_label(&r.confidence)
            {
                ConfidenceLevel::High => confidence.high += 1,
                ConfidenceLevel::Medium => confidence.medium += 1,
                ConfidenceLevel::Low => confidence.low += 1,
                ConfidenceLevel::Unknown => confidence.unknown += 1,
            }
        }

        let total = results.len();
        Self {
            total_bugs: total,
            bugs_with_feature,
            linking_rate: if total == 0 { 0.0 } else { bugs_with_feature as f64 / total as f64 * 100.0 },
            confidence,
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn report(
        score: f64,
        total: usize,
        open: usize,
    ) -> QualityReport
    {
        QualityReport {
            feature_key: format!("F-{score}"),
            feature_summary: String::new(),
            total_bugs: total,
            open_bugs: open,
            resolved_bugs: total - open,
            resolution_rate: 50.0,
            avg_resolution_time: 2.0,
            recent_bugs: 0,
            severity_distribution: IndexMap::new(),
            priority_distribution: IndexMap::new(),
            avg_severity: 0.0,
            quality_score: score,
            quality_grade: QualityGrade::from_score(score),
        }
    }

    fn row(
        feature: &str,
        confidence: &str,
    ) -> BugClassification
    {
        BugClassification {
            bug_id: "B".into(),
            bug_title: String::new(),
            bug_status: String::new(),
            bug_created: String::new(),
            feature_id: feature.into(),
            confidence: confidence.into(),
            reason: String::new(),
            error: None,
        }
    }

    #[test]
    fn test_quality_summary()
    {
        let s = QualitySummary::from_reports(&[report(100.0, 0, 0), report(76.0, 4, 1), report(40.0, 3, 3)]);
        assert_eq!(s.feature_count, 3);
        assert_eq!(
            s.grade_distribution
                .keys()
                .collect::<Vec<_>>(),
            ["A+", "B", "F"]
        );
        assert!((s.mean_quality_score - 72.0).abs() < 1e-9);
        assert_eq!((s.total_bugs, s.open_bugs, s.resolved_bugs), (7, 4, 3));
        assert_eq!(s.mean_avg_resolution_time, 2.0);
    }

    #[test]
    fn test_empty_summary_is_zero()
    {
        let s = QualitySummary::from_reports(&[]);
        assert_eq!(s.feature_count, 0);
        assert_eq!(s.mean_quality_score, 0.0);
        assert!(
            s.grade_distribution
                .is_empty()
        );
    }

    #[test]
    fn test_bug_statistics()
    {
        let stats = BugStatistics::from_results(&[
            row("FEAT-1", "High"),
            row("FEAT-2", "medium"),
            row("undetermined", "none"),
            row("FEAT-1", "LOW"),
        ]);
        assert_eq!(stats.total_bugs, 4);
        assert_eq!(stats.bugs_with_feature, 3);
        assert_eq!(stats.linking_rate, 75.0);
        assert_eq!(
            stats.confidence,
            ConfidenceCounts {
                high: 1,
                medium: 1,
                low: 1,
                unknown: 1
            }
        );
        assert_eq!(BugStatistics::from_results(&[]).linking_rate, 0.0);
    }
}
