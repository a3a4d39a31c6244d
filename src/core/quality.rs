//! Feature quality scoring from linked bugs.
//!
//! A report is a pure function of the feature, its linked bugs, the
//! [`ScoringPolicy`] tables and the injected `now` (only the trailing
//! recent-bug window reads it).
//!
//! Scoring order matters:
//! 1. start at 100 and deduct `severity_weight * open_deduction_factor`
//!    for every open bug;
//! 2. if the resolution rate is below `damping_threshold`, multiply the
//!    remaining score by `damping_base + resolution_rate / damping_divisor`;
//! 3. clamp to `[0, 100]`.
//!
//! The damping constants are an empirical policy, not a derived law, so
//! they live in the policy table next to the weights.
//!
//! A feature with no bugs has a resolution rate of 100 and scores 100:
//! an empty feature counts as perfectly healthy.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, instrument, warn};

use crate::core::{
    records::{BugRecord, FeatureRecord, LinkGraph, index_bugs},
    timestamp::{parse_timestamp, whole_days_between},
};

/// Label used when a bug carries no severity/priority/status
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Coarse status bucket every raw status maps into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusBucket
{
    #[serde(alias = "Open")]
    Open,
    #[serde(alias = "Resolved")]
    Resolved,
    #[serde(alias = "Other")]
    Other,
}

/// Twelve-band letter grade, ordered worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QualityGrade
{
    F,
    D,
    DPlus,
    CMinus,
    C,
    CPlus,
    BMinus,
    B,
    BPlus,
    AMinus,
    A,
    APlus,
}

/// Lower bound (inclusive) of each band, best first
const GRADE_BANDS: [(f64, QualityGrade); 11] = [
    (95.0, QualityGrade::APlus),
    (90.0, QualityGrade::A),
    (85.0, QualityGrade::AMinus),
    (80.0, QualityGrade::BPlus),
    (75.0, QualityGrade::B),
    (70.0, QualityGrade::BMinus),
    (65.0, QualityGrade::CPlus),
    (60.0, QualityGrade::C),
    (55.0, QualityGrade::CMinus),
    (50.0, QualityGrade::DPlus),
    (45.0, QualityGrade::D),
];

impl QualityGrade
{
    /// All grades, best first
    pub const ALL: [QualityGrade; 12] = [
        QualityGrade::APlus,
        QualityGrade::A,
        QualityGrade::AMinus,
        QualityGrade::BPlus,
        QualityGrade::B,
        QualityGrade::BMinus,
        QualityGrade::CPlus,
        QualityGrade::C,
        QualityGrade::CMinus,
        QualityGrade::DPlus,
        QualityGrade::D,
        QualityGrade::F,
    ];

    /// Band a score; total over all floats (NaN and anything below 45 is F).
    pub fn from_score(score: f64) -> Self
    {
        GRADE_BANDS
            .iter()
            .find(|(floor, _)| score >= *floor)
            .map(|(_, grade)| *grade)
            .unwrap_or(QualityGrade::F)
    }

    pub fn as_str(self) -> &'static str
    {
        match self
        {
            QualityGrade::APlus => "A+",
            QualityGrade::A => "A",
            QualityGrade::AMinus => "A-",
            QualityGrade::BPlus => "B+",
            QualityGrade::B => "B",
            QualityGrade::BMinus => "B-",
            QualityGrade::CPlus => "C+",
            QualityGrade::C => "C",
            QualityGrade::CMinus => "C-",
            QualityGrade::DPlus => "D+",
            QualityGrade::D => "D",
            QualityGrade::F => "F",
        }
    }
}

impl std::fmt::Display for QualityGrade
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result
    {
        f.write_str(self.as_str())
    }
}

impl Serialize for QualityGrade
{
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Shorthand for [`QualityGrade::from_score`]
pub fn grade(score: f64) -> QualityGrade
{
    QualityGrade::from_score(score)
}

/// Weight tables and tunable constants for scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy
{
    /// Severity label → weight (also the display order of the distribution)
    pub severity_weights: IndexMap<String, f64>,

    /// Priority label → weight (display order of the distribution)
    pub priority_weights: IndexMap<String, f64>,

    /// Raw status → bucket; anything absent is `Other`
    pub status_categories: IndexMap<String, StatusBucket>,

    /// Weight for severities missing from the table. The default of 1.0
    /// outranks `Trivial` (0.5); lookups that fall back above a table
    /// weight are logged at warn level.
    pub default_severity_weight: f64,

    /// Trailing window for `recent_bugs`
    pub recent_window_days: i64,

    /// Resolution rate (%) below which damping applies
    pub damping_threshold: f64,

    /// Damping factor at 0% resolution
    pub damping_base: f64,

    /// Divisor of the resolution rate in the damping factor
    pub damping_divisor: f64,

    /// Multiplier on severity weight per open bug
    pub open_deduction_factor: f64,
}

impl Default for ScoringPolicy
{
    fn default() -> Self
    {
        let weights = |pairs: &[(&str, f64)]| {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<IndexMap<_, _>>()
        };

        Self {
            severity_weights: weights(&[
                ("Blocker", 5.0),
                ("Critical", 4.0),
                ("Major", 3.0),
                ("Normal", 2.0),
                ("Minor", 1.0),
                ("Trivial", 0.5),
            ]),
            priority_weights: weights(&[
                ("Highest", 5.0),
                ("High", 4.0),
                ("Medium", 3.0),
                ("Low", 2.0),
                ("Lowest", 1.0),
            ]),
            status_categories: [
                ("Open", StatusBucket::Open),
                ("In Progress", StatusBucket::Open),
                ("Reopened", StatusBucket::Open),
                ("To Do", StatusBucket::Open),
                ("Resolved", StatusBucket::Resolved),
                ("Closed", StatusBucket::Resolved),
                ("Done", StatusBucket::Resolved),
                ("Backlog", StatusBucket::Other),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
            default_severity_weight: 1.0,
            recent_window_days: 30,
            damping_threshold: 80.0,
            damping_base: 0.5,
            damping_divisor: 160.0,
            open_deduction_factor: 2.0,
        }
    }
}

/// Quality report for a single feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport
{
    pub feature_key: String,
    pub feature_summary: String,
    pub total_bugs: usize,
    pub open_bugs: usize,
    pub resolved_bugs: usize,
    /// Percentage in `[0, 100]`; 100 when there are no bugs
    pub resolution_rate: f64,
    /// Mean whole days to resolve; 0 when nothing contributes
    pub avg_resolution_time: f64,
    pub recent_bugs: usize,
    pub severity_distribution: IndexMap<String, usize>,
    pub priority_distribution: IndexMap<String, usize>,
    pub avg_severity: f64,
    pub quality_score: f64,
    pub quality_grade: QualityGrade,
}

/// Lowercased lookup over a policy table
fn fold<V: Copy>(table: &IndexMap<String, V>) -> HashMap<String, V>
{
    table
        .iter()
        .map(|(k, v)| {
            (
                k.trim()
                    .to_lowercase(),
                *v,
            )
        })
        .collect()
}

fn label_of(raw: Option<&str>) -> &str
{
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_LABEL)
}

/// Applies a [`ScoringPolicy`] to features and their bugs.
#[derive(Debug, Clone)]
pub struct QualityScorer
{
    policy: ScoringPolicy,
    severity: HashMap<String, f64>,
    priority: HashMap<String, f64>,
    status: HashMap<String, StatusBucket>,
}

impl Default for QualityScorer
{
    fn default() -> Self
    {
        Self::new(ScoringPolicy::default())
    }
}

impl QualityScorer
{
    /// Labels are matched case-insensitively against the policy tables.
    pub fn new(policy: ScoringPolicy) -> Self
    {
        Self {
            severity: fold(&policy.severity_weights),
            priority: fold(&policy.priority_weights),
            status: fold(&policy.status_categories),
            policy,
        }
    }

    /// True when unknown severities weigh more than the lightest table label.
    pub fn default_outranks_table(&self) -> bool
    {
        self.severity
            .values()
            .any(|w| self.policy.default_severity_weight > *w)
    }

    /// Bucket for a raw status; unknown and missing statuses are `Other`.
    pub fn bucket(
        &self,
        status: Option<&str>,
    ) -> StatusBucket
    {
        let label = label_of(status);
        match self
            .status
            .get(&label.to_lowercase())
        {
            Some(bucket) => *bucket,
            None =>
            {
                debug!(status = label, "status not in category table, counting as other");
                StatusBucket::Other
            }
        }
    }

    /// Weight for a severity label; labels absent from the table get the
    /// configured default (which may outrank deliberately low labels).
    pub fn severity_weight(
        &self,
        severity: Option<&str>,
    ) -> f64
    {
        let label = label_of(severity);
        match self
            .severity
            .get(&label.to_lowercase())
        {
            Some(w) => *w,
            None =>
            {
                if self.default_outranks_table()
                {
                    warn!(
                        severity = label,
                        default = self.policy.default_severity_weight,
                        "unknown severity gets a default weight above some known labels"
                    );
                }
                else
                {
                    debug!(
                        severity = label,
                        default = self.policy.default_severity_weight,
                        "severity not in weight table, using default weight"
                    );
                }
                self.policy
                    .default_severity_weight
            }
        }
    }

    /// Score a feature using the current wall clock for the recent window.
    pub fn score(
        &self,
        feature: &FeatureRecord,
        bugs: &[&BugRecord],
    ) -> QualityReport
    {
        self.score_at(feature, bugs, Utc::now())
    }

    /// Score a feature as of `now`.
    pub fn score_at(
        &self,
        feature: &FeatureRecord,
        bugs: &[&BugRecord],
        now: DateTime<Utc>,
    ) -> QualityReport
    {
        let total_bugs = bugs.len();

        let mut open_bugs = 0;
        let mut resolved_bugs = 0;
        for bug in bugs
        {
            match self.bucket(
                bug.status
                    .as_deref(),
            )
            {
                StatusBucket::Open => open_bugs += 1,
                StatusBucket::Resolved => resolved_bugs += 1,
                StatusBucket::Other =>
                {}
            }
        }

        let resolution_rate = resolution_rate(resolved_bugs, total_bugs);

        let severity_distribution = self.distribution(
            bugs.iter()
                .map(|b| {
                    b.severity
                        .as_deref()
                }),
            &self.severity,
        );
        let priority_distribution = self.distribution(
            bugs.iter()
                .map(|b| {
                    b.priority
                        .as_deref()
                }),
            &self.priority,
        );

        let avg_severity = if total_bugs == 0
        {
            0.0
        }
        else
        {
            bugs.iter()
                .map(|b| {
                    self.severity_weight(
                        b.severity
                            .as_deref(),
                    )
                })
                .sum::<f64>()
                / total_bugs as f64
        };

        let recent_bugs = self.count_recent(bugs, now);
        let avg_resolution_time = avg_resolution_days(bugs);
        let quality_score = self.quality_score(bugs, resolution_rate);

        QualityReport {
            feature_key: feature
                .key
                .clone(),
            feature_summary: feature
                .summary
                .clone(),
            total_bugs,
            open_bugs,
            resolved_bugs,
            resolution_rate,
            avg_resolution_time,
            recent_bugs,
            severity_distribution,
            priority_distribution,
            avg_severity,
            quality_score,
            quality_grade: grade(quality_score),
        }
    }

    /// Severity deductions for open bugs, then resolution-rate damping,
    /// then clamp to `[0, 100]`.
    pub fn quality_score(
        &self,
        bugs: &[&BugRecord],
        resolution_rate: f64,
    ) -> f64
    {
        let p = &self.policy;
        let mut score = 100.0;

        for bug in bugs
        {
            if self.bucket(
                bug.status
                    .as_deref(),
            ) == StatusBucket::Open
            {
                score -= self.severity_weight(
                    bug.severity
                        .as_deref(),
                ) * p.open_deduction_factor;
            }
        }

        if resolution_rate < p.damping_threshold
        {
            score *= p.damping_base + resolution_rate / p.damping_divisor;
        }

        if score.is_nan() { 0.0 } else { score.clamp(0.0, 100.0) }
    }

    /// Score every feature against the bugs the link graph assigns it.
    #[instrument(skip_all, fields(features = features.len(), bugs = bugs.len()))]
    pub fn score_all(
        &self,
        features: &[FeatureRecord],
        bugs: &[BugRecord],
        graph: &LinkGraph,
        now: DateTime<Utc>,
    ) -> Vec<QualityReport>
    {
        let index = index_bugs(bugs);
        features
            .iter()
            .map(|feature| {
                let linked = graph.linked_bugs(&feature.key, &index);
                self.score_at(feature, &linked, now)
            })
            .collect()
    }

    /// Label counts ordered by table weight (descending), then unknown
    /// labels in first-seen order.
    fn distribution<'a>(
        &self,
        labels: impl Iterator<Item = Option<&'a str>>,
        weights: &HashMap<String, f64>,
    ) -> IndexMap<String, usize>
    {
        let mut counts: IndexMap<String, usize> = IndexMap::new();
        for raw in labels
        {
            *counts
                .entry(label_of(raw).to_string())
                .or_default() += 1;
        }

        let rank = |label: &str| weights.get(&label.to_lowercase()).copied();
        counts.sort_by(|a, _, b, _| match (rank(a), rank(b))
        {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        counts
    }

    fn count_recent(
        &self,
        bugs: &[&BugRecord],
        now: DateTime<Utc>,
    ) -> usize
    {
        // A window reaching past the representable range counts every parseable bug
        let cutoff = TimeDelta::try_days(self.policy.recent_window_days).and_then(|window| now.checked_sub_signed(window));
        bugs.iter()
            .filter_map(|b| parse_timestamp(&b.created))
            .filter(|created| cutoff.is_none_or(|cutoff| *created > cutoff))
            .count()
    }
}

/// `resolved / total * 100`, or 100 for a feature with no bugs.
pub fn resolution_rate(
    resolved: usize,
    total: usize,
) -> f64
{
    if total == 0
    {
        100.0
    }
    else
    {
        resolved as f64 / total as f64 * 100.0
    }
}

/// Mean whole-day resolution time over bugs whose timestamps both parse.
fn avg_resolution_days(bugs: &[&BugRecord]) -> f64
{
    let mut days = Vec::new();
    for bug in bugs
    {
        let Some(resolved_raw) = bug
            .resolutiondate
            .as_deref()
        else
        {
            continue;
        };

        match (parse_timestamp(&bug.created), parse_timestamp(resolved_raw))
        {
            (Some(created), Some(resolved)) => days.push(whole_days_between(created, resolved)),
            _ =>
            {
                debug!(
                    bug = %bug.key,
                    created = %bug.created,
                    resolved = resolved_raw,
                    "unparseable timestamps, excluded from resolution time"
                );
            }
        }
    }

    if days.is_empty()
    {
        0.0
    }
    else
    {
        days.iter()
            .sum::<i64>() as f64
            / days.len() as f64
    }
}
