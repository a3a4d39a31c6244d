//! Property tests for similarity, scoring, grading and retrieval.

use std::{cell::RefCell, rc::Rc};

use buglink::core::{
    feedback::{FeedbackEntry, FeedbackError, FeedbackLog, FeedbackStore},
    quality::{QualityGrade, QualityScorer},
    records::{BugRecord, FeatureRecord},
    similarity::similarity,
};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;

#[derive(Default, Clone)]
struct VecLog(Rc<RefCell<Vec<FeedbackEntry>>>);

impl FeedbackLog for VecLog
{
    fn load(&self) -> Result<Vec<FeedbackEntry>, FeedbackError>
    {
        Ok(self
            .0
            .borrow()
            .clone())
    }

    fn append(
        &self,
        entry: &FeedbackEntry,
    ) -> Result<(), FeedbackError>
    {
        self.0
            .borrow_mut()
            .push(entry.clone());
        Ok(())
    }
}

fn words() -> impl Strategy<Value = String>
{
    prop::collection::vec(prop::sample::select(vec!["login", "crash", "export", "pdf", "Submit", "page", "sync"]), 0..6)
        .prop_map(|w| w.join(" "))
}

fn bug() -> impl Strategy<Value = BugRecord>
{
    let status = prop::option::of(prop::sample::select(vec!["Open", "Closed", "Backlog", "In Progress", "weird"]));
    let severity = prop::option::of(prop::sample::select(vec!["Blocker", "Critical", "Minor", "Trivial", "???"]));
    let created = prop::sample::select(vec!["2024-01-01", "2024-05-30T12:00:00Z", "garbage", ""]);
    let resolved = prop::option::of(prop::sample::select(vec!["2024-01-05", "2023-12-01", "nope"]));
    (status, severity, created, resolved).prop_map(|(status, severity, created, resolved)| BugRecord {
        key: "B".into(),
        summary: "s".into(),
        status: status.map(str::to_string),
        severity: severity.map(str::to_string),
        created: created.to_string(),
        resolutiondate: resolved.map(str::to_string),
        ..Default::default()
    })
}

proptest! {
    #[test]
    fn similarity_is_symmetric_and_bounded(a in words(), b in words())
    {
        let ab = similarity(&a, &b);
        prop_assert_eq!(ab, similarity(&b, &a));
        prop_assert!((0.0..=1.0).contains(&ab));
        if !a.trim().is_empty()
        {
            prop_assert_eq!(similarity(&a, &a), 1.0);
        }
    }

    #[test]
    fn quality_score_stays_in_range(bugs in prop::collection::vec(bug(), 0..40))
    {
        let scorer = QualityScorer::default();
        let feature = FeatureRecord { key: "F".into(), summary: String::new() };
        let refs: Vec<&BugRecord> = bugs.iter().collect();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let report = scorer.score_at(&feature, &refs, now);
        prop_assert!((0.0..=100.0).contains(&report.quality_score));
        prop_assert!((0.0..=100.0).contains(&report.resolution_rate));
        prop_assert_eq!(report.total_bugs, bugs.len());
        prop_assert!(report.open_bugs + report.resolved_bugs <= report.total_bugs);
        prop_assert_eq!(report.quality_grade, QualityGrade::from_score(report.quality_score));
    }

    #[test]
    fn open_blocker_never_raises_score(bugs in prop::collection::vec(bug(), 0..20))
    {
        let scorer = QualityScorer::default();
        let feature = FeatureRecord { key: "F".into(), summary: String::new() };
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let blocker = BugRecord {
            key: "X".into(),
            status: Some("Open".into()),
            severity: Some("Blocker".into()),
            ..Default::default()
        };

        let before: Vec<&BugRecord> = bugs.iter().collect();
        let mut after = before.clone();
        after.push(&blocker);

        let a = scorer.score_at(&feature, &before, now).quality_score;
        let b = scorer.score_at(&feature, &after, now).quality_score;
        prop_assert!(b <= a, "{b} > {a}");
    }

    #[test]
    fn grade_is_monotone(a in 0.0f64..=100.0, b in 0.0f64..=100.0)
    {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(QualityGrade::from_score(lo) <= QualityGrade::from_score(hi));
    }

    #[test]
    fn query_respects_threshold_limit_and_order(
        titles in prop::collection::vec(words(), 0..15),
        query in words(),
        threshold in 0.0f64..=1.0,
        limit in 0usize..6,
    )
    {
        let mut store = FeedbackStore::open(VecLog::default()).unwrap();
        for (i, title) in titles.iter().enumerate()
        {
            store.record(FeedbackEntry::now(format!("B-{i}"), title.clone(), "F-1", "F-2", None)).unwrap();
        }

        let hits = store.query(&query, "", threshold, limit);
        prop_assert!(hits.len() <= limit);
        prop_assert!(hits.iter().all(|h| h.similarity >= threshold));
        prop_assert!(hits.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    }
}
