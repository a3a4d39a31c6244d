//! Batch classification of a bug list and write-back of the results.

use std::{thread, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::core::{
    advisor::{AdvisorError, ClassificationAdvisor, UNKNOWN_CONFIDENCE},
    oracle::Oracle,
    records::{BugRecord, FeatureRecord, LinkGraph, UNDETERMINED},
};

/// One row of a batch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BugClassification
{
    pub bug_id: String,
    pub bug_title: String,
    pub bug_status: String,
    pub bug_created: String,
    pub feature_id: String,
    pub confidence: String,
    pub reason: String,
    /// Per-item failure; the row still carries an `undetermined` result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BugClassification
{
    fn for_bug(bug: &BugRecord) -> Self
    {
        Self {
            bug_id: bug
                .key
                .clone(),
            bug_title: bug
                .summary
                .clone(),
            bug_status: bug
                .status
                .clone()
                .unwrap_or_default(),
            bug_created: bug
                .created
                .clone(),
            feature_id: UNDETERMINED.to_string(),
            confidence: UNKNOWN_CONFIDENCE.to_string(),
            reason: String::new(),
            error: None,
        }
    }
}

/// Knobs for [`classify_all`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchOptions
{
    /// Pause between consecutive bugs
    pub delay: Duration,
    /// Classify at most this many bugs; 0 means all
    pub max_bugs: usize,
    /// Hide the progress bar
    pub quiet: bool,
}

/// The prefix of `bugs` a run with `max_bugs` covers.
pub fn limit_bugs(
    bugs: &[BugRecord],
    max_bugs: usize,
) -> &[BugRecord]
{
    if max_bugs > 0 && bugs.len() > max_bugs
    {
        info!(total = bugs.len(), limit = max_bugs, "limiting batch");
        &bugs[..max_bugs]
    }
    else
    {
        bugs
    }
}

/// Classify every bug in order. Oracle failures become per-row errors;
/// only an empty feature list aborts the run.
#[instrument(skip_all, fields(bugs = bugs.len(), features = features.len()))]
pub fn classify_all<O: Oracle + ?Sized>(
    advisor: &ClassificationAdvisor<'_, O>,
    bugs: &[BugRecord],
    features: &[FeatureRecord],
    options: &BatchOptions,
) -> Result<Vec<BugClassification>, AdvisorError>
{
    if features.is_empty()
    {
        return Err(AdvisorError::NoCandidates);
    }

    let targets = limit_bugs(bugs, options.max_bugs);

    let pb = if options.quiet
    {
        ProgressBar::hidden()
    }
    else
    {
        let pb = ProgressBar::new(targets.len() as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style.progress_chars("#>-"));
        pb
    };

    let mut rows = Vec::with_capacity(targets.len());
    for (i, bug) in targets
        .iter()
        .enumerate()
    {
        if i > 0 && !options.delay.is_zero()
        {
            thread::sleep(options.delay);
        }
        pb.set_message(
            bug.key
                .clone(),
        );

        let mut row = BugClassification::for_bug(bug);
        match advisor.classify(&bug.summary, &bug.description, features)
        {
            Ok(outcome) =>
            {
                let c = outcome.classification;
                row.feature_id = c.feature_id;
                row.confidence = c.confidence;
                row.reason = c.reason;
                row.error = outcome.error;
            }
            Err(e) =>
            {
                warn!(bug = %bug.key, error = %e, "classification skipped");
                row.reason = e.to_string();
                row.error = Some(e.to_string());
            }
        }
        rows.push(row);
        pb.inc(1);
    }
    pb.finish_and_clear();

    let failed = rows
        .iter()
        .filter(|r| {
            r.error
                .is_some()
        })
        .count();
    info!(classified = rows.len(), failed, "batch finished");
    Ok(rows)
}

/// Copy of `bugs` with `linked_feature` set from `results` (matched by
/// bug id). Bugs without a result keep their previous link.
pub fn enrich_bugs(
    bugs: &[BugRecord],
    results: &[BugClassification],
) -> Vec<BugRecord>
{
    let by_id: std::collections::HashMap<&str, &str> = results
        .iter()
        .map(|r| (r.bug_id.as_str(), r.feature_id.as_str()))
        .collect();

    bugs.iter()
        .map(|bug| {
            let mut bug = bug.clone();
            if let Some(feature) = by_id.get(bug.key.as_str())
            {
                bug.linked_feature = Some((*feature).to_string());
            }
            bug
        })
        .collect()
}

impl LinkGraph
{
    /// Links produced by a classification run; undetermined rows are skipped.
    pub fn from_classifications(results: &[BugClassification]) -> Self
    {
        let mut graph = LinkGraph::new();
        for r in results
        {
            graph.link(&r.feature_id, &r.bug_id);
        }
        graph
    }
}
