//! Canonical bug/feature records and the bug→feature link graph.
//!
//! Input may arrive flat (`key`, `summary`, `status`, ...) or shaped like
//! an issue-tracker export (`key` + `fields { summary, status { name } }`).
//! Both are normalized here, once, so nothing downstream has to care
//! which shape it was given.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Feature id used when no feature could be determined
pub const UNDETERMINED: &str = "undetermined";

/// Description placeholder for rich-text bodies
const RICH_DESCRIPTION: &str = "(rich-text description, see the issue tracker)";

/// A defect report, read-only for the duration of an analysis pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BugRecord
{
    pub key: String,
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    /// Raw creation timestamp as supplied
    #[serde(default)]
    pub created: String,
    /// Raw resolution timestamp, if resolved
    #[serde(default)]
    pub resolutiondate: Option<String>,
    /// Feature this bug was linked to by a previous pass, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_feature: Option<String>,
}

/// A feature request: an id and its summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRecord
{
    pub key: String,
    pub summary: String,
}

/// Errors loading records or relations from disk.
#[derive(Debug, thiserror::Error)]
pub enum RecordError
{
    #[error("failed to read {path}: {source}")]
    Io
    {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Json
    {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read relation table {path}: {source}")]
    Csv
    {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("relation table {path} has no recognizable bug/feature columns (found: {found})")]
    MissingColumns
    {
        path: PathBuf,
        found: String,
    },
}

// --------------------------
// Boundary shapes
// --------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum RawIssue
{
    Tracker(TrackerIssue),
    Flat(FlatIssue),
}

#[derive(Deserialize)]
struct TrackerIssue
{
    key: String,
    fields: TrackerFields,
    #[serde(default)]
    linked_feature: Option<String>,
}

#[derive(Deserialize)]
struct TrackerFields
{
    #[serde(default)]
    summary: String,
    #[serde(default)]
    description: Option<Value>,
    #[serde(default)]
    status: Option<Value>,
    #[serde(default)]
    severity: Option<Value>,
    #[serde(default)]
    priority: Option<Value>,
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    resolutiondate: Option<String>,
}

#[derive(Deserialize)]
struct FlatIssue
{
    key: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    description: Option<Value>,
    #[serde(default)]
    status: Option<Value>,
    #[serde(default)]
    severity: Option<Value>,
    #[serde(default)]
    priority: Option<Value>,
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    resolutiondate: Option<String>,
    #[serde(default)]
    linked_feature: Option<String>,
}

/// Pull a label out of `"Major"`, `{ "name": "Major" }` or `{ "value": "Major" }`.
fn label(v: Option<Value>) -> Option<String>
{
    match v?
    {
        Value::String(s) if !s
            .trim()
            .is_empty() => Some(s),
        Value::Object(map) => map
            .get("name")
            .or_else(|| map.get("value"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn description(v: Option<Value>) -> String
{
    match v
    {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(_) => RICH_DESCRIPTION.to_string(),
    }
}

fn non_empty(s: Option<String>) -> Option<String>
{
    s.filter(|s| {
        !s.trim()
            .is_empty()
    })
}

impl From<RawIssue> for BugRecord
{
    fn from(raw: RawIssue) -> Self
    {
        match raw
        {
            RawIssue::Tracker(t) => BugRecord {
                key: t.key,
                summary: t
                    .fields
                    .summary,
                description: description(
                    t.fields
                        .description,
                ),
                status: label(
                    t.fields
                        .status,
                ),
                severity: label(
                    t.fields
                        .severity,
                ),
                priority: label(
                    t.fields
                        .priority,
                ),
                created: t
                    .fields
                    .created
                    .unwrap_or_default(),
                resolutiondate: non_empty(
                    t.fields
                        .resolutiondate,
                ),
                linked_feature: non_empty(t.linked_feature),
            },
            RawIssue::Flat(f) => BugRecord {
                key: f.key,
                summary: f.summary,
                description: description(f.description),
                status: label(f.status),
                severity: label(f.severity),
                priority: label(f.priority),
                created: f
                    .created
                    .unwrap_or_default(),
                resolutiondate: non_empty(f.resolutiondate),
                linked_feature: non_empty(f.linked_feature),
            },
        }
    }
}

impl From<RawIssue> for FeatureRecord
{
    fn from(raw: RawIssue) -> Self
    {
        match raw
        {
            RawIssue::Tracker(t) => FeatureRecord {
                key: t.key,
                summary: t
                    .fields
                    .summary,
            },
            RawIssue::Flat(f) => FeatureRecord {
                key: f.key,
                summary: f.summary,
            },
        }
    }
}

fn decode_issues(
    path: &Path,
    text: &str,
) -> Result<Vec<RawIssue>, RecordError>
{
    serde_json::from_str(text).map_err(|source| RecordError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn read(path: &Path) -> Result<String, RecordError>
{
    fs::read_to_string(path).map_err(|source| RecordError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Normalize a JSON array of bugs from a string.
pub fn bugs_from_json(text: &str) -> Result<Vec<BugRecord>, RecordError>
{
    Ok(decode_issues(Path::new("<inline>"), text)?
        .into_iter()
        .map(BugRecord::from)
        .collect())
}

/// Normalize a JSON array of features from a string.
pub fn features_from_json(text: &str) -> Result<Vec<FeatureRecord>, RecordError>
{
    Ok(decode_issues(Path::new("<inline>"), text)?
        .into_iter()
        .map(FeatureRecord::from)
        .collect())
}

/// Load and normalize bugs from a JSON file.
pub fn load_bugs(path: &Path) -> Result<Vec<BugRecord>, RecordError>
{
    let bugs: Vec<BugRecord> = decode_issues(path, &read(path)?)?
        .into_iter()
        .map(BugRecord::from)
        .collect();
    debug!(path = %path.display(), count = bugs.len(), "loaded bugs");
    Ok(bugs)
}

/// Load and normalize features from a JSON file.
pub fn load_features(path: &Path) -> Result<Vec<FeatureRecord>, RecordError>
{
    let features: Vec<FeatureRecord> = decode_issues(path, &read(path)?)?
        .into_iter()
        .map(FeatureRecord::from)
        .collect();
    debug!(path = %path.display(), count = features.len(), "loaded features");
    Ok(features)
}

// --------------------------
// Link graph
// --------------------------

/// Feature id → linked bug ids, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkGraph
{
    links: IndexMap<String, Vec<String>>,
}

/// Column names recognized in a relation table (compared lowercase)
const BUG_COLUMNS: &[&str] = &["bug id", "bug_id", "bugid", "bug"];
const FEATURE_COLUMNS: &[&str] = &["feature", "feature_id", "featureid", "linked_feature"];

fn is_linkable(feature: &str) -> bool
{
    let f = feature.trim();
    !f.is_empty() && !f.eq_ignore_ascii_case(UNDETERMINED)
}

impl LinkGraph
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Record that `bug` belongs to `feature`. Undetermined/empty features
    /// and duplicate pairs are ignored.
    pub fn link(
        &mut self,
        feature: &str,
        bug: &str,
    )
    {
        if !is_linkable(feature)
        {
            return;
        }
        let bugs = self
            .links
            .entry(
                feature
                    .trim()
                    .to_string(),
            )
            .or_default();
        if !bugs
            .iter()
            .any(|b| b == bug)
        {
            bugs.push(bug.to_string());
        }
    }

    /// Build from each bug's own `linked_feature`.
    pub fn from_bugs(bugs: &[BugRecord]) -> Self
    {
        let mut graph = Self::new();
        for bug in bugs
        {
            if let Some(feature) = &bug.linked_feature
            {
                graph.link(feature, &bug.key);
            }
        }
        graph
    }

    /// Build from a CSV relation table with a bug column and a feature column.
    pub fn from_relation_table(path: &Path) -> Result<Self, RecordError>
    {
        let csv_err = |source| RecordError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
        let headers = reader
            .headers()
            .map_err(csv_err)?
            .clone();

        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| {
                    names.contains(
                        &h.trim()
                            .to_lowercase()
                            .as_str(),
                    )
                })
        };

        let (Some(bug_col), Some(feature_col)) = (find(BUG_COLUMNS), find(FEATURE_COLUMNS))
        else
        {
            return Err(RecordError::MissingColumns {
                path: path.to_path_buf(),
                found: headers
                    .iter()
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        };

        let mut graph = Self::new();
        for (i, row) in reader
            .records()
            .enumerate()
        {
            let row = match row
            {
                Ok(row) => row,
                Err(e) =>
                {
                    warn!(path = %path.display(), row = i + 2, error = %e, "skipping malformed relation row");
                    continue;
                }
            };
            if let (Some(bug), Some(feature)) = (row.get(bug_col), row.get(feature_col))
            {
                let bug = bug.trim();
                if !bug.is_empty()
                {
                    graph.link(feature, bug);
                }
            }
        }

        debug!(path = %path.display(), features = graph.len(), "loaded relation table");
        Ok(graph)
    }

    /// Bug ids linked to `feature`, empty when none.
    pub fn bugs_for(
        &self,
        feature: &str,
    ) -> &[String]
    {
        self.links
            .get(feature)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Resolve a feature's bug ids against loaded records, skipping unknown ids.
    pub fn linked_bugs<'a>(
        &self,
        feature: &str,
        by_key: &HashMap<&str, &'a BugRecord>,
    ) -> Vec<&'a BugRecord>
    {
        self.bugs_for(feature)
            .iter()
            .filter_map(|id| {
                by_key
                    .get(id.as_str())
                    .copied()
            })
            .collect()
    }

    pub fn len(&self) -> usize
    {
        self.links
            .len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.links
            .is_empty()
    }
}

/// Index bugs by key for link resolution.
pub fn index_bugs(bugs: &[BugRecord]) -> HashMap<&str, &BugRecord>
{
    bugs.iter()
        .map(|b| (b.key.as_str(), b))
        .collect()
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_flat_and_tracker_shapes_normalize_alike()
    {
        let json = r#"[
            {"key": "BUG-1", "summary": "Login crash", "status": "Open",
             "severity": "Major", "priority": "High", "created": "2024-01-01T00:00:00Z"},
            {"key": "BUG-2", "fields": {"summary": "Login crash",
             "status": {"name": "Open"}, "severity": {"value": "Major"},
             "priority": {"name": "High"}, "created": "2024-01-01T00:00:00Z",
             "description": {"type": "doc"}}}
        ]"#;

        let bugs = bugs_from_json(json).unwrap();
        assert_eq!(bugs.len(), 2);
        for bug in &bugs
        {
            assert_eq!(bug.summary, "Login crash");
            assert_eq!(bug.status.as_deref(), Some("Open"));
            assert_eq!(bug.severity.as_deref(), Some("Major"));
            assert_eq!(bug.priority.as_deref(), Some("High"));
            assert_eq!(bug.resolutiondate, None);
        }
        assert_eq!(bugs[1].description, RICH_DESCRIPTION);
    }

    #[test]
    fn test_missing_optional_fields_default()
    {
        let bugs = bugs_from_json(r#"[{"key": "BUG-9", "resolutiondate": ""}]"#).unwrap();
        assert_eq!(bugs[0].summary, "");
        assert_eq!(bugs[0].status, None);
        assert_eq!(bugs[0].resolutiondate, None);
    }

    #[test]
    fn test_features_from_json_accepts_both_shapes()
    {
        let json = r#"[
            {"key": "FEAT-1", "summary": "User login"},
            {"key": "FEAT-2", "fields": {"summary": "PDF export"}}
        ]"#;

        let features = features_from_json(json).unwrap();
        let pairs: Vec<(&str, &str)> = features
            .iter()
            .map(|f| (f.key.as_str(), f.summary.as_str()))
            .collect();
        assert_eq!(pairs, vec![("FEAT-1", "User login"), ("FEAT-2", "PDF export")]);

        assert!(matches!(
            features_from_json(r#"{"key": "FEAT-1"}"#),
            Err(RecordError::Json { .. })
        ));
    }

    #[test]
    fn test_graph_from_bugs_skips_undetermined()
    {
        let bugs = vec![
            BugRecord {
                key: "B-1".into(),
                linked_feature: Some("F-1".into()),
                ..Default::default()
            },
            BugRecord {
                key: "B-2".into(),
                linked_feature: Some(UNDETERMINED.into()),
                ..Default::default()
            },
            BugRecord {
                key: "B-3".into(),
                linked_feature: Some("F-1".into()),
                ..Default::default()
            },
        ];

        let graph = LinkGraph::from_bugs(&bugs);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.bugs_for("F-1"), &["B-1".to_string(), "B-3".to_string()]);
        assert!(
            graph
                .bugs_for("F-404")
                .is_empty()
        );
    }

    #[test]
    fn test_relation_table_column_detection()
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir
            .path()
            .join("relations.csv");
        fs::write(&path, "Bug ID,Title,Feature_ID\nB-1,x,F-1\nB-2,y,\nB-3,z,undetermined\nB-4,w,F-2\n").unwrap();

        let graph = LinkGraph::from_relation_table(&path).unwrap();
        assert_eq!(graph.bugs_for("F-1"), &["B-1".to_string()]);
        assert_eq!(graph.bugs_for("F-2"), &["B-4".to_string()]);
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_relation_table_without_columns_is_error()
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir
            .path()
            .join("relations.csv");
        fs::write(&path, "a,b\n1,2\n").unwrap();

        let err = LinkGraph::from_relation_table(&path).unwrap_err();
        assert!(matches!(err, RecordError::MissingColumns { .. }));
    }

    #[test]
    fn test_linked_bugs_skips_unknown_ids()
    {
        let bugs = vec![BugRecord {
            key: "B-1".into(),
            ..Default::default()
        }];
        let mut graph = LinkGraph::new();
        graph.link("F-1", "B-1");
        graph.link("F-1", "B-missing");

        let index = index_bugs(&bugs);
        let linked = graph.linked_bugs("F-1", &index);
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].key, "B-1");
    }
}
