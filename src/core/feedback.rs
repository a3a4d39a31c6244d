//! Append-only store of human classification corrections.
//!
//! The in-memory log is rebuilt by replaying the whole durable log when
//! the store is opened; there is no incremental index. New corrections
//! are appended in memory first and then written through a
//! [`FeedbackLog`]. A failed durable write is reported to the caller but
//! the in-memory entry stays, so the correction still biases the rest of
//! the session. A crash between the two steps loses that one entry.

use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::similarity::{Jaccard, TextSimilarity};

/// Default minimum similarity for a past correction to count as relevant
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Default number of past corrections returned per query
pub const DEFAULT_MAX_EXAMPLES: usize = 5;

/// Timestamp layout written to the log
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One recorded correction. Field names double as the log's column set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEntry
{
    pub bug_id: String,
    pub bug_title: String,
    /// Feature the classifier originally chose
    pub predicted_feature: String,
    /// Feature a human says is right
    pub correct_feature: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub timestamp: String,
}

impl FeedbackEntry
{
    /// Build an entry stamped with the current local time.
    pub fn now(
        bug_id: impl Into<String>,
        bug_title: impl Into<String>,
        predicted_feature: impl Into<String>,
        correct_feature: impl Into<String>,
        reason: Option<&str>,
    ) -> Self
    {
        Self {
            bug_id: bug_id.into(),
            bug_title: bug_title.into(),
            predicted_feature: predicted_feature.into(),
            correct_feature: correct_feature.into(),
            reason: reason
                .unwrap_or_default()
                .to_string(),
            timestamp: Local::now()
                .format(TIMESTAMP_FORMAT)
                .to_string(),
        }
    }
}

/// Errors from reading or appending the durable log.
#[derive(Debug, thiserror::Error)]
pub enum FeedbackError
{
    #[error("failed to read feedback log {path}: {source}")]
    Read
    {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to open feedback log {path} for append: {source}")]
    Open
    {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to append to feedback log {path}: {source}")]
    Append
    {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to flush feedback log {path}: {source}")]
    Flush
    {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Durable side of the store: replay everything, append one record.
pub trait FeedbackLog
{
    /// Read every persisted entry in insertion order.
    fn load(&self) -> Result<Vec<FeedbackEntry>, FeedbackError>;

    /// Durably append a single entry.
    fn append(
        &self,
        entry: &FeedbackEntry,
    ) -> Result<(), FeedbackError>;
}

/// CSV-backed log with the header written once, on first creation.
#[derive(Debug, Clone)]
pub struct CsvFeedbackLog
{
    path: PathBuf,
}

impl CsvFeedbackLog
{
    pub fn new(path: impl Into<PathBuf>) -> Self
    {
        Self { path: path.into() }
    }
}

impl FeedbackLog for CsvFeedbackLog
{
    fn load(&self) -> Result<Vec<FeedbackEntry>, FeedbackError>
    {
        if !self
            .path
            .exists()
        {
            debug!(path = %self.path.display(), "no feedback log yet");
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path).map_err(|source| {
            FeedbackError::Read {
                path: self
                    .path
                    .clone(),
                source,
            }
        })?;

        let mut entries = Vec::new();
        for (i, row) in reader
            .deserialize::<FeedbackEntry>()
            .enumerate()
        {
            match row
            {
                Ok(entry) => entries.push(entry),
                Err(source) if source.is_io_error() =>
                {
                    return Err(FeedbackError::Read {
                        path: self
                            .path
                            .clone(),
                        source,
                    });
                }
                Err(e) =>
                {
                    // Row 1 is the header
                    warn!(path = %self.path.display(), row = i + 2, error = %e, "skipping malformed feedback row");
                }
            }
        }

        info!(count = entries.len(), "loaded feedback history");
        Ok(entries)
    }

    fn append(
        &self,
        entry: &FeedbackEntry,
    ) -> Result<(), FeedbackError>
    {
        let open_err = |source| FeedbackError::Open {
            path: self
                .path
                .clone(),
            source,
        };

        if let Some(parent) = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            fs::create_dir_all(parent).map_err(open_err)?;
        }

        // An existing but empty file still needs its header
        let needs_header = fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(open_err)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);

        writer
            .serialize(entry)
            .map_err(|source| FeedbackError::Append {
                path: self
                    .path
                    .clone(),
                source,
            })?;

        writer
            .flush()
            .map_err(|source| FeedbackError::Flush {
                path: self
                    .path
                    .clone(),
                source,
            })
    }
}

/// A stored correction paired with its derived similarity to a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevantFeedback<'a>
{
    pub entry: &'a FeedbackEntry,
    pub similarity: f64,
}

/// In-memory correction log plus similarity retrieval.
pub struct FeedbackStore
{
    log: Box<dyn FeedbackLog>,
    entries: Vec<FeedbackEntry>,
    measure: Box<dyn TextSimilarity>,
    threshold: f64,
    max_examples: usize,
}

impl FeedbackStore
{
    /// Replay `log` into memory. Missing logs start empty.
    pub fn open(log: impl FeedbackLog + 'static) -> Result<Self, FeedbackError>
    {
        let entries = log.load()?;

        Ok(Self {
            log: Box::new(log),
            entries,
            measure: Box::new(Jaccard),
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_examples: DEFAULT_MAX_EXAMPLES,
        })
    }

    /// Replace the similarity measure used by every query.
    pub fn with_similarity(
        mut self,
        measure: impl TextSimilarity + 'static,
    ) -> Self
    {
        self.measure = Box::new(measure);
        self
    }

    /// Threshold and limit used by [`relevant`](Self::relevant) and the prompt fragment.
    pub fn with_defaults(
        mut self,
        threshold: f64,
        max_examples: usize,
    ) -> Self
    {
        self.threshold = threshold;
        self.max_examples = max_examples;
        self
    }

    /// Threshold used by [`relevant`](Self::relevant)
    pub fn threshold(&self) -> f64
    {
        self.threshold
    }

    /// Limit used by [`relevant`](Self::relevant)
    pub fn max_examples(&self) -> usize
    {
        self.max_examples
    }

    pub fn entries(&self) -> &[FeedbackEntry]
    {
        &self.entries
    }

    pub fn len(&self) -> usize
    {
        self.entries
            .len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.entries
            .is_empty()
    }

    /// Append in memory, then persist. The in-memory append is kept even
    /// when the durable write fails.
    pub fn record(
        &mut self,
        entry: FeedbackEntry,
    ) -> Result<(), FeedbackError>
    {
        self.entries
            .push(entry);
        let stored = &self.entries[self.entries.len() - 1];

        match self
            .log
            .append(stored)
        {
            Ok(()) =>
            {
                info!(bug = %stored.bug_id, feature = %stored.correct_feature, "feedback recorded");
                Ok(())
            }
            Err(e) =>
            {
                warn!(bug = %stored.bug_id, error = %e, "feedback kept in memory but not persisted");
                Err(e)
            }
        }
    }

    /// Past corrections whose title similarity is at least `threshold`,
    /// most similar first, insertion order on ties, at most `limit`.
    ///
    /// `_description` is accepted so a richer measure can use it later;
    /// the current measure compares titles only.
    pub fn query(
        &self,
        title: &str,
        _description: &str,
        threshold: f64,
        limit: usize,
    ) -> Vec<RelevantFeedback<'_>>
    {
        let mut hits: Vec<RelevantFeedback<'_>> = self
            .entries
            .iter()
            .map(|entry| RelevantFeedback {
                entry,
                similarity: self
                    .measure
                    .similarity(title, &entry.bug_title),
            })
            .filter(|hit| hit.similarity >= threshold)
            .collect();

        // Stable: equal similarities keep insertion order
        hits.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
        });
        hits.truncate(limit);
        hits
    }

    /// [`query`](Self::query) with the store's configured threshold and limit.
    pub fn relevant(
        &self,
        title: &str,
        description: &str,
    ) -> Vec<RelevantFeedback<'_>>
    {
        self.query(title, description, self.threshold, self.max_examples)
    }

    /// Exemplar block for a classification request; empty when nothing
    /// relevant exists so callers can concatenate unconditionally.
    pub fn render_prompt_fragment(
        &self,
        title: &str,
        description: &str,
    ) -> String
    {
        let hits = self.relevant(title, description);
        if hits.is_empty()
        {
            return String::new();
        }

        let mut out = String::from("Past corrections for similar bugs (most similar first):\n");
        for hit in &hits
        {
            let e = hit.entry;
            out.push_str(&format!(
                "- Bug '{}': '{}' was classified as '{}' but should be '{}'.",
                e.bug_id, e.bug_title, e.predicted_feature, e.correct_feature
            ));
            if !e
                .reason
                .trim()
                .is_empty()
            {
                out.push(' ');
                out.push_str(
                    e.reason
                        .trim(),
                );
            }
            if hit.similarity > 0.0
            {
                out.push_str(&format!(" (similarity: {:.2})", hit.similarity));
            }
            out.push('\n');
        }
        out.push_str("Apply the patterns in these corrections to the current bug.\n");
        out
    }
}
