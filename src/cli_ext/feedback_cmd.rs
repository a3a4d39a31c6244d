//! `blink feedback`: record and query classification corrections.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde_json::json;
use tracing::instrument;

use crate::{
    cli::{AppContext, FeedbackArgs, FeedbackQueryArgs, FeedbackRecordArgs, FeedbackSubcommand},
    core::feedback::{CsvFeedbackLog, FeedbackEntry, FeedbackStore},
    infra::{
        config::Config,
        report::{to_json, write_output},
    },
};

pub fn run(
    args: FeedbackArgs,
    config: &Config,
    ctx: &AppContext,
) -> Result<()>
{
    let file: PathBuf = args
        .file
        .unwrap_or_else(|| {
            config
                .feedback
                .file
                .clone()
        });
    let store = FeedbackStore::open(CsvFeedbackLog::new(&file))
        .with_context(|| format!("Failed to load feedback log {}", file.display()))?
        .with_defaults(config.feedback.similarity_threshold, config.feedback.max_examples);

    match args.command
    {
        FeedbackSubcommand::Record(rec) => record(store, rec, &file, ctx),
        FeedbackSubcommand::Query(q) => query(&store, q, ctx),
    }
}

#[instrument(skip_all, fields(bug = %args.bug_id))]
fn record(
    mut store: FeedbackStore,
    args: FeedbackRecordArgs,
    file: &Path,
    ctx: &AppContext,
) -> Result<()>
{
    let entry = FeedbackEntry::now(
        args.bug_id,
        args.title,
        args.predicted,
        args.correct,
        args.reason
            .as_deref(),
    );
    store
        .record(entry)
        .with_context(|| format!("Failed to append to {}", file.display()))?;

    if !ctx.quiet
    {
        let msg = format!("Recorded correction #{} in {}", store.len(), file.display());
        if ctx.no_color
        {
            eprintln!("{msg}");
        }
        else
        {
            eprintln!("{}", msg.green());
        }
    }
    Ok(())
}

fn query(
    store: &FeedbackStore,
    args: FeedbackQueryArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let threshold = args
        .threshold
        .unwrap_or(store.threshold());
    if !(0.0..=1.0).contains(&threshold)
    {
        anyhow::bail!("--threshold must be within [0, 1], got {threshold}");
    }
    let limit = args
        .limit
        .unwrap_or(store.max_examples());

    let hits = store.query(&args.title, &args.description, threshold, limit);

    if args.json
    {
        let payload: Vec<_> = hits
            .iter()
            .map(|hit| {
                json!({
                    "bug_id": hit.entry.bug_id,
                    "bug_title": hit.entry.bug_title,
                    "predicted_feature": hit.entry.predicted_feature,
                    "correct_feature": hit.entry.correct_feature,
                    "reason": hit.entry.reason,
                    "timestamp": hit.entry.timestamp,
                    "similarity": hit.similarity,
                })
            })
            .collect();
        return write_output(&to_json(&payload)?, None);
    }

    if hits.is_empty()
    {
        if !ctx.quiet
        {
            eprintln!("No past corrections at similarity >= {threshold:.2}");
        }
        return Ok(());
    }

    let mut out = String::new();
    for hit in &hits
    {
        let e = hit.entry;
        let sim = format!("{:.2}", hit.similarity);
        let sim = if ctx.no_color { sim } else { sim.yellow().to_string() };
        out.push_str(&format!(
            "{sim}  {}  '{}': {} -> {}",
            e.bug_id, e.bug_title, e.predicted_feature, e.correct_feature
        ));
        if !e
            .reason
            .is_empty()
        {
            out.push_str(&format!(" ({})", e.reason));
        }
        out.push('\n');
    }
    write_output(&out, None)
}
