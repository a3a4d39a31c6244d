//! `blink classify`: link bugs to features through the oracle.

use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use tracing::info;

use crate::{
    cli::{AppContext, ClassifyArgs},
    core::{
        advisor::{ClassificationAdvisor, StageSettings},
        batch::{BatchOptions, BugClassification, classify_all, enrich_bugs},
        feedback::{CsvFeedbackLog, FeedbackStore},
        oracle::ChatCompletionsOracle,
        records::{load_bugs, load_features},
        summary::BugStatistics,
    },
    infra::{
        config::Config,
        report::{classifications_to_csv, to_json, write_output},
    },
};

pub fn run(
    args: ClassifyArgs,
    config: &Config,
    ctx: &AppContext,
) -> Result<()>
{
    let bugs = load_bugs(&args.bugs).context("Failed to load bugs")?;
    let features = load_features(&args.features).context("Failed to load features")?;
    if features.is_empty()
    {
        anyhow::bail!("No feature requests in {}; nothing to classify against", args.features.display());
    }

    let oracle = ChatCompletionsOracle::new(&config.oracle).context("Failed to set up the classification oracle")?;

    let store = if config
        .feedback
        .enabled
        && !args.no_feedback
    {
        let store = FeedbackStore::open(CsvFeedbackLog::new(&config.feedback.file))
            .context("Failed to load feedback history")?
            .with_defaults(config.feedback.similarity_threshold, config.feedback.max_examples);
        info!(entries = store.len(), "feedback history loaded");
        Some(store)
    }
    else
    {
        None
    };

    let mut advisor = ClassificationAdvisor::new(&oracle).with_settings(StageSettings::from(&config.oracle));
    if let Some(store) = &store
    {
        advisor = advisor.with_feedback(store);
    }

    let options = BatchOptions {
        delay: Duration::from_millis(
            args.delay_ms
                .unwrap_or(config.classify.delay_ms),
        ),
        max_bugs: args
            .max_bugs
            .unwrap_or(config.classify.max_bugs),
        quiet: ctx.quiet,
    };

    let rows = classify_all(&advisor, &bugs, &features, &options)?;

    write_output(&render_rows(&rows, args.output.as_deref())?, args.output.as_deref())?;

    if let Some(path) = &args.enriched_bugs
    {
        let enriched = enrich_bugs(&bugs, &rows);
        write_output(&to_json(&enriched)?, Some(path))?;
    }

    if !ctx.quiet
    {
        let stats = BugStatistics::from_results(&rows);
        eprintln!(
            "Linked {}/{} bugs ({:.1}%); confidence high {}, medium {}, low {}, unknown {}",
            stats.bugs_with_feature,
            stats.total_bugs,
            stats.linking_rate,
            stats
                .confidence
                .high,
            stats
                .confidence
                .medium,
            stats
                .confidence
                .low,
            stats
                .confidence
                .unknown,
        );
    }
    Ok(())
}

/// CSV for a `.csv` destination, JSON otherwise
fn render_rows(
    rows: &[BugClassification],
    output: Option<&Path>,
) -> Result<String>
{
    let is_csv = output
        .and_then(Path::extension)
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv { classifications_to_csv(rows) } else { to_json(rows) }
}
