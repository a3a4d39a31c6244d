//! `blink score`: grade every feature from its linked bugs.

use anyhow::{Context, Result};
use chrono::Utc;
use owo_colors::OwoColorize;
use tracing::{info, warn};

use crate::{
    cli::{AppContext, ScoreArgs},
    core::{
        quality::QualityScorer,
        records::{LinkGraph, load_bugs, load_features},
        summary::QualitySummary,
    },
    infra::{
        config::Config,
        report::{ReportFormat, reports_to_csv, reports_to_table, to_json, write_output},
    },
};

pub fn run(
    args: ScoreArgs,
    config: &Config,
    ctx: &AppContext,
) -> Result<()>
{
    let features = load_features(&args.features).context("Failed to load features")?;
    let bugs = load_bugs(&args.bugs).context("Failed to load bugs")?;

    let graph = match &args.relations
    {
        Some(path) => LinkGraph::from_relation_table(path).context("Failed to load relation table")?,
        None => LinkGraph::from_bugs(&bugs),
    };
    if graph.is_empty() && !bugs.is_empty()
    {
        warn!("no bug is linked to any feature; every feature scores as bug-free");
    }
    info!(features = features.len(), bugs = bugs.len(), linked_features = graph.len(), "scoring");

    let scorer = QualityScorer::new(
        config
            .scoring
            .clone(),
    );
    let reports = scorer.score_all(&features, &bugs, &graph, Utc::now());

    let rendered = match args.format
    {
        ReportFormat::Json => to_json(&reports)?,
        ReportFormat::Csv => reports_to_csv(&reports)?,
        ReportFormat::Table => reports_to_table(&reports, ctx.no_color),
    };
    write_output(&rendered, args.output.as_deref())?;

    if ctx.quiet
    {
        return Ok(());
    }
    if let Some(path) = &args.output
    {
        eprintln!("Wrote {} feature reports to {}", reports.len(), path.display());
    }
    if args.summary
    {
        print_summary(&QualitySummary::from_reports(&reports), ctx);
    }
    Ok(())
}

fn print_summary(
    summary: &QualitySummary,
    ctx: &AppContext,
)
{
    let heading = "Quality summary";
    if ctx.no_color
    {
        eprintln!("{heading}");
    }
    else
    {
        eprintln!(
            "{}",
            heading
                .bold()
                .cyan()
        );
    }
    eprintln!("  Features:             {}", summary.feature_count);
    eprintln!("  Mean quality score:   {:.1}", summary.mean_quality_score);
    eprintln!("  Mean resolution rate: {:.1}%", summary.mean_resolution_rate);
    eprintln!(
        "  Bugs:                 {} total, {} open, {} resolved",
        summary.total_bugs, summary.open_bugs, summary.resolved_bugs
    );
    eprintln!("  Mean resolution time: {:.1} days", summary.mean_avg_resolution_time);
    for (grade, count) in &summary.grade_distribution
    {
        eprintln!("  {grade:<3} {count}");
    }
}
