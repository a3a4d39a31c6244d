//! Rendering of quality reports and classification runs.

use std::{
    fs,
    io::Write,
    path::Path,
};

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use crate::core::{
    batch::BugClassification,
    quality::{QualityGrade, QualityReport},
};

/// Output format for `score`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat
{
    #[default]
    Json,
    Csv,
    Table,
}

/// Pretty JSON with a trailing newline.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String>
{
    let mut s = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    s.push('\n');
    Ok(s)
}

/// Flat CSV row; distributions are JSON-encoded in their cells
#[derive(Serialize)]
struct ReportRow<'a>
{
    feature_key: &'a str,
    feature_summary: &'a str,
    quality_grade: &'static str,
    quality_score: f64,
    total_bugs: usize,
    open_bugs: usize,
    resolved_bugs: usize,
    resolution_rate: f64,
    avg_resolution_time: f64,
    recent_bugs: usize,
    avg_severity: f64,
    severity_distribution: String,
    priority_distribution: String,
}

pub fn reports_to_csv(reports: &[QualityReport]) -> Result<String>
{
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for r in reports
    {
        wtr.serialize(ReportRow {
            feature_key: &r.feature_key,
            feature_summary: &r.feature_summary,
            quality_grade: r
                .quality_grade
                .as_str(),
            quality_score: r.quality_score,
            total_bugs: r.total_bugs,
            open_bugs: r.open_bugs,
            resolved_bugs: r.resolved_bugs,
            resolution_rate: r.resolution_rate,
            avg_resolution_time: r.avg_resolution_time,
            recent_bugs: r.recent_bugs,
            avg_severity: r.avg_severity,
            severity_distribution: serde_json::to_string(&r.severity_distribution)?,
            priority_distribution: serde_json::to_string(&r.priority_distribution)?,
        })
        .context("Failed to write CSV row")?;
    }
    csv_into_string(wtr)
}

/// Classification rows as CSV, one line per bug
pub fn classifications_to_csv(rows: &[BugClassification]) -> Result<String>
{
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for row in rows
    {
        wtr.serialize(row)
            .context("Failed to write CSV row")?;
    }
    csv_into_string(wtr)
}

fn csv_into_string(wtr: csv::Writer<Vec<u8>>) -> Result<String>
{
    let bytes = wtr
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV output was not UTF-8")
}

fn paint_grade(
    grade: QualityGrade,
    no_color: bool,
) -> String
{
    let label = grade.as_str();
    if no_color
    {
        return label.to_string();
    }
    match grade
    {
        QualityGrade::APlus | QualityGrade::A | QualityGrade::AMinus => label
            .green()
            .bold()
            .to_string(),
        QualityGrade::BPlus | QualityGrade::B | QualityGrade::BMinus => label
            .cyan()
            .to_string(),
        QualityGrade::CPlus | QualityGrade::C | QualityGrade::CMinus => label
            .yellow()
            .to_string(),
        QualityGrade::DPlus | QualityGrade::D | QualityGrade::F => label
            .red()
            .bold()
            .to_string(),
    }
}

/// Terminal table, one row per feature
pub fn reports_to_table(
    reports: &[QualityReport],
    no_color: bool,
) -> String
{
    #[derive(Tabled)]
    struct Row
    {
        #[tabled(rename = "Feature")]
        feature: String,
        #[tabled(rename = "Summary")]
        summary: String,
        #[tabled(rename = "Grade")]
        grade: String,
        #[tabled(rename = "Score")]
        score: String,
        #[tabled(rename = "Bugs")]
        bugs: usize,
        #[tabled(rename = "Open")]
        open: usize,
        #[tabled(rename = "Resolved %")]
        resolution: String,
        #[tabled(rename = "Avg days")]
        avg_days: String,
        #[tabled(rename = "Recent")]
        recent: usize,
    }

    let rows: Vec<Row> = reports
        .iter()
        .map(|r| Row {
            feature: r
                .feature_key
                .clone(),
            summary: r
                .feature_summary
                .clone(),
            grade: paint_grade(r.quality_grade, no_color),
            score: format!("{:.1}", r.quality_score),
            bugs: r.total_bugs,
            open: r.open_bugs,
            resolution: format!("{:.1}", r.resolution_rate),
            avg_days: format!("{:.1}", r.avg_resolution_time),
            recent: r.recent_bugs,
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    format!("{table}\n")
}

/// Write `content` to `path`, or to stdout when `path` is `None`.
pub fn write_output(
    content: &str,
    path: Option<&Path>,
) -> Result<()>
{
    match path
    {
        Some(path) =>
        {
            if let Some(parent) = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
            {
                fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
        }
        None =>
        {
            let mut out = std::io::stdout().lock();
            out.write_all(content.as_bytes())
                .context("Failed to write to stdout")?;
            out.flush()
                .context("Failed to flush stdout")
        }
    }
}
