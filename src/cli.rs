use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::infra::report::ReportFormat;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
}

#[derive(Parser)]
#[command(name = "blink")]
#[command(
    about = "Link bugs to feature requests with an LLM and grade feature quality from their bugs"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Explicit config file (default: buglink.toml in the working directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress bars and non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG wins
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Grade every feature from the bugs linked to it
    Score(ScoreArgs),

    /// Link each bug to its most likely feature via the LLM oracle
    Classify(ClassifyArgs),

    /// Record or look up classification corrections
    Feedback(FeedbackArgs),

    /// Initialize a buglink.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Parser)]
pub struct ScoreArgs {
    /// Feature requests (JSON array)
    #[arg(long, value_name = "FILE")]
    pub features: PathBuf,

    /// Bugs (JSON array); their `linked_feature` is used unless --relations is set
    #[arg(long, value_name = "FILE")]
    pub bugs: PathBuf,

    /// Bug/feature relation table (CSV)
    #[arg(long, value_name = "FILE")]
    pub relations: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = ReportFormat::Json)]
    pub format: ReportFormat,

    /// Output file path (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print a portfolio summary to stderr
    #[arg(long)]
    pub summary: bool,
}

#[derive(Debug, Parser)]
pub struct ClassifyArgs {
    /// Bugs (JSON array)
    #[arg(long, value_name = "FILE")]
    pub bugs: PathBuf,

    /// Candidate feature requests (JSON array)
    #[arg(long, value_name = "FILE")]
    pub features: PathBuf,

    /// Classification results; `.csv` writes CSV, anything else JSON (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also write the bugs with `linked_feature` filled in (JSON)
    #[arg(long, value_name = "FILE")]
    pub enriched_bugs: Option<PathBuf>,

    /// Classify at most N bugs (0 = all; overrides classify.max_bugs)
    #[arg(long)]
    pub max_bugs: Option<usize>,

    /// Pause between bugs in milliseconds (overrides classify.delay_ms)
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Do not bias requests with past corrections
    #[arg(long)]
    pub no_feedback: bool,
}

#[derive(Debug, Parser)]
pub struct FeedbackArgs {
    #[command(subcommand)]
    pub command: FeedbackSubcommand,

    /// Feedback log (overrides feedback.file)
    #[arg(long, global = true, value_name = "FILE")]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum FeedbackSubcommand {
    /// Append a correction to the feedback log
    Record(FeedbackRecordArgs),

    /// Show past corrections similar to a bug title
    Query(FeedbackQueryArgs),
}

#[derive(Args, Debug)]
pub struct FeedbackRecordArgs {
    /// Bug identifier
    #[arg(long)]
    pub bug_id: String,

    /// Bug title
    #[arg(long)]
    pub title: String,

    /// Feature the classifier predicted
    #[arg(long)]
    pub predicted: String,

    /// Feature the bug actually belongs to
    #[arg(long)]
    pub correct: String,

    /// Why the prediction was wrong
    #[arg(long)]
    pub reason: Option<String>,
}

#[derive(Args, Debug)]
pub struct FeedbackQueryArgs {
    /// Title of the bug to find corrections for
    #[arg(long)]
    pub title: String,

    /// Bug description
    #[arg(long, default_value = "")]
    pub description: String,

    /// Minimum title similarity in [0, 1] (default: feedback.similarity_threshold)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Maximum number of corrections (default: feedback.max_examples)
    #[arg(long)]
    pub limit: Option<usize>,

    /// Machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
