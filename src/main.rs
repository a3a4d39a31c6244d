use anyhow::Result;
use buglink::{
    cli::{AppContext, Cli, Commands},
    infra::config::load_config,
};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Level used when RUST_LOG is unset, by -v count
fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(cli.verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
    };

    let config = || load_config(cli.config.as_deref());

    match cli.command {
        Commands::Score(args) => buglink::score_run(args, &config()?, &ctx),
        Commands::Classify(args) => buglink::classify_run(args, &config()?, &ctx),
        Commands::Feedback(args) => buglink::feedback_run(args, &config()?, &ctx),
        Commands::Init(args) => buglink::infra::config::init(args, &ctx),
        Commands::Completions(args) => buglink::completion::run(args, &ctx),
    }
}
