use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    cli::{AppContext, InitArgs},
    core::{
        feedback::{DEFAULT_MAX_EXAMPLES, DEFAULT_SIMILARITY_THRESHOLD},
        oracle::OracleConfig,
        quality::ScoringPolicy,
    },
};

/// Config files looked up in the working directory, first hit wins
pub const CONFIG_FILES: [&str; 4] = ["buglink.toml", "buglink.yaml", "buglink.json", ".buglink.toml"];

/// Environment prefix; `BUGLINK__ORACLE__API_KEY` sets `oracle.api_key`
pub const ENV_PREFIX: &str = "BUGLINK";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Oracle endpoint and sampling settings
    pub oracle: OracleConfig,

    /// Correction log and exemplar retrieval
    pub feedback: FeedbackConfig,

    /// Batch classification pacing
    pub classify: ClassifyConfig,

    /// Quality scoring tables and damping policy
    pub scoring: ScoringPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig
{
    pub enabled: bool,
    pub file: PathBuf,
    pub similarity_threshold: f64,
    pub max_examples: usize,
}

impl Default for FeedbackConfig
{
    fn default() -> Self
    {
        Self {
            enabled: true,
            file: PathBuf::from("feedback_history.csv"),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_examples: DEFAULT_MAX_EXAMPLES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig
{
    /// Pause between oracle-backed bugs, in milliseconds
    pub delay_ms: u64,
    /// 0 = no limit
    pub max_bugs: usize,
}

impl Default for ClassifyConfig
{
    fn default() -> Self
    {
        Self {
            delay_ms: 500,
            max_bugs: 0,
        }
    }
}

/// Load `explicit` (or the first config file found in the working
/// directory), then overlay `BUGLINK__*` environment variables.
pub fn load_config(explicit: Option<&Path>) -> Result<Config>
{
    load_config_from(explicit, Path::new("."))
}

/// Same as [`load_config`] but searches `dir` instead of the working directory.
pub fn load_config_from(
    explicit: Option<&Path>,
    dir: &Path,
) -> Result<Config>
{
    let mut builder = config::Config::builder();

    match explicit
    {
        Some(path) =>
        {
            if !path.exists()
            {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            debug!(path = %path.display(), "using explicit config");
            builder = builder.add_source(config::File::from(path));
        }
        None =>
        {
            // Load from config files in priority order
            if let Some(found) = CONFIG_FILES
                .iter()
                .map(|name| dir.join(name))
                .find(|p| p.exists())
            {
                debug!(path = %found.display(), "using config file");
                builder = builder.add_source(config::File::from(found.as_path()));
            }
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__"),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join(CONFIG_FILES[0]);

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::create_dir_all(&args.path)
        .with_context(|| format!("Failed to create {}", args.path.display()))?;

    let toml_string = toml::to_string_pretty(&Config::default()).context("Failed to serialize default config")?;

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}
