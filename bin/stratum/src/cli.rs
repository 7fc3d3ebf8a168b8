use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

/// The default configuration file.
const DEFAULT_CONFIG_PATH: &str = "stratum.toml";

#[derive(Parser)]
#[command(name = "stratum")]
#[command(
    author,
    version,
    about = "Deploy and initialize the Stratum DEX protocol in a single run"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "STRATUM_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the run configuration (TOML).
    ///
    /// Values can be overridden with `STRATUM_`-prefixed environment variables, using
    /// `__` between nested keys (e.g. `STRATUM_NETWORK__RPC_URL`).
    #[arg(short, long, env = "STRATUM_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Hardhat artifacts directory. Overrides `artifacts_dir` from the configuration.
    #[arg(short, long, env = "STRATUM_ARTIFACTS")]
    pub artifacts: Option<PathBuf>,

    /// Run against an in-memory chain with the builtin protocol ABI.
    ///
    /// Nothing is sent to a node; useful to check a configuration end to end.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the resolved deployment order and initialization sequence as JSON, then exit.
    #[arg(long)]
    pub plan: bool,

    /// Write a JSON deployment report to this path, whether the run succeeds or fails.
    #[arg(short, long, env = "STRATUM_REPORT")]
    pub report: Option<PathBuf>,
}
