//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// idxlint - find queried columns without a usable index
#[derive(Parser, Debug)]
#[command(name = "idxlint")]
#[command(author = "Pegasus Heavy Industries LLC")]
#[command(version)]
#[command(
    about = "idxlint - find queried columns without a usable index",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check repositories for columns without a usable index
    Check(CheckArgs),

    /// Record the current findings as the accepted baseline
    Baseline(BaselineArgs),

    /// Display version information
    Version,
}

// =============================================================================
// Check Command
// =============================================================================

/// Arguments for the `check` command
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Project root to scan
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    /// Path to the config file (defaults to idxlint.toml in the root)
    #[arg(short, long, env = "IDXLINT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Baseline file; only findings missing from it are reported as new
    #[arg(short, long)]
    pub baseline: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Exit successfully even when findings are reported
    #[arg(long)]
    pub no_fail: bool,
}

/// Report formats
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable report
    #[default]
    Text,
    /// Machine-readable JSON document
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

// =============================================================================
// Baseline Command
// =============================================================================

/// Arguments for the `baseline` command
#[derive(Args, Debug)]
pub struct BaselineArgs {
    /// Project root to scan
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    /// Path to the config file (defaults to idxlint.toml in the root)
    #[arg(short, long, env = "IDXLINT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Where to write the baseline (defaults to the configured path)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
