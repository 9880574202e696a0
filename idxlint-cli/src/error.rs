//! CLI error types and result alias.

use idxlint_core::LintError;
use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// IO error
    #[error("IO error: {0}")]
    #[diagnostic(code(idxlint::io))]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    #[diagnostic(code(idxlint::config))]
    Config(String),

    /// Baseline error
    #[error("Baseline error: {0}")]
    #[diagnostic(code(idxlint::baseline))]
    Baseline(String),

    /// The check reported findings
    #[error("Found {0} missing index(es)")]
    #[diagnostic(
        code(idxlint::findings),
        help("add an index leading each column, or record them with `idxlint baseline`")
    )]
    Findings(usize),

    /// Command error
    #[error("Command error: {0}")]
    #[diagnostic(code(idxlint::command))]
    Command(String),
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        CliError::Config(format!("Failed to parse TOML: {}", err))
    }
}

impl From<LintError> for CliError {
    fn from(err: LintError) -> Self {
        CliError::Baseline(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Command(format!("Failed to serialize report: {}", err))
    }
}
