//! `idxlint baseline` command - Accept the current findings.

use idxlint_core::{BaselineIssue, baseline};

use crate::cli::BaselineArgs;
use crate::config::Config;
use crate::error::CliResult;
use crate::output::{self, kv};

/// Run the baseline command
pub async fn run(args: BaselineArgs) -> CliResult<()> {
    let root = args.root.as_path();
    let config = Config::load_for(root, args.config.as_deref())?;

    output::header("Record Baseline");

    let (modules, missing) = super::analyze_project(root, &config).await?;
    let issues: Vec<BaselineIssue> = missing.iter().map(BaselineIssue::from).collect();

    let path = args
        .output
        .unwrap_or_else(|| config.baseline_path(root));
    baseline::persist(&path, &issues)?;

    kv("Modules", &modules.to_string());
    kv("Issues", &issues.len().to_string());
    kv("File", &path.display().to_string());
    output::newline();
    output::success(&format!(
        "Recorded {} accepted finding(s) in {}",
        issues.len(),
        path.display()
    ));

    Ok(())
}
