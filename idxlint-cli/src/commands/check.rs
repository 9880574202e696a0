//! `idxlint check` command - Report queried columns without a usable index.

use std::path::{Path, PathBuf};

use idxlint_core::{BaselineComparison, MissingIndex, baseline};
use serde::Serialize;
use tracing::debug;

use crate::cli::{CheckArgs, OutputFormat};
use crate::config::{BASELINE_FILE_NAME, Config};
use crate::error::{CliError, CliResult};
use crate::output::{self, kv, style_existing, style_new, style_resolved};

/// JSON report document
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    modules: usize,
    missing: &'a [MissingIndex],
    #[serde(skip_serializing_if = "Option::is_none")]
    baseline: Option<&'a BaselineComparison>,
}

/// Run the check command
pub async fn run(args: CheckArgs) -> CliResult<()> {
    let root = args.root.as_path();
    let config = Config::load_for(root, args.config.as_deref())?;

    let (modules, missing) = super::analyze_project(root, &config).await?;

    let baseline_file = baseline_path(root, &config, args.baseline);
    let comparison = match &baseline_file {
        Some(path) => {
            debug!(path = %path.display(), "comparing against baseline");
            Some(baseline::compare(&missing, &baseline::load(path)?))
        }
        None => None,
    };

    match args.format {
        OutputFormat::Json => {
            let report = Report {
                modules,
                missing: &missing,
                baseline: comparison.as_ref(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            print_text(root, modules, &missing, baseline_file.as_deref(), comparison.as_ref());
        }
    }

    let reported = comparison
        .as_ref()
        .map_or(missing.len(), |c| c.new_issues.len());
    if reported > 0 && config.check.fail_on_findings && !args.no_fail {
        return Err(CliError::Findings(reported));
    }

    Ok(())
}

/// The baseline to compare against: the argument, then the configured path,
/// then the default file when it exists.
fn baseline_path(root: &Path, config: &Config, explicit: Option<PathBuf>) -> Option<PathBuf> {
    if explicit.is_some() {
        return explicit;
    }
    if config.baseline.path.is_some() {
        return Some(config.baseline_path(root));
    }
    let default = root.join(BASELINE_FILE_NAME);
    default.exists().then_some(default)
}

fn print_text(
    root: &Path,
    modules: usize,
    missing: &[MissingIndex],
    baseline_path: Option<&Path>,
    comparison: Option<&BaselineComparison>,
) {
    output::header("Index Check");
    kv("Root", &root.display().to_string());
    kv("Modules", &modules.to_string());
    if let Some(path) = baseline_path {
        kv("Baseline", &path.display().to_string());
    }
    output::newline();

    if modules == 0 {
        output::warn("No modules found under the project root");
        return;
    }

    match comparison {
        None => {
            if missing.is_empty() {
                output::success("No missing indexes found");
                return;
            }
            output::section("Missing indexes");
            for issue in missing {
                output::list_item(&describe(issue, &style_new));
            }
            output::newline();
            output::warn(&format!("{} column(s) without a usable index", missing.len()));
        }
        Some(comparison) => {
            if !comparison.new_issues.is_empty() {
                output::section("New");
                for issue in &comparison.new_issues {
                    output::list_item(&describe(issue, &style_new));
                }
                output::newline();
            }
            if !comparison.existing_issues.is_empty() {
                output::section("Accepted");
                for issue in &comparison.existing_issues {
                    output::list_item(&describe(issue, &style_existing));
                }
                output::newline();
            }
            if !comparison.resolved_issues.is_empty() {
                output::section("Resolved");
                for issue in &comparison.resolved_issues {
                    output::list_item(&style_resolved(&format!(
                        "{}: {}.{}",
                        issue.service, issue.table, issue.column
                    )));
                }
                output::newline();
            }

            kv("New", &comparison.new_issues.len().to_string());
            kv("Accepted", &comparison.existing_issues.len().to_string());
            kv("Resolved", &comparison.resolved_issues.len().to_string());
            output::newline();

            if comparison.new_issues.is_empty() {
                output::success("No new missing indexes");
            } else {
                output::warn(&format!(
                    "{} new column(s) without a usable index",
                    comparison.new_issues.len()
                ));
            }
        }
    }
}

fn describe(issue: &MissingIndex, style: &dyn Fn(&str) -> String) -> String {
    format!(
        "{}: {} ({}, {}:{}, {})",
        issue.service_name,
        style(&format!("{}.{}", issue.table_name, issue.column_name)),
        issue.query_source,
        issue.repository_file.display(),
        issue.line_number,
        issue.query_type,
    )
}
