//! Baselines: accepted findings persisted between runs.
//!
//! A baseline lets a project adopt the lint with existing findings in place.
//! Only findings missing from the baseline are new; baseline entries that no
//! longer occur are resolved and can be dropped when the file is rewritten.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LintError, LintResult};
use crate::model::{BaselineComparison, BaselineIssue, IssueKey, MissingIndex};

/// Version written to new baseline files.
pub const BASELINE_VERSION: u32 = 1;

/// On-disk baseline document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineFile {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub issues: Vec<BaselineIssue>,
}

/// Partition current findings against a baseline.
pub fn compare(current: &[MissingIndex], baseline: &[BaselineIssue]) -> BaselineComparison {
    let accepted: BTreeSet<IssueKey> = baseline.iter().map(BaselineIssue::key).collect();
    let found: BTreeSet<IssueKey> = current.iter().map(MissingIndex::key).collect();

    let mut current = current.to_vec();
    current.sort_by_cached_key(MissingIndex::key);

    let (existing_issues, new_issues): (Vec<_>, Vec<_>) = current
        .iter()
        .cloned()
        .partition(|issue| accepted.contains(&issue.key()));

    let resolved_issues = dedup(
        baseline
            .iter()
            .filter(|issue| !found.contains(&issue.key()))
            .cloned(),
    );

    BaselineComparison {
        current,
        new_issues,
        existing_issues,
        resolved_issues,
    }
}

/// Load a baseline. A missing file is an empty baseline.
pub fn load(path: &Path) -> LintResult<Vec<BaselineIssue>> {
    if !path.exists() {
        debug!(path = %path.display(), "no baseline file");
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path).map_err(|e| LintError::io(path, e))?;
    let file: BaselineFile =
        serde_json::from_str(&content).map_err(|e| LintError::baseline(path, e.to_string()))?;
    if file.version > BASELINE_VERSION {
        return Err(LintError::baseline(
            path,
            format!("unsupported version {}", file.version),
        ));
    }

    let issues = dedup(file.issues);
    debug!(path = %path.display(), issues = issues.len(), "loaded baseline");
    Ok(issues)
}

/// Write `issues` as the new baseline, deduplicated and sorted.
pub fn persist(path: &Path, issues: &[BaselineIssue]) -> LintResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| LintError::io(parent, e))?;
    }

    let file = BaselineFile {
        version: BASELINE_VERSION,
        generated_at: Utc::now(),
        issues: dedup(issues.iter().cloned()),
    };
    let mut content = serde_json::to_string_pretty(&file)?;
    content.push('\n');

    std::fs::write(path, content).map_err(|e| LintError::io(path, e))?;
    debug!(path = %path.display(), issues = file.issues.len(), "wrote baseline");
    Ok(())
}

/// Keep the first issue per key, ordered by key.
fn dedup(issues: impl IntoIterator<Item = BaselineIssue>) -> Vec<BaselineIssue> {
    let mut unique = BTreeMap::new();
    for issue in issues {
        unique.entry(issue.key()).or_insert(issue);
    }
    unique.into_values().collect()
}
