//! CLI configuration handling.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use idxlint_core::{Exclusions, ModuleLayout};
use regex_lite::Regex;
use tracing::debug;

use crate::error::{CliError, CliResult};

/// Default config file name (lives in project root)
pub const CONFIG_FILE_NAME: &str = "idxlint.toml";

/// Default baseline file (relative to project root)
pub const BASELINE_FILE_NAME: &str = "idxlint-baseline.json";

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));

/// idxlint configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which modules to scan
    pub scan: ScanConfig,

    /// Where sources and changelogs live inside each module
    pub layout: ModuleLayout,

    /// Findings that are never reported
    pub exclude: ExcludeConfig,

    /// Baseline configuration
    pub baseline: BaselineConfig,

    /// Check behavior
    pub check: CheckConfig,
}

impl Config {
    /// Load configuration from a file, expanding `${VAR}` references
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from TOML text
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> CliResult<Self> {
        let expanded = expand_env_vars(content);
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Load the config for a project.
    ///
    /// An explicit path must exist. Without one, `idxlint.toml` in `root` is
    /// used when present, and the defaults otherwise.
    pub fn load_for(root: &Path, explicit: Option<&Path>) -> CliResult<Self> {
        match explicit {
            Some(path) if !path.exists() => Err(CliError::Config(format!(
                "config file not found: {}",
                path.display()
            ))),
            Some(path) => Self::load(path),
            None => {
                let path = root.join(CONFIG_FILE_NAME);
                if path.exists() {
                    debug!(path = %path.display(), "loading config");
                    Self::load(&path)
                } else {
                    debug!(root = %root.display(), "no config file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Exclusions built from the `[exclude]` section
    pub fn exclusions(&self) -> Exclusions {
        Exclusions::new(
            &self.exclude.tables,
            &self.exclude.columns,
            &self.exclude.findings,
        )
    }

    /// Baseline path, resolved against the project root
    pub fn baseline_path(&self, root: &Path) -> PathBuf {
        let path = self
            .baseline
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(BASELINE_FILE_NAME));
        root.join(path)
    }
}

/// Module selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Module directories relative to the project root. When empty, modules
    /// are discovered from the layout.
    pub modules: Vec<PathBuf>,
}

/// Exclusion lists, matched case-insensitively
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcludeConfig {
    /// Whole tables
    pub tables: Vec<String>,

    /// Column names on any table
    pub columns: Vec<String>,

    /// `table.column` pairs
    pub findings: Vec<String>,
}

/// Baseline configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Baseline file relative to the project root
    pub path: Option<PathBuf>,
}

/// Check configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Exit non-zero when (new) findings are reported
    pub fail_on_findings: bool,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            fail_on_findings: true,
        }
    }
}

/// Replace `${VAR}` with the value of set environment variables.
fn expand_env_vars(content: &str) -> String {
    let mut result = content.to_string();

    for cap in ENV_VAR.captures_iter(content) {
        let var_name = &cap[1];
        let full_match = &cap[0];

        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(full_match, &value);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.scan.modules.is_empty());
        assert!(config.check.fail_on_findings);
        assert_eq!(config.layout, ModuleLayout::default());
        assert!(config.exclusions().is_empty());
    }

    #[test]
    fn test_parse_config() {
        let config = Config::from_str(
            r#"
            [scan]
            modules = ["services/orders", "services/users"]

            [layout]
            changelog_paths = ["db"]

            [exclude]
            tables = ["audit_log"]
            findings = ["users.status"]

            [baseline]
            path = "lint/baseline.json"

            [check]
            fail_on_findings = false
            "#,
        )
        .unwrap();

        assert_eq!(config.scan.modules.len(), 2);
        assert_eq!(config.layout.changelog_paths, vec![PathBuf::from("db")]);
        assert_eq!(config.layout.entity_paths.len(), 2);
        assert!(config.exclusions().excludes("AUDIT_LOG", "anything"));
        assert!(config.exclusions().excludes("users", "Status"));
        assert!(!config.check.fail_on_findings);
        assert_eq!(
            config.baseline_path(Path::new("/repo")),
            PathBuf::from("/repo/lint/baseline.json")
        );
    }

    #[test]
    fn test_unset_env_var_left_alone() {
        let content = "path = \"${IDXLINT_SURELY_UNSET_VARIABLE}\"";
        assert_eq!(expand_env_vars(content), content);
    }

    #[test]
    fn test_expand_set_env_var() {
        // PATH is set in any test environment
        let path = std::env::var("PATH").unwrap();
        assert_eq!(expand_env_vars("${PATH}/x"), format!("{path}/x"));
    }

    #[test]
    fn test_load_for() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_for(temp.path(), None).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(
            config.baseline_path(temp.path()),
            temp.path().join(BASELINE_FILE_NAME)
        );

        std::fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "[exclude]\ncolumns = [\"tenant_id\"]\n",
        )
        .unwrap();
        let config = Config::load_for(temp.path(), None).unwrap();
        assert_eq!(config.exclude.columns, vec!["tenant_id".to_string()]);

        let missing = temp.path().join("other.toml");
        let err = Config::load_for(temp.path(), Some(&missing)).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_str("[scan\nmodules = 1").unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }
}
