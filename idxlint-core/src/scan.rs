//! The analysis pipeline for one module and for a set of modules.
//!
//! For each module the entity map is built first, because query extraction
//! resolves fields through it. Changelog extraction is independent. The
//! comparator then joins both sides.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::compare::{Exclusions, compare};
use crate::model::{MissingIndex, TableMapping};
use crate::{changelog, entity, query};

/// Default directories holding Kotlin and Java sources.
pub const DEFAULT_SOURCE_PATHS: &[&str] = &["src/main/kotlin", "src/main/java"];

/// Default changelog directory.
pub const DEFAULT_CHANGELOG_PATHS: &[&str] = &["src/main/resources/db/changelog"];

/// Where a module keeps its sources and changelogs, relative to the module
/// directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleLayout {
    pub entity_paths: Vec<PathBuf>,
    pub repository_paths: Vec<PathBuf>,
    pub changelog_paths: Vec<PathBuf>,
}

impl Default for ModuleLayout {
    fn default() -> Self {
        let paths = |items: &[&str]| items.iter().map(PathBuf::from).collect::<Vec<_>>();
        Self {
            entity_paths: paths(DEFAULT_SOURCE_PATHS),
            repository_paths: paths(DEFAULT_SOURCE_PATHS),
            changelog_paths: paths(DEFAULT_CHANGELOG_PATHS),
        }
    }
}

impl ModuleLayout {
    /// Whether `dir` contains any directory of this layout.
    pub fn matches(&self, dir: &Path) -> bool {
        self.entity_paths
            .iter()
            .chain(&self.repository_paths)
            .chain(&self.changelog_paths)
            .any(|rel| dir.join(rel).exists())
    }
}

/// A named module directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    pub name: String,
    pub directory: PathBuf,
}

impl ModuleSource {
    /// Create a module source.
    pub fn new(name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
        }
    }
}

/// Analyze one module. The result is ordered by table, then column.
pub fn analyze_module(
    module: &ModuleSource,
    layout: &ModuleLayout,
    exclusions: &Exclusions,
) -> Vec<MissingIndex> {
    let dir = &module.directory;

    let mut mappings: BTreeMap<String, TableMapping> = BTreeMap::new();
    for rel in &layout.entity_paths {
        mappings.extend(entity::map_all(&dir.join(rel)));
    }

    let query_columns: Vec<_> = layout
        .repository_paths
        .iter()
        .flat_map(|rel| query::extract_all(&dir.join(rel), &mappings))
        .collect();

    let indexed_columns: Vec<_> = layout
        .changelog_paths
        .iter()
        .flat_map(|rel| changelog::extract(&dir.join(rel)))
        .collect();

    debug!(
        module = %module.name,
        entities = mappings.len(),
        query_columns = query_columns.len(),
        indexed_columns = indexed_columns.len(),
        "module scanned"
    );

    let missing = compare(&module.name, &query_columns, &indexed_columns, exclusions);
    info!(module = %module.name, missing = missing.len(), "module analyzed");
    missing
}

/// Analyze modules in order and merge the findings, ordered by service,
/// table and column.
pub fn analyze_modules(
    modules: &[ModuleSource],
    layout: &ModuleLayout,
    exclusions: &Exclusions,
) -> Vec<MissingIndex> {
    merge(
        modules
            .iter()
            .map(|module| analyze_module(module, layout, exclusions)),
    )
}

/// Merge per-module findings into one list ordered by service, table and
/// column.
pub fn merge(results: impl IntoIterator<Item = Vec<MissingIndex>>) -> Vec<MissingIndex> {
    let mut merged: Vec<MissingIndex> = results.into_iter().flatten().collect();
    merged.sort_by_cached_key(MissingIndex::key);
    merged
}
