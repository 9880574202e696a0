//! CLI command implementations.

pub mod baseline;
pub mod check;
pub mod version;

use std::path::{Component, Path};
use std::sync::Arc;

use idxlint_core::scan::{self, ModuleLayout, ModuleSource};
use idxlint_core::{Exclusions, MissingIndex};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{CliError, CliResult};

/// Resolve the modules to scan under `root`.
///
/// Configured modules are taken as given and named by their directory name,
/// or by their configured path when two share a directory name. Otherwise the root itself is a
/// module when it matches the layout, followed by each immediate
/// subdirectory that does, in name order.
pub fn discover_modules(root: &Path, config: &Config) -> CliResult<Vec<ModuleSource>> {
    if !root.is_dir() {
        return Err(CliError::Config(format!(
            "project root is not a directory: {}",
            root.display()
        )));
    }

    if !config.scan.modules.is_empty() {
        let directories: Vec<_> = config.scan.modules.iter().map(|rel| root.join(rel)).collect();
        let names: Vec<_> = directories.iter().map(|dir| module_name(dir)).collect();
        return Ok(config
            .scan
            .modules
            .iter()
            .zip(directories)
            .zip(&names)
            .map(|((rel, directory), name)| {
                let shared = names.iter().filter(|other| *other == name).count() > 1;
                let name = if shared { path_name(rel) } else { name.clone() };
                ModuleSource::new(name, directory)
            })
            .collect());
    }

    let mut modules = Vec::new();
    if config.layout.matches(root) {
        modules.push(ModuleSource::new(module_name(root), root));
    }

    let mut children: Vec<_> = std::fs::read_dir(root)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !n.starts_with('.'))
        })
        .collect();
    children.sort();

    modules.extend(
        children
            .into_iter()
            .filter(|dir| config.layout.matches(dir))
            .map(|dir| ModuleSource::new(module_name(&dir), dir)),
    );

    debug!(root = %root.display(), modules = modules.len(), "discovered modules");
    Ok(modules)
}

/// Name of a module: its directory name.
fn module_name(dir: &Path) -> String {
    let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    canonical
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("root")
        .to_string()
}

/// A configured module path as a `/`-separated name.
fn path_name(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Analyze modules on the blocking pool, one task per module, and merge
/// the findings.
pub async fn analyze(
    modules: Vec<ModuleSource>,
    layout: ModuleLayout,
    exclusions: Exclusions,
) -> CliResult<Vec<MissingIndex>> {
    let layout = Arc::new(layout);
    let exclusions = Arc::new(exclusions);

    let mut tasks = JoinSet::new();
    for (position, module) in modules.into_iter().enumerate() {
        let layout = Arc::clone(&layout);
        let exclusions = Arc::clone(&exclusions);
        tasks.spawn_blocking(move || {
            (
                position,
                scan::analyze_module(&module, &layout, &exclusions),
            )
        });
    }

    let mut results = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        let result =
            joined.map_err(|e| CliError::Command(format!("analysis task failed: {e}")))?;
        results.push(result);
    }
    results.sort_by_key(|(position, _)| *position);

    let missing = scan::merge(results.into_iter().map(|(_, found)| found));
    info!(missing = missing.len(), "analysis complete");
    Ok(missing)
}

/// Discover and analyze the modules of a project. Returns the module count
/// alongside the findings.
pub async fn analyze_project(
    root: &Path,
    config: &Config,
) -> CliResult<(usize, Vec<MissingIndex>)> {
    let modules = discover_modules(root, config)?;
    let count = modules.len();
    let missing = analyze(modules, config.layout.clone(), config.exclusions()).await?;
    Ok((count, missing))
}
