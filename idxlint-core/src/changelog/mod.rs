//! Index definitions from Liquibase changelogs.
//!
//! Changelogs are YAML, JSON, XML or formatted SQL. Starting at a master
//! changelog the walker follows `include`, `includeAll` and `sqlFile`
//! references depth first. Every file is read at most once:
//! the visited set is keyed by canonical path, so repeated includes and
//! include cycles are harmless.
//!
//! A file that is missing, unreadable or malformed is logged and skipped;
//! it never stops the walk.

pub mod sql;
pub mod xml;
pub mod yaml;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::model::IndexedColumn;
use crate::source::{find_files, has_extension, read_source};

/// Master changelog names looked up in a changelog directory, in order.
pub const MASTER_CHANGELOGS: &[&str] = &[
    "db.changelog-master.yaml",
    "db.changelog-master.yml",
    "db.changelog-master.xml",
];

/// Extensions picked up by `includeAll`.
pub const CHANGELOG_EXTENSIONS: &[&str] = &["yaml", "yml", "json", "xml", "sql"];

/// An index, unique constraint or primary key as declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub name: String,
    pub table: String,
    /// Indexed columns in order; `None` for expressions, which still take a
    /// position.
    pub columns: Vec<Option<String>>,
    pub unique: bool,
    pub partial: bool,
}

impl IndexDef {
    /// One [`IndexedColumn`] per named column.
    pub fn into_columns(self, path: &Path) -> Vec<IndexedColumn> {
        let IndexDef {
            name,
            table,
            columns,
            unique,
            partial,
        } = self;
        columns
            .into_iter()
            .enumerate()
            .filter_map(|(position, column)| {
                Some(IndexedColumn {
                    table_name: table.clone(),
                    column_name: column?,
                    index_name: name.clone(),
                    file_path: path.to_path_buf(),
                    is_unique: unique,
                    is_partial: partial,
                    composite_position: position,
                })
            })
            .collect()
    }
}

/// What one changelog document declares.
#[derive(Debug, Default)]
pub struct Scanned {
    pub columns: Vec<IndexedColumn>,
    pub references: Vec<Reference>,
}

/// A reference from one changelog to other files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// `include: { file }`
    Include { file: String, relative: bool },
    /// `includeAll: { path }`
    IncludeAll { path: String, relative: bool },
    /// `sqlFile: { path }`
    SqlFile { path: String, relative: bool },
}

/// The master changelog for `path`: the path itself if it is a file, or
/// the first master changelog inside it if it is a directory.
pub fn resolve_root(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    if path.is_dir() {
        return MASTER_CHANGELOGS
            .iter()
            .map(|name| path.join(name))
            .find(|candidate| candidate.is_file());
    }
    None
}

/// Every indexed column reachable from `changelog_root`.
pub fn extract(changelog_root: &Path) -> Vec<IndexedColumn> {
    let Some(root) = resolve_root(changelog_root) else {
        debug!(path = %changelog_root.display(), "no changelog found");
        return Vec::new();
    };
    let root_dir = root
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut walker = Walker {
        root_dir,
        visited: HashSet::new(),
        columns: Vec::new(),
    };
    walker.visit(&root);
    walker.columns
}

struct Walker {
    root_dir: PathBuf,
    visited: HashSet<PathBuf>,
    columns: Vec<IndexedColumn>,
}

impl Walker {
    fn visit(&mut self, path: &Path) {
        let canonical = match path.canonicalize() {
            Ok(canonical) => canonical,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "changelog not found");
                return;
            }
        };
        if !self.visited.insert(canonical) {
            debug!(path = %path.display(), "changelog already visited");
            return;
        }
        let Some(text) = read_source(path) else {
            return;
        };

        let before = self.columns.len();
        if has_extension(path, &["sql"]) {
            self.columns.extend(sql::scan(&text, path));
        } else {
            let scanned = if has_extension(path, &["xml"]) {
                xml::scan(path, &text)
            } else {
                yaml::parse(path, &text).map(|document| yaml::scan(&document, path))
            };
            let Some(scanned) = scanned else {
                return;
            };
            self.columns.extend(scanned.columns);
            for reference in scanned.references {
                self.follow(path, &reference);
            }
        }
        debug!(
            path = %path.display(),
            columns = self.columns.len() - before,
            "scanned changelog"
        );
    }

    fn follow(&mut self, from: &Path, reference: &Reference) {
        match reference {
            Reference::Include { file, relative } | Reference::SqlFile { path: file, relative } => {
                match self.resolve(from, file, *relative, Path::is_file) {
                    Some(target) => self.visit(&target),
                    None => warn!(from = %from.display(), file = %file, "included changelog not found"),
                }
            }
            Reference::IncludeAll { path, relative } => {
                let Some(dir) = self.resolve(from, path, *relative, Path::is_dir) else {
                    warn!(from = %from.display(), path = %path, "includeAll directory not found");
                    return;
                };
                for file in find_files(&dir, CHANGELOG_EXTENSIONS) {
                    self.visit(&file);
                }
            }
        }
    }

    /// Resolve a referenced path. Relative references start at the
    /// including file; others are tried against the root changelog directory
    /// and its ancestors, like classpath entries, then the including file.
    fn resolve(
        &self,
        from: &Path,
        reference: &str,
        relative: bool,
        exists: fn(&Path) -> bool,
    ) -> Option<PathBuf> {
        let reference = reference.trim();
        let reference = reference.strip_prefix("classpath:").unwrap_or(reference);
        let literal = Path::new(reference);
        if literal.is_absolute() && exists(literal) {
            return Some(literal.to_path_buf());
        }

        let reference = reference.trim_start_matches('/');
        let from_dir = from.parent().unwrap_or_else(|| Path::new("."));
        if relative {
            let candidate = from_dir.join(reference);
            return exists(&candidate).then_some(candidate);
        }

        self.root_dir
            .ancestors()
            .map(|dir| dir.join(reference))
            .chain(std::iter::once(from_dir.join(reference)))
            .find(|candidate| exists(candidate))
    }
}

/// Strip identifier quoting from a table or column name.
pub(crate) fn clean_name(name: &str) -> String {
    name.trim().trim_matches(['`', '"', '[', ']']).to_string()
}

/// Name Postgres gives an unnamed index or constraint.
pub(crate) fn generated_name(table: &str, columns: &[Option<String>], suffix: &str) -> String {
    let mut parts = vec![clean_name(table)];
    parts.extend(columns.iter().flatten().cloned());
    parts.push(suffix.to_string());
    parts.join("_")
}

/// A one-column unique index, as declared by a column constraint.
pub(crate) fn single_unique(
    table: &str,
    column: String,
    name: String,
    path: &Path,
) -> Vec<IndexedColumn> {
    IndexDef {
        name,
        table: table.to_string(),
        columns: vec![Some(column)],
        unique: true,
        partial: false,
    }
    .into_columns(path)
}
