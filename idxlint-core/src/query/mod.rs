//! Repository query extraction.
//!
//! A repository is an interface (or class) extending some `*Repository<E, ID>`
//! base type; `E` decides which entity mapping resolves its fields. Every
//! method declared in the repository body is classified by its annotations:
//!
//! - `@Query(nativeQuery = true)` and `@NativeQuery` hold native SQL
//! - any other `@Query` holds JPQL
//! - without a query annotation the method name is a derived query
//!
//! A comment of the form `// idxlint:ignore` or
//! `// idxlint:ignore("col_a", "col_b")` suppresses all or some columns of the
//! next method declared after it.

pub mod derived;
pub mod jpql;
pub mod native;

use std::collections::{BTreeMap, HashSet};
use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

use regex_lite::Regex;
use tracing::debug;

use crate::lexer::annotation::{Annotation, leading_annotations};
use crate::lexer::code::{
    SourceLine, code_text, line_of, mask_strings, matching_close, split_lines,
};
use crate::model::{QueryColumn, QueryType, TableMapping};
use crate::source::{SOURCE_EXTENSIONS, find_files, read_source};

pub use derived::{DerivedQuery, QueryIntent, parse_method_name};

static REPOSITORY_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:interface|class)\s+([A-Za-z_]\w*)").expect("valid regex")
});
static REPOSITORY_BASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\w*Repository\s*<\s*([A-Za-z_][\w.]*)").expect("valid regex")
});
static METHOD_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z_]\w*)\s*$").expect("valid regex"));
static IGNORE_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"idxlint:ignore\b(?:\s*\(([^)]*)\))?").expect("valid regex")
});
static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]*)""#).expect("valid regex"));

/// Modifiers that may precede a method declaration.
const METHOD_MODIFIERS: &[&str] = &[
    "public",
    "protected",
    "private",
    "internal",
    "abstract",
    "default",
    "override",
    "open",
    "final",
    "suspend",
    "static",
    "synchronized",
];

/// A member declared at the top level of a repository body.
#[derive(Debug, Clone)]
struct Member {
    /// Method name; `None` for properties, nested types and other members.
    name: Option<String>,
    line: usize,
    annotations: Vec<Annotation>,
}

/// A suppression comment.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Suppression {
    line: usize,
    /// Lower-cased columns; empty suppresses every column.
    columns: Vec<String>,
}

impl Suppression {
    fn covers(&self, column: &str) -> bool {
        self.columns.is_empty() || self.columns.contains(&column.to_lowercase())
    }
}

/// Extract query columns from one repository source text.
///
/// Returns nothing when the text declares no repository, or when its entity
/// has no mapping.
pub fn extract_source(
    path: &Path,
    text: &str,
    mappings: &BTreeMap<String, TableMapping>,
) -> Vec<QueryColumn> {
    let lines = split_lines(text);
    let code = code_text(&lines);
    let masked = mask_strings(&code);

    let Some(decl) = REPOSITORY_DECL.captures(&masked) else {
        return Vec::new();
    };
    let (Some(decl_match), Some(name)) = (decl.get(0), decl.get(1)) else {
        return Vec::new();
    };
    let repository = name.as_str().to_string();

    let Some(open) = masked[decl_match.end()..]
        .find('{')
        .map(|pos| decl_match.end() + pos)
    else {
        return Vec::new();
    };
    let header = &masked[decl_match.end()..open];
    let Some(entity) = REPOSITORY_BASE
        .captures(header)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().rsplit('.').next().unwrap_or(m.as_str()).to_string())
    else {
        return Vec::new();
    };
    let Some(mapping) = mappings.get(&entity) else {
        debug!(file = %path.display(), entity = %entity, "repository entity has no mapping");
        return Vec::new();
    };
    let close = matching_close(&masked, open).unwrap_or(masked.len());

    let members = collect_members(&code, &masked, open + 1..close);
    let mut suppressions = suppressions(&lines);

    let mut out = Vec::new();
    for member in members {
        let suppression = take_suppression(&mut suppressions, member.line);
        let Some(name) = &member.name else {
            continue;
        };
        let source = format!("{}.{}", repository, name);

        let mut seen = HashSet::new();
        for (table, column, query_type) in method_columns(name, &member, mapping, mappings) {
            if suppression.as_ref().is_some_and(|s| s.covers(&column)) {
                continue;
            }
            if !seen.insert((table.to_lowercase(), column.to_lowercase())) {
                continue;
            }
            out.push(QueryColumn {
                table_name: table,
                column_name: column,
                source: source.clone(),
                file_path: path.to_path_buf(),
                line_number: member.line,
                query_type,
            });
        }
    }
    out
}

/// Extract query columns from one repository file.
pub fn extract_file(path: &Path, mappings: &BTreeMap<String, TableMapping>) -> Vec<QueryColumn> {
    let Some(text) = read_source(path) else {
        return Vec::new();
    };
    let columns = extract_source(path, &text, mappings);
    if !columns.is_empty() {
        debug!(file = %path.display(), columns = columns.len(), "extracted query columns");
    }
    columns
}

/// Extract query columns from every repository under `dir`.
pub fn extract_all(dir: &Path, mappings: &BTreeMap<String, TableMapping>) -> Vec<QueryColumn> {
    find_files(dir, SOURCE_EXTENSIONS)
        .iter()
        .flat_map(|path| extract_file(path, mappings))
        .collect()
}

/// Columns one method refers to, in order of appearance.
fn method_columns(
    name: &str,
    method: &Member,
    mapping: &TableMapping,
    mappings: &BTreeMap<String, TableMapping>,
) -> Vec<(String, String, QueryType)> {
    let query = method
        .annotations
        .iter()
        .find(|a| a.is("Query") || a.is("NativeQuery"));

    let Some(query) = query else {
        let Some(derived) =
            parse_method_name(name, |field| mapping.column(field).is_some())
        else {
            return Vec::new();
        };
        return derived
            .properties
            .iter()
            .map(|field| {
                (
                    mapping.table_name.clone(),
                    mapping.resolve(field),
                    QueryType::DerivedQuery,
                )
            })
            .collect();
    };

    let Some(text) = query.value() else {
        return Vec::new();
    };
    if query.is("NativeQuery") || query.flag("nativeQuery") {
        native::columns(&text, &mapping.table_name)
            .into_iter()
            .map(|c| (c.table, c.column, QueryType::NativeSql))
            .collect()
    } else {
        jpql::columns(&text, mappings)
            .into_iter()
            .map(|c| (c.table, c.column, QueryType::Jpql))
            .collect()
    }
}

/// Walk the top level of a repository body and collect its members.
///
/// Members end at `;`, at a line break outside brackets, or where a body
/// opens. A line holding only a type runs on into the next line, so Java
/// return types may sit above the method name. Annotation-only members carry
/// over to the next member.
fn collect_members(code: &str, masked: &str, body: Range<usize>) -> Vec<Member> {
    let bytes = masked.as_bytes();
    let mut members = Vec::new();
    let mut pending: Vec<Annotation> = Vec::new();
    let mut depth = 0usize;
    let mut start = body.start;
    let mut i = body.start;

    let mut finish = |segment: Range<usize>, pending: &mut Vec<Annotation>| {
        if masked[segment.clone()].trim().is_empty() {
            return;
        }
        let (annotations, rest) =
            leading_annotations(&code[segment.clone()], &masked[segment.clone()]);
        pending.extend(annotations);
        let decl = segment.start + rest..segment.end;
        if masked[decl.clone()].trim().is_empty() {
            return;
        }
        match method_name(masked, decl.clone()) {
            Some((name, offset)) => members.push(Member {
                name: Some(name),
                line: line_of(code, offset),
                annotations: std::mem::take(pending),
            }),
            None => {
                let text = &masked[decl.clone()];
                let offset = decl.start + (text.len() - text.trim_start().len());
                members.push(Member {
                    name: None,
                    line: line_of(code, offset),
                    annotations: Vec::new(),
                });
                pending.clear();
            }
        }
    };

    while i < body.end {
        match bytes[i] {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            b'{' if depth == 0 => {
                finish(start..i, &mut pending);
                pending.clear();
                i = matching_close(masked, i).unwrap_or(body.end) + 1;
                start = i;
                continue;
            }
            b'\n' if depth == 0 && continues_declaration(&masked[start..i]) => {}
            b';' | b'\n' if depth == 0 => {
                finish(start..i, &mut pending);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if start < body.end {
        finish(start..body.end, &mut pending);
    }

    members
}

/// Whether a member cut at a line break is only the leading part of a
/// declaration, such as a Java return type on its own line.
fn continues_declaration(segment: &str) -> bool {
    let text = segment.trim();
    if text.is_empty() || text.contains(['(', ':', '=', ';']) {
        return false;
    }
    !text.split_whitespace().next().is_some_and(|word| {
        matches!(
            word,
            "val" | "var" | "fun" | "class" | "interface" | "object" | "companion" | "enum"
        )
    })
}

/// Name and offset of the method declared in `decl`, if it declares one.
fn method_name(masked: &str, decl: Range<usize>) -> Option<(String, usize)> {
    let text = &masked[decl.clone()];
    let paren = text.find('(')?;
    let head = &text[..paren];
    if head.contains('=') {
        return None;
    }

    let mut words = head.split_whitespace().peekable();
    while words
        .peek()
        .is_some_and(|w| METHOD_MODIFIERS.contains(w))
    {
        words.next();
    }
    let first = words.next()?;
    if matches!(first, "val" | "var" | "class" | "interface" | "object" | "companion") {
        return None;
    }

    let caps = METHOD_NAME.captures(head)?;
    let name = caps.get(1)?;
    // Kotlin needs `fun`, Java a return type in front of the name.
    if head[..name.start()].trim().is_empty() {
        return None;
    }
    let name_str = name.as_str();
    if METHOD_MODIFIERS.contains(&name_str) || name_str == "fun" {
        return None;
    }
    Some((name_str.to_string(), decl.start + name.start()))
}

/// Suppression comments in source order.
fn suppressions(lines: &[SourceLine]) -> Vec<Suppression> {
    lines
        .iter()
        .filter_map(|line| {
            let caps = IGNORE_DIRECTIVE.captures(&line.comment)?;
            let columns = caps
                .get(1)
                .map(|args| {
                    QUOTED
                        .captures_iter(args.as_str())
                        .filter_map(|c| c.get(1))
                        .map(|m| m.as_str().trim().to_lowercase())
                        .filter(|c| !c.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            Some(Suppression {
                line: line.number,
                columns,
            })
        })
        .collect()
}

/// Consume the suppressions written before (or on) the line of a method.
///
/// Several directives in front of one method combine; one without
/// arguments suppresses everything.
fn take_suppression(pending: &mut Vec<Suppression>, line: usize) -> Option<Suppression> {
    let split = pending.partition_point(|s| s.line <= line);
    if split == 0 {
        return None;
    }
    let taken: Vec<Suppression> = pending.drain(..split).collect();
    let all = taken.iter().any(|s| s.columns.is_empty());
    Some(Suppression {
        line,
        columns: if all {
            Vec::new()
        } else {
            taken.into_iter().flat_map(|s| s.columns).collect()
        },
    })
}
