//! XML changelogs.
//!
//! The document is read into a small element tree first, so that the
//! change handlers can look at attributes and child elements together.
//! Namespace prefixes are ignored.

use std::fmt::Display;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::warn;

use super::{IndexDef, Reference, Scanned, clean_name, generated_name, single_unique, sql};
use crate::model::IndexedColumn;

/// An XML element with its attributes, children and text content.
#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn flag(&self, key: &str) -> bool {
        self.attr(key)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }
}

/// Index definitions and references of an XML changelog. Malformed
/// documents are logged and yield `None`.
///
/// `rollback` elements are skipped. Text inside any other element is
/// searched for raw `CREATE INDEX` and constraint statements.
pub fn scan(path: &Path, text: &str) -> Option<Scanned> {
    let root = match parse_tree(text) {
        Ok(Some(root)) if root.name == "databaseChangeLog" => root,
        Ok(_) => {
            warn!(file = %path.display(), "not a changelog: no databaseChangeLog");
            return None;
        }
        Err(error) => {
            warn!(file = %path.display(), error = %error, "malformed changelog");
            return None;
        }
    };

    let mut scanned = Scanned::default();
    walk(&root, path, &mut scanned);
    Some(scanned)
}

fn parse_tree(text: &str) -> Result<Option<Element>, String> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);
    let mut open: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event().map_err(describe)? {
            Event::Start(e) => open.push(element(&e)?),
            Event::Empty(e) => close(&mut open, &mut root, element(&e)?),
            Event::End(_) => {
                if let Some(done) = open.pop() {
                    close(&mut open, &mut root, done);
                }
            }
            Event::Text(t) => {
                if let Some(current) = open.last_mut() {
                    current.text.push_str(&t.unescape().map_err(describe)?);
                }
            }
            Event::CData(c) => {
                if let Some(current) = open.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(format!("unclosed element <{}>", unclosed.name));
    }
    Ok(root)
}

fn element(start: &BytesStart<'_>) -> Result<Element, String> {
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(describe)?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value().map_err(describe)?.into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        attributes,
        ..Element::default()
    })
}

/// Attach a finished element to its parent, or make it the root.
fn close(open: &mut [Element], root: &mut Option<Element>, done: Element) {
    match open.last_mut() {
        Some(parent) => parent.children.push(done),
        None => *root = Some(done),
    }
}

fn describe(err: impl Display) -> String {
    err.to_string()
}

fn walk(element: &Element, path: &Path, out: &mut Scanned) {
    match element.name.as_str() {
        "rollback" => return,
        "createIndex" => out.columns.extend(create_index(element, path)),
        "addUniqueConstraint" => out.columns.extend(add_key(element, path, false)),
        "addPrimaryKey" => out.columns.extend(add_key(element, path, true)),
        "createTable" => out.columns.extend(create_table(element, path)),
        "addColumn" => out.columns.extend(add_column(element, path)),
        "include" => {
            if let Some(file) = element.attr("file") {
                out.references.push(Reference::Include {
                    file: file.to_string(),
                    relative: element.flag("relativeToChangelogFile"),
                });
            }
        }
        "includeAll" => {
            if let Some(dir) = element.attr("path") {
                out.references.push(Reference::IncludeAll {
                    path: dir.to_string(),
                    relative: element.flag("relativeToChangelogFile"),
                });
            }
        }
        "sqlFile" => {
            if let Some(file) = element.attr("path") {
                out.references.push(Reference::SqlFile {
                    path: file.to_string(),
                    relative: element.flag("relativeToChangelogFile"),
                });
            }
        }
        _ => {}
    }

    if !element.text.is_empty() {
        out.columns.extend(sql::scan(&element.text, path));
    }
    for child in &element.children {
        walk(child, path, out);
    }
}

fn create_index(change: &Element, path: &Path) -> Vec<IndexedColumn> {
    let Some(table) = change.attr("tableName") else {
        return Vec::new();
    };
    let columns = change
        .children_named("column")
        .map(|column| column.attr("name").map(clean_name))
        .collect::<Vec<_>>();
    let name = change
        .attr("indexName")
        .map(str::to_string)
        .unwrap_or_else(|| generated_name(table, &columns, "idx"));

    IndexDef {
        name,
        table: clean_name(table),
        columns,
        unique: change.flag("unique"),
        partial: false,
    }
    .into_columns(path)
}

fn add_key(change: &Element, path: &Path, primary: bool) -> Vec<IndexedColumn> {
    let (Some(table), Some(names)) = (change.attr("tableName"), change.attr("columnNames")) else {
        return Vec::new();
    };
    let columns = names
        .split(',')
        .map(clean_name)
        .map(|c| (!c.is_empty()).then_some(c))
        .collect::<Vec<_>>();
    let name = change
        .attr("constraintName")
        .map(str::to_string)
        .unwrap_or_else(|| {
            if primary {
                format!("{}_pkey", clean_name(table))
            } else {
                generated_name(table, &columns, "key")
            }
        });

    IndexDef {
        name,
        table: clean_name(table),
        columns,
        unique: true,
        partial: false,
    }
    .into_columns(path)
}

fn create_table(change: &Element, path: &Path) -> Vec<IndexedColumn> {
    let Some(table) = change.attr("tableName").map(clean_name) else {
        return Vec::new();
    };
    let mut out = Vec::new();

    for column in change.children_named("column") {
        let Some(name) = column.attr("name").map(clean_name) else {
            continue;
        };
        let Some(constraints) = column.children_named("constraints").next() else {
            continue;
        };
        let index_name = if constraints.flag("primaryKey") {
            constraints
                .attr("primaryKeyName")
                .map(str::to_string)
                .unwrap_or_else(|| format!("{table}_pkey"))
        } else if constraints.flag("unique") {
            constraints
                .attr("uniqueConstraintName")
                .map(str::to_string)
                .unwrap_or_else(|| format!("{table}_{name}_key"))
        } else {
            continue;
        };
        out.extend(single_unique(&table, name, index_name, path));
    }
    out
}

fn add_column(change: &Element, path: &Path) -> Vec<IndexedColumn> {
    let Some(table) = change.attr("tableName").map(clean_name) else {
        return Vec::new();
    };
    let mut out = Vec::new();

    for column in change.children_named("column") {
        let Some(name) = column.attr("name").map(clean_name) else {
            continue;
        };
        let Some(constraints) = column
            .children_named("constraints")
            .find(|c| c.flag("unique"))
        else {
            continue;
        };
        let index_name = constraints
            .attr("uniqueConstraintName")
            .map(str::to_string)
            .unwrap_or_else(|| format!("{table}_{name}_key"));
        out.extend(single_unique(&table, name, index_name, path));
    }
    out
}
