//! YAML and JSON changelogs.

use std::path::Path;

use serde_yaml::Value;
use tracing::warn;

use super::{IndexDef, Reference, Scanned, clean_name, generated_name, single_unique, sql};
use crate::model::IndexedColumn;
use crate::source::has_extension;

/// Parse a YAML or JSON changelog. Malformed documents are logged and
/// yield `None`.
pub fn parse(path: &Path, text: &str) -> Option<Value> {
    let parsed = if has_extension(path, &["json"]) {
        serde_json::from_str::<serde_json::Value>(text)
            .map_err(|e| e.to_string())
            .and_then(|json| serde_yaml::to_value(json).map_err(|e| e.to_string()))
    } else {
        serde_yaml::from_str::<Value>(text).map_err(|e| e.to_string())
    };

    match parsed {
        Ok(document) if document.get("databaseChangeLog").is_some() => Some(document),
        Ok(_) => {
            warn!(file = %path.display(), "not a changelog: no databaseChangeLog");
            None
        }
        Err(error) => {
            warn!(file = %path.display(), error = %error, "malformed changelog");
            None
        }
    }
}

/// Collect index definitions and references of a parsed changelog.
///
/// `rollback` blocks are skipped entirely. Any other string in the document
/// is searched for raw `CREATE INDEX` and constraint statements.
pub fn scan(document: &Value, path: &Path) -> Scanned {
    let mut scanned = Scanned::default();
    if let Some(log) = document.get("databaseChangeLog") {
        walk(log, path, &mut scanned);
    }
    scanned
}

fn walk(value: &Value, path: &Path, out: &mut Scanned) {
    match value {
        Value::Mapping(map) => {
            for (key, child) in map {
                let Some(key) = key.as_str() else {
                    walk(child, path, out);
                    continue;
                };
                match key {
                    "rollback" => continue,
                    "createIndex" => out.columns.extend(create_index(child, path)),
                    "addUniqueConstraint" => out.columns.extend(add_key(child, path, false)),
                    "addPrimaryKey" => out.columns.extend(add_key(child, path, true)),
                    "createTable" => out.columns.extend(create_table(child, path)),
                    "addColumn" => out.columns.extend(add_column(child, path)),
                    "include" => {
                        if let Some(file) = child.get("file").and_then(scalar) {
                            out.references.push(Reference::Include {
                                file,
                                relative: flag(child, "relativeToChangelogFile"),
                            });
                        }
                    }
                    "includeAll" => {
                        if let Some(dir) = child.get("path").and_then(scalar) {
                            out.references.push(Reference::IncludeAll {
                                path: dir,
                                relative: flag(child, "relativeToChangelogFile"),
                            });
                        }
                    }
                    "sqlFile" => {
                        if let Some(file) = child.get("path").and_then(scalar) {
                            out.references.push(Reference::SqlFile {
                                path: file,
                                relative: flag(child, "relativeToChangelogFile"),
                            });
                        }
                    }
                    _ => {}
                }
                walk(child, path, out);
            }
        }
        Value::Sequence(items) => {
            for item in items {
                walk(item, path, out);
            }
        }
        Value::Tagged(tagged) => walk(&tagged.value, path, out),
        Value::String(text) => out.columns.extend(sql::scan(text, path)),
        _ => {}
    }
}

fn create_index(change: &Value, path: &Path) -> Vec<IndexedColumn> {
    let Some(table) = change.get("tableName").and_then(scalar) else {
        return Vec::new();
    };
    let columns = column_entries(change)
        .iter()
        .map(|column| column.get("name").and_then(scalar).map(|n| clean_name(&n)))
        .collect::<Vec<_>>();
    let name = change
        .get("indexName")
        .and_then(scalar)
        .unwrap_or_else(|| generated_name(&table, &columns, "idx"));

    IndexDef {
        name,
        table: clean_name(&table),
        columns,
        unique: flag(change, "unique"),
        partial: false,
    }
    .into_columns(path)
}

/// `addUniqueConstraint` or `addPrimaryKey` over a `columnNames` list.
fn add_key(change: &Value, path: &Path, primary: bool) -> Vec<IndexedColumn> {
    let (Some(table), Some(names)) = (
        change.get("tableName").and_then(scalar),
        change.get("columnNames").and_then(scalar),
    ) else {
        return Vec::new();
    };
    let columns = names
        .split(',')
        .map(clean_name)
        .map(|c| (!c.is_empty()).then_some(c))
        .collect::<Vec<_>>();
    let name = change
        .get("constraintName")
        .and_then(scalar)
        .unwrap_or_else(|| {
            if primary {
                format!("{}_pkey", clean_name(&table))
            } else {
                generated_name(&table, &columns, "key")
            }
        });

    IndexDef {
        name,
        table: clean_name(&table),
        columns,
        unique: true,
        partial: false,
    }
    .into_columns(path)
}

/// Primary key and unique columns of a new table. A column that is both
/// yields a single primary key entry.
fn create_table(change: &Value, path: &Path) -> Vec<IndexedColumn> {
    let Some(table) = change.get("tableName").and_then(scalar) else {
        return Vec::new();
    };
    let table = clean_name(&table);
    let mut out = Vec::new();

    for column in column_entries(change) {
        let Some(name) = column.get("name").and_then(scalar).map(|n| clean_name(&n)) else {
            continue;
        };
        let Some(constraints) = column.get("constraints") else {
            continue;
        };
        let index_name = if flag(constraints, "primaryKey") {
            constraints
                .get("primaryKeyName")
                .and_then(scalar)
                .unwrap_or_else(|| format!("{table}_pkey"))
        } else if flag(constraints, "unique") {
            constraints
                .get("uniqueConstraintName")
                .and_then(scalar)
                .unwrap_or_else(|| format!("{table}_{name}_key"))
        } else {
            continue;
        };
        out.extend(single_unique(&table, name, index_name, path));
    }
    out
}

fn add_column(change: &Value, path: &Path) -> Vec<IndexedColumn> {
    let Some(table) = change.get("tableName").and_then(scalar) else {
        return Vec::new();
    };
    let table = clean_name(&table);
    let mut out = Vec::new();

    for column in column_entries(change) {
        let Some(name) = column.get("name").and_then(scalar).map(|n| clean_name(&n)) else {
            continue;
        };
        let Some(constraints) = column.get("constraints") else {
            continue;
        };
        if !flag(constraints, "unique") {
            continue;
        }
        let index_name = constraints
            .get("uniqueConstraintName")
            .and_then(scalar)
            .unwrap_or_else(|| format!("{table}_{name}_key"));
        out.extend(single_unique(&table, name, index_name, path));
    }
    out
}

/// The `column` bodies of a change's `columns` list.
fn column_entries(change: &Value) -> Vec<&Value> {
    change
        .get("columns")
        .and_then(Value::as_sequence)
        .map(|items| {
            items
                .iter()
                .map(|item| item.get("column").unwrap_or(item))
                .collect()
        })
        .unwrap_or_default()
}

/// A scalar as text; numbers and booleans are accepted as written.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Whether `key` is `true` or `"true"`.
fn flag(value: &Value, key: &str) -> bool {
    match value.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scan_text(text: &str) -> Scanned {
        let path = Path::new("changelog.yaml");
        let document = parse(path, text).unwrap();
        scan(&document, path)
    }

    fn entry(c: &IndexedColumn) -> (String, String, String, bool, usize) {
        (
            c.table_name.clone(),
            c.column_name.clone(),
            c.index_name.clone(),
            c.is_unique,
            c.composite_position,
        )
    }

    fn expected(
        table: &str,
        column: &str,
        index: &str,
        unique: bool,
        position: usize,
    ) -> (String, String, String, bool, usize) {
        (
            table.to_string(),
            column.to_string(),
            index.to_string(),
            unique,
            position,
        )
    }

    #[test]
    fn test_create_index_composite() {
        let scanned = scan_text(
            r#"databaseChangeLog:
  - changeSet:
      id: 1
      author: dev
      changes:
        - createIndex:
            indexName: idx_orders_user_status
            tableName: orders
            unique: "true"
            columns:
              - column:
                  name: user_id
              - column:
                  name: status
"#,
        );
        assert_eq!(
            scanned.columns.iter().map(entry).collect::<Vec<_>>(),
            vec![
                expected("orders", "user_id", "idx_orders_user_status", true, 0),
                expected("orders", "status", "idx_orders_user_status", true, 1),
            ]
        );
    }

    #[test]
    fn test_create_table_primary_key_subsumes_unique() {
        let scanned = scan_text(
            r#"databaseChangeLog:
  - changeSet:
      id: 1
      author: dev
      changes:
        - createTable:
            tableName: users
            columns:
              - column:
                  name: id
                  type: bigint
                  constraints:
                    primaryKey: true
                    unique: true
              - column:
                  name: email
                  type: varchar(255)
                  constraints:
                    unique: true
                    uniqueConstraintName: uq_users_email
              - column:
                  name: name
                  type: varchar(255)
"#,
        );
        assert_eq!(
            scanned.columns.iter().map(entry).collect::<Vec<_>>(),
            vec![
                expected("users", "id", "users_pkey", true, 0),
                expected("users", "email", "uq_users_email", true, 0),
            ]
        );
    }

    #[test]
    fn test_add_column_unique() {
        let scanned = scan_text(
            r#"databaseChangeLog:
  - changeSet:
      id: 2
      author: dev
      changes:
        - addColumn:
            tableName: users
            columns:
              - column:
                  name: external_ref
                  constraints:
                    unique: true
              - column:
                  name: note
"#,
        );
        assert_eq!(
            scanned.columns.iter().map(entry).collect::<Vec<_>>(),
            vec![expected("users", "external_ref", "users_external_ref_key", true, 0)]
        );
    }

    #[test]
    fn test_add_key_constraints() {
        let scanned = scan_text(
            r#"databaseChangeLog:
  - changeSet:
      id: 3
      author: dev
      changes:
        - addUniqueConstraint:
            tableName: memberships
            columnNames: team_id, user_id
        - addPrimaryKey:
            tableName: memberships
            columnNames: id
"#,
        );
        assert_eq!(
            scanned.columns.iter().map(entry).collect::<Vec<_>>(),
            vec![
                expected("memberships", "team_id", "memberships_team_id_user_id_key", true, 0),
                expected("memberships", "user_id", "memberships_team_id_user_id_key", true, 1),
                expected("memberships", "id", "memberships_pkey", true, 0),
            ]
        );
    }

    #[test]
    fn test_raw_sql_outside_rollback() {
        let scanned = scan_text(
            r#"databaseChangeLog:
  - changeSet:
      id: 3
      author: dev
      changes:
        - sql:
            sql: CREATE INDEX CONCURRENTLY idx_users_created ON users (created_at DESC)
      rollback:
        - sql:
            sql: CREATE INDEX idx_old ON users (legacy)
"#,
        );
        assert_eq!(
            scanned.columns.iter().map(entry).collect::<Vec<_>>(),
            vec![expected("users", "created_at", "idx_users_created", false, 0)]
        );
    }

    #[test]
    fn test_references() {
        let scanned = scan_text(
            r#"databaseChangeLog:
  - include:
      file: a.yaml
  - includeAll:
      path: changes/
      relativeToChangelogFile: "true"
  - changeSet:
      id: 4
      author: dev
      changes:
        - sqlFile:
            path: b.sql
            relativeToChangelogFile: true
"#,
        );
        assert_eq!(
            scanned.references,
            vec![
                Reference::Include {
                    file: "a.yaml".to_string(),
                    relative: false
                },
                Reference::IncludeAll {
                    path: "changes/".to_string(),
                    relative: true
                },
                Reference::SqlFile {
                    path: "b.sql".to_string(),
                    relative: true
                },
            ]
        );
    }

    #[test]
    fn test_json_changelog() {
        let path = Path::new("changelog.json");
        let document = parse(
            path,
            r#"{"databaseChangeLog": [{"changeSet": {"id": "1", "author": "dev", "changes": [
                {"addUniqueConstraint": {"tableName": "users", "columnNames": "email"}}
            ]}}]}"#,
        )
        .unwrap();
        let scanned = scan(&document, path);
        assert_eq!(
            scanned.columns.iter().map(entry).collect::<Vec<_>>(),
            vec![expected("users", "email", "users_email_key", true, 0)]
        );
    }

    #[test]
    fn test_not_a_changelog() {
        assert!(parse(Path::new("x.yaml"), "spring:\n  datasource: {}\n").is_none());
        assert!(parse(Path::new("x.yaml"), "databaseChangeLog: [").is_none());
    }
}
