//! Index definitions in raw SQL.
//!
//! Recognized statements:
//!
//! ```text
//! CREATE [UNIQUE] INDEX [CONCURRENTLY] [IF NOT EXISTS] [name]
//!     ON [ONLY] table [USING method] (column, ...) [... WHERE predicate]
//! CREATE TABLE [IF NOT EXISTS] table (
//!     column type [PRIMARY KEY | UNIQUE], ...,
//!     [CONSTRAINT name] PRIMARY KEY (column, ...),
//!     [CONSTRAINT name] UNIQUE [KEY | INDEX] [name] (column, ...),
//!     {INDEX | KEY} [name] (column, ...))
//! ALTER TABLE [ONLY] [IF EXISTS] table
//!     ADD [CONSTRAINT name] {UNIQUE | PRIMARY KEY} (column, ...)
//! ```
//!
//! Keywords are matched case-insensitively. Comments, including Liquibase
//! `--rollback` lines, never reach the parser.

use std::path::Path;

use super::IndexDef;
use crate::lexer::sql::{SqlToken, matching_paren, split_commas, statements, tokenize};
use crate::model::IndexedColumn;

/// Words allowed after an index column: ordering, null placement, collation.
const COLUMN_MODIFIERS: &[&str] = &["asc", "desc", "nulls", "first", "last", "collate"];

/// Index definitions in `sql`, one entry per indexed column.
pub fn scan(sql: &str, path: &Path) -> Vec<IndexedColumn> {
    if !mentions_index(sql) {
        return Vec::new();
    }
    let tokens = tokenize(sql);
    statements(&tokens)
        .into_iter()
        .flat_map(statement_indexes)
        .flat_map(|def| def.into_columns(path))
        .collect()
}

/// Cheap filter so that ordinary changelog strings skip tokenizing.
fn mentions_index(sql: &str) -> bool {
    let upper = sql.to_ascii_uppercase();
    upper.contains("CREATE") || upper.contains("ALTER")
}

fn statement_indexes(stmt: &[SqlToken]) -> Vec<IndexDef> {
    let mut cursor = Cursor::new(stmt);
    if cursor.eat("create") {
        let unique = cursor.eat("unique");
        if cursor.eat("index") {
            return create_index(cursor, unique).into_iter().collect();
        }
        if !unique && cursor.eat("table") {
            return create_table(cursor);
        }
    } else if cursor.eat("alter") && cursor.eat("table") {
        return alter_table(cursor);
    }
    Vec::new()
}

fn create_index(mut cursor: Cursor<'_>, unique: bool) -> Option<IndexDef> {
    cursor.eat("concurrently");
    cursor.eat_if_not_exists();

    let name = if cursor.peek_kw("on") {
        None
    } else {
        cursor.qualified_name()
    };
    if !cursor.eat("on") {
        return None;
    }
    cursor.eat("only");
    let table = cursor.qualified_name()?;
    if cursor.eat("using") {
        cursor.advance();
    }

    let open = cursor.pos;
    if !cursor.peek_punct('(') {
        return None;
    }
    let close = matching_paren(cursor.tokens, open)?;
    let columns = index_columns(&cursor.tokens[open + 1..close]);
    let partial = cursor.tokens[close + 1..].iter().any(|t| t.is_kw("where"));

    let name = name.unwrap_or_else(|| {
        let mut parts = vec![table.clone()];
        parts.extend(columns.iter().flatten().cloned());
        parts.push("idx".to_string());
        parts.join("_")
    });

    Some(IndexDef {
        name,
        table,
        columns,
        unique,
        partial,
    })
}

fn create_table(mut cursor: Cursor<'_>) -> Vec<IndexDef> {
    cursor.eat_if_not_exists();
    let Some(table) = cursor.qualified_name() else {
        return Vec::new();
    };
    if !cursor.peek_punct('(') {
        return Vec::new();
    }
    let open = cursor.pos;
    let Some(close) = matching_paren(cursor.tokens, open) else {
        return Vec::new();
    };

    let mut defs = Vec::new();
    for element in split_commas(&cursor.tokens[open + 1..close]) {
        if let Some(def) = table_constraint(&table, element) {
            defs.push(def);
            continue;
        }
        // Column definition: name type [constraints]
        let Some(column) = element.first().and_then(SqlToken::ident) else {
            continue;
        };
        let constraint = if has_sequence(element, &["primary", "key"]) {
            Some(format!("{table}_pkey"))
        } else if element.iter().any(|t| t.is_kw("unique")) {
            Some(format!("{table}_{column}_key"))
        } else {
            None
        };
        if let Some(name) = constraint {
            defs.push(IndexDef {
                name,
                table: table.clone(),
                columns: vec![Some(column.to_string())],
                unique: true,
                partial: false,
            });
        }
    }
    defs
}

fn alter_table(mut cursor: Cursor<'_>) -> Vec<IndexDef> {
    cursor.eat("only");
    if cursor.eat("if") {
        cursor.eat("exists");
    }
    let Some(table) = cursor.qualified_name() else {
        return Vec::new();
    };

    split_commas(&cursor.tokens[cursor.pos..])
        .into_iter()
        .filter_map(|action| {
            let (first, rest) = action.split_first()?;
            if !first.is_kw("add") {
                return None;
            }
            table_constraint(&table, rest)
        })
        .collect()
}

/// A table-level `PRIMARY KEY`, `UNIQUE` or MySQL `INDEX`/`KEY` element.
fn table_constraint(table: &str, element: &[SqlToken]) -> Option<IndexDef> {
    let mut cursor = Cursor::new(element);
    let mut name = None;
    if cursor.eat("constraint") {
        name = cursor.advance().and_then(SqlToken::ident).map(str::to_string);
    }

    let (unique, default_suffix) = if cursor.eat("primary") {
        if !cursor.eat("key") {
            return None;
        }
        (true, "pkey")
    } else if cursor.eat("unique") {
        if !cursor.eat("key") {
            cursor.eat("index");
        }
        (true, "key")
    } else if cursor.peek_kw("index") || cursor.peek_kw("key") {
        if !names_index(&element[cursor.pos + 1..]) {
            return None;
        }
        cursor.advance();
        (false, "idx")
    } else {
        return None;
    };

    // MySQL allows an index name before the column list.
    if !cursor.peek_punct('(') {
        let inline = cursor.advance().and_then(SqlToken::ident).map(str::to_string);
        name = name.or(inline);
    }
    if !cursor.peek_punct('(') {
        return None;
    }
    let open = cursor.pos;
    let close = matching_paren(element, open)?;
    let columns = index_columns(&element[open + 1..close]);

    let name = name.unwrap_or_else(|| {
        if default_suffix == "pkey" {
            format!("{table}_pkey")
        } else {
            let mut parts = vec![table.to_string()];
            parts.extend(columns.iter().flatten().cloned());
            parts.push(default_suffix.to_string());
            parts.join("_")
        }
    });

    Some(IndexDef {
        name,
        table: table.to_string(),
        columns,
        unique,
        partial: false,
    })
}

/// Whether the tokens after a leading `INDEX` or `KEY` form `[name] (column, ...)`.
///
/// A column that is itself called `key` or `index` is followed by its type
/// instead, and a parenthesized type such as `VARCHAR(64)` lists numbers.
fn names_index(rest: &[SqlToken]) -> bool {
    let open = match rest {
        [first, ..] if first.is_punct('(') => 0,
        [name, paren, ..] if name.ident().is_some() && paren.is_punct('(') => 1,
        _ => return false,
    };
    let Some(close) = matching_paren(rest, open) else {
        return false;
    };
    let items = split_commas(&rest[open + 1..close]);
    !items.is_empty()
        && items
            .iter()
            .all(|item| item.first().and_then(SqlToken::ident).is_some())
}

/// Column list of an index. Expressions keep their position as `None`.
fn index_columns(list: &[SqlToken]) -> Vec<Option<String>> {
    split_commas(list)
        .into_iter()
        .map(|item| {
            let (first, rest) = item.split_first()?;
            let column = first.ident()?;
            // Anything but modifiers and an operator class makes it an expression.
            let plain = rest.iter().all(|t| match t {
                SqlToken::Word(w) => {
                    COLUMN_MODIFIERS.contains(&w.to_ascii_lowercase().as_str())
                        || w.to_ascii_lowercase().ends_with("_ops")
                }
                SqlToken::Quoted(_) => true,
                _ => false,
            });
            plain.then(|| column.to_string())
        })
        .collect()
}

fn has_sequence(tokens: &[SqlToken], words: &[&str]) -> bool {
    tokens
        .windows(words.len())
        .any(|w| w.iter().zip(words).all(|(t, kw)| t.is_kw(kw)))
}

/// Forward-only reader over a statement's tokens.
struct Cursor<'a> {
    tokens: &'a [SqlToken],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [SqlToken]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn advance(&mut self) -> Option<&'a SqlToken> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn peek_kw(&self, kw: &str) -> bool {
        self.tokens.get(self.pos).is_some_and(|t| t.is_kw(kw))
    }

    fn peek_punct(&self, c: char) -> bool {
        self.tokens.get(self.pos).is_some_and(|t| t.is_punct(c))
    }

    /// Consume the keyword `kw` if it is next.
    fn eat(&mut self, kw: &str) -> bool {
        if self.peek_kw(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_if_not_exists(&mut self) {
        let is_clause = self.peek_kw("if")
            && self.tokens.get(self.pos + 1).is_some_and(|t| t.is_kw("not"))
            && self.tokens.get(self.pos + 2).is_some_and(|t| t.is_kw("exists"));
        if is_clause {
            self.pos += 3;
        }
    }

    /// `name` or `schema.name`, returning the last part.
    fn qualified_name(&mut self) -> Option<String> {
        let mut name = self.advance()?.ident()?.to_string();
        while self.peek_punct('.') {
            self.pos += 1;
            name = self.advance()?.ident()?.to_string();
        }
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scan_sql(sql: &str) -> Vec<(String, String, String, bool, bool, usize)> {
        scan(sql, Path::new("V1.sql"))
            .into_iter()
            .map(|c| {
                (
                    c.table_name,
                    c.column_name,
                    c.index_name,
                    c.is_unique,
                    c.is_partial,
                    c.composite_position,
                )
            })
            .collect()
    }

    fn entry(
        table: &str,
        column: &str,
        index: &str,
        unique: bool,
        partial: bool,
        position: usize,
    ) -> (String, String, String, bool, bool, usize) {
        (
            table.to_string(),
            column.to_string(),
            index.to_string(),
            unique,
            partial,
            position,
        )
    }

    #[test]
    fn test_create_index_variants() {
        assert_eq!(
            scan_sql(
                "create unique index if not exists ux_users_email on public.users using btree (lower(email), email varchar_pattern_ops ASC NULLS LAST);"
            ),
            vec![entry("users", "email", "ux_users_email", true, false, 1)]
        );
        assert_eq!(
            scan_sql("CREATE INDEX ON ONLY orders (status, \"createdAt\" DESC)"),
            vec![
                entry("orders", "status", "orders_status_createdAt_idx", false, false, 0),
                entry("orders", "createdAt", "orders_status_createdAt_idx", false, false, 1),
            ]
        );
    }

    #[test]
    fn test_partial_index() {
        assert_eq!(
            scan_sql(
                "CREATE INDEX idx_active ON users (email) WHERE deleted_at IS NULL; CREATE INDEX idx_b ON users (name);"
            ),
            vec![
                entry("users", "email", "idx_active", false, true, 0),
                entry("users", "name", "idx_b", false, false, 0),
            ]
        );
    }

    #[test]
    fn test_create_table_constraints() {
        let sql = "--changeset dev:1\n\
            CREATE TABLE IF NOT EXISTS accounts (\n\
                id BIGSERIAL PRIMARY KEY,\n\
                handle VARCHAR(64) NOT NULL UNIQUE,\n\
                tenant_id BIGINT NOT NULL,\n\
                region VARCHAR(8),\n\
                CONSTRAINT uq_accounts_tenant UNIQUE (tenant_id, region),\n\
                KEY idx_region (region)\n\
            );\n\
            --rollback DROP TABLE accounts;";
        assert_eq!(
            scan_sql(sql),
            vec![
                entry("accounts", "id", "accounts_pkey", true, false, 0),
                entry("accounts", "handle", "accounts_handle_key", true, false, 0),
                entry("accounts", "tenant_id", "uq_accounts_tenant", true, false, 0),
                entry("accounts", "region", "uq_accounts_tenant", true, false, 1),
                entry("accounts", "region", "idx_region", false, false, 0),
            ]
        );
    }

    #[test]
    fn test_columns_named_key_or_index() {
        assert_eq!(
            scan_sql(
                "CREATE TABLE t (key VARCHAR(64) NOT NULL UNIQUE, id BIGINT PRIMARY KEY, index DECIMAL(10, 2), INDEX (key))"
            ),
            vec![
                entry("t", "key", "t_key_key", true, false, 0),
                entry("t", "id", "t_pkey", true, false, 0),
                entry("t", "key", "t_key_idx", false, false, 0),
            ]
        );
        assert!(names_index(&tokenize("idx_region (region)")));
        assert!(!names_index(&tokenize("VARCHAR(64) NOT NULL")));
        assert!(!names_index(&tokenize("BIGINT")));
    }

    #[test]
    fn test_alter_table_add_constraint() {
        assert_eq!(
            scan_sql(
                "ALTER TABLE ONLY users ADD CONSTRAINT uq_users_ref UNIQUE (external_ref), ADD PRIMARY KEY (id);"
            ),
            vec![
                entry("users", "external_ref", "uq_users_ref", true, false, 0),
                entry("users", "id", "users_pkey", true, false, 0),
            ]
        );
    }

    #[test]
    fn test_unrelated_statements() {
        assert!(scan_sql("INSERT INTO users (email) VALUES ('a')").is_empty());
        assert!(scan_sql("ALTER TABLE users ADD COLUMN note TEXT").is_empty());
        assert!(scan_sql("-- CREATE INDEX idx ON users (email)").is_empty());
        assert!(scan_sql("users_email_idx").is_empty());
    }
}
