//! Column references in native SQL queries.
//!
//! Only three places are looked at: conditions introduced by `WHERE`, `AND`
//! and `OR`, equality conditions of `JOIN ... ON`, and `ORDER BY` lists.
//! Select lists, function arguments and expressions are not columns a lookup
//! needs an index for, or cannot be told apart from one without a parser.

use std::collections::HashMap;

use crate::lexer::sql::{COMPARISON_OPS, SqlToken, tokenize};
use crate::model::ID_FIELD;

/// Words that are never read as a column name.
const DENYLIST: &[&str] = &[
    "true", "false", "null", "and", "or", "not", "exists", "select", "case", "when", "then",
    "else", "end", "all", "any", "some", "distinct", "current_date", "current_timestamp",
    "now", "interval", "cast", "row", "array",
];

/// Words that can follow a table name and are never an alias.
const RESERVED: &[&str] = &[
    "where", "join", "left", "right", "inner", "outer", "full", "cross", "natural", "lateral",
    "on", "using", "order", "group", "by", "having", "set", "limit", "offset", "fetch", "for",
    "union", "except", "intersect", "window", "returning", "as", "and", "or", "values",
    "select", "from", "with",
];

/// Keywords that end an `ON` or `ORDER BY` clause.
const CLAUSE_END: &[&str] = &[
    "where", "join", "left", "right", "inner", "outer", "full", "cross", "group", "order",
    "having", "limit", "offset", "fetch", "for", "union", "except", "intersect", "returning",
    "window",
];

/// A column as written in the query, with its qualifier if any.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnRef {
    qualifier: Option<String>,
    column: String,
}

/// A resolved column reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeColumn {
    pub table: String,
    pub column: String,
}

/// Columns of `sql` that belong to `entity_table`, or to the only table of a
/// single-table statement.
///
/// When several tables are bound, a column is kept only if it is qualified
/// by an alias (or the name) of `entity_table`; unqualified columns are
/// ambiguous and dropped.
pub fn columns(sql: &str, entity_table: &str) -> Vec<NativeColumn> {
    let tokens = tokenize(sql);
    let aliases = bind_tables(&tokens);

    let mut tables: Vec<&String> = aliases.values().collect();
    tables.sort();
    tables.dedup();

    let single = match tables.as_slice() {
        [] => Some(entity_table.to_string()),
        [only] => Some((*only).clone()),
        _ => None,
    };
    let entity_key = entity_table.to_lowercase();

    let mut refs = condition_columns(&tokens);
    refs.extend(join_columns(&tokens));
    refs.extend(order_columns(&tokens));

    refs.into_iter()
        .filter(|r| !DENYLIST.contains(&r.column.to_lowercase().as_str()))
        .filter_map(|r| {
            let table = match (&r.qualifier, &single) {
                (None, Some(table)) => table.clone(),
                (None, None) => return None,
                (Some(qualifier), Some(table)) => {
                    match aliases.get(&qualifier.to_lowercase()) {
                        Some(bound) if bound == table => table.clone(),
                        None if tables.is_empty() => table.clone(),
                        _ => return None,
                    }
                }
                (Some(qualifier), None) => {
                    let bound = aliases.get(&qualifier.to_lowercase())?;
                    if bound.to_lowercase() != entity_key {
                        return None;
                    }
                    bound.clone()
                }
            };
            Some(NativeColumn {
                table,
                column: r.column,
            })
        })
        .collect()
}

/// Lower-cased alias (and table name) to table name, from `FROM`, `JOIN`
/// and `UPDATE` clauses. Schema prefixes are dropped.
fn bind_tables(tokens: &[SqlToken]) -> HashMap<String, String> {
    let mut aliases = HashMap::new();
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];
        if !(token.is_kw("from") || token.is_kw("join") || token.is_kw("update")) {
            i += 1;
            continue;
        }
        i += 1;

        loop {
            let mut name = None;
            while let Some(segment) = tokens.get(i).and_then(SqlToken::ident) {
                name = Some(segment.to_string());
                i += 1;
                if tokens.get(i).is_some_and(|t| t.is_punct('.')) {
                    i += 1;
                } else {
                    break;
                }
            }
            let Some(table) = name else {
                break;
            };
            if RESERVED.contains(&table.to_lowercase().as_str()) {
                break;
            }
            aliases.insert(table.to_lowercase(), table.clone());

            if tokens.get(i).is_some_and(|t| t.is_kw("as")) {
                i += 1;
            }
            if let Some(alias) = tokens.get(i).and_then(SqlToken::ident) {
                if !RESERVED.contains(&alias.to_lowercase().as_str()) {
                    aliases.insert(alias.to_lowercase(), table.clone());
                    i += 1;
                }
            }

            if tokens.get(i).is_some_and(|t| t.is_punct(',')) {
                i += 1;
                continue;
            }
            break;
        }
    }

    aliases
}

/// Read `ident` or `qualifier.ident` at `i`, returning the reference and the
/// position after it.
fn column_ref(tokens: &[SqlToken], i: usize) -> Option<(ColumnRef, usize)> {
    let first = tokens.get(i)?.ident()?;
    if tokens.get(i + 1).is_some_and(|t| t.is_punct('.')) {
        let column = tokens.get(i + 2)?.ident()?;
        return Some((
            ColumnRef {
                qualifier: Some(first.to_string()),
                column: column.to_string(),
            },
            i + 3,
        ));
    }
    Some((
        ColumnRef {
            qualifier: None,
            column: first.to_string(),
        },
        i + 1,
    ))
}

/// Whether the token at `i` starts a predicate operator.
fn is_predicate_operator(tokens: &[SqlToken], i: usize) -> bool {
    let Some(token) = tokens.get(i) else {
        return false;
    };
    if COMPARISON_OPS.iter().any(|op| token.is_op(op)) {
        return true;
    }
    if ["is", "in", "between", "like", "ilike"]
        .iter()
        .any(|kw| token.is_kw(kw))
    {
        return true;
    }
    token.is_kw("not")
        && tokens
            .get(i + 1)
            .is_some_and(|next| ["in", "between", "like", "ilike"].iter().any(|kw| next.is_kw(kw)))
}

/// Columns directly after `WHERE`, `AND` or `OR` that a predicate operator
/// follows.
fn condition_columns(tokens: &[SqlToken]) -> Vec<ColumnRef> {
    let mut out = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        if !(token.is_kw("where") || token.is_kw("and") || token.is_kw("or")) {
            continue;
        }
        let mut at = i + 1;
        while tokens.get(at).is_some_and(|t| t.is_punct('(')) {
            at += 1;
        }
        let Some((column, next)) = column_ref(tokens, at) else {
            continue;
        };
        if is_predicate_operator(tokens, next) {
            out.push(column);
        }
    }
    out
}

/// Both sides of `a = b` equalities inside `JOIN ... ON` clauses, except
/// `id` columns.
fn join_columns(tokens: &[SqlToken]) -> Vec<ColumnRef> {
    let mut out = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        if !tokens[i].is_kw("on") {
            i += 1;
            continue;
        }
        let end = clause_end(tokens, i + 1);
        for eq in i + 1..end {
            if !tokens[eq].is_op("=") {
                continue;
            }
            if let Some(left) = ref_ending_at(tokens, eq) {
                out.push(left);
            }
            if let Some((right, _)) = column_ref(tokens, eq + 1) {
                out.push(right);
            }
        }
        i = end;
    }

    out.retain(|r| !r.column.eq_ignore_ascii_case(ID_FIELD));
    out
}

/// The column reference that ends right before `end`.
fn ref_ending_at(tokens: &[SqlToken], end: usize) -> Option<ColumnRef> {
    let column = tokens.get(end.checked_sub(1)?)?.ident()?;
    let qualifier = end
        .checked_sub(3)
        .filter(|q| tokens[q + 1].is_punct('.'))
        .and_then(|q| tokens[q].ident());
    Some(ColumnRef {
        qualifier: qualifier.map(str::to_string),
        column: column.to_string(),
    })
}

/// Columns listed after `ORDER BY`.
fn order_columns(tokens: &[SqlToken]) -> Vec<ColumnRef> {
    let mut out = Vec::new();
    let mut i = 0;

    while i + 1 < tokens.len() {
        if !(tokens[i].is_kw("order") && tokens[i + 1].is_kw("by")) {
            i += 1;
            continue;
        }
        let end = clause_end(tokens, i + 2);
        for item in crate::lexer::sql::split_commas(&tokens[i + 2..end]) {
            let Some((column, next)) = column_ref(item, 0) else {
                continue;
            };
            let trailing_ok = item[next..].iter().all(|t| {
                ["asc", "desc", "nulls", "first", "last"]
                    .iter()
                    .any(|kw| t.is_kw(kw))
            });
            if trailing_ok {
                out.push(column);
            }
        }
        i = end;
    }

    out
}

/// Position of the token that ends the clause starting at `from`.
fn clause_end(tokens: &[SqlToken], from: usize) -> usize {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(from) {
        if token.is_punct('(') {
            depth += 1;
        } else if token.is_punct(')') {
            if depth == 0 {
                return i;
            }
            depth -= 1;
        } else if depth == 0
            && (token.is_punct(';') || CLAUSE_END.iter().any(|kw| token.is_kw(kw)))
        {
            return i;
        }
    }
    tokens.len()
}
