//! Column references in JPQL queries.
//!
//! JPQL names entities and their fields rather than tables and columns, so
//! every `alias.field` path is resolved through the mapping of the entity the
//! alias was declared for.

use std::collections::{BTreeMap, HashMap};

use crate::lexer::sql::{SqlToken, tokenize};
use crate::model::TableMapping;

/// Words that can follow an entity name and are never an alias.
const RESERVED: &[&str] = &[
    "where", "join", "left", "right", "inner", "outer", "fetch", "on", "order", "group", "by",
    "having", "set", "and", "or", "not", "as", "with", "select", "from", "union", "limit",
    "offset", "in", "member", "of", "is", "like", "between", "escape", "asc", "desc", "when",
    "then", "else", "end", "case", "exists", "all", "any", "some", "update", "delete", "distinct",
    "new", "treat", "key", "value", "entry", "size", "index",
];

/// A resolved column reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpqlColumn {
    pub table: String,
    pub column: String,
}

/// Columns referenced through `alias.field` paths in `query`.
///
/// Aliases are declared by `FROM`, `JOIN` and `UPDATE` clauses. A join over
/// an association path (`JOIN u.orders o`) declares an alias without an
/// entity, and the path itself is not a column reference.
pub fn columns(query: &str, mappings: &BTreeMap<String, TableMapping>) -> Vec<JpqlColumn> {
    let tokens = tokenize(query);
    let (aliases, consumed) = bind_aliases(&tokens);

    let mut out = Vec::new();
    for i in 0..tokens.len().saturating_sub(2) {
        if consumed.contains(&i) {
            continue;
        }
        let (Some(alias), true, Some(field)) = (
            tokens[i].ident(),
            tokens[i + 1].is_punct('.'),
            tokens[i + 2].ident(),
        ) else {
            continue;
        };
        // Only the head of a path counts: `u.address.city` is `u.address`.
        if i > 0 && tokens[i - 1].is_punct('.') {
            continue;
        }
        let Some(Some(entity)) = aliases.get(&alias.to_lowercase()) else {
            continue;
        };
        let Some(mapping) = mappings.get(entity) else {
            continue;
        };
        out.push(JpqlColumn {
            table: mapping.table_name.clone(),
            column: mapping.resolve(field),
        });
    }
    out
}

/// Alias bindings (lower-cased alias to entity name, `None` for association
/// joins) and the token positions of association paths.
fn bind_aliases(tokens: &[SqlToken]) -> (HashMap<String, Option<String>>, Vec<usize>) {
    let mut aliases: HashMap<String, Option<String>> = HashMap::new();
    let mut consumed = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];
        if !(token.is_kw("from") || token.is_kw("join") || token.is_kw("update")) {
            i += 1;
            continue;
        }
        i += 1;
        if tokens.get(i).is_some_and(|t| t.is_kw("fetch")) {
            i += 1;
        }

        loop {
            let path_start = i;
            let mut path: Vec<&str> = Vec::new();
            while let Some(segment) = tokens.get(i).and_then(SqlToken::ident) {
                path.push(segment);
                i += 1;
                if tokens.get(i).is_some_and(|t| t.is_punct('.')) {
                    i += 1;
                } else {
                    break;
                }
            }
            let Some(last) = path.last() else {
                break;
            };

            let association =
                path.len() > 1 && aliases.contains_key(&path[0].to_lowercase());
            let entity = if association {
                consumed.extend(path_start..i);
                None
            } else {
                Some((*last).to_string())
            };

            if tokens.get(i).is_some_and(|t| t.is_kw("as")) {
                i += 1;
            }
            if let Some(alias) = tokens.get(i).and_then(SqlToken::ident) {
                if !RESERVED.contains(&alias.to_lowercase().as_str()) {
                    aliases.insert(alias.to_lowercase(), entity);
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

    (aliases, consumed)
}
