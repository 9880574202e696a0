//! Matching query columns against indexed columns.
//!
//! A column counts as indexed only when it leads some index
//! (`composite_position == 0`). The second column of a composite index is no
//! help to a lookup on that column alone.

use std::collections::{HashMap, HashSet};

use crate::model::{ID_FIELD, IndexedColumn, MissingIndex, QueryColumn};

/// Findings that are never reported. All names are compared lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exclusions {
    tables: HashSet<String>,
    columns: HashSet<String>,
    /// `table.column` pairs.
    findings: HashSet<String>,
}

impl Exclusions {
    /// Build exclusions from configured names.
    pub fn new<T, C, F>(tables: T, columns: C, findings: F) -> Self
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
        F: IntoIterator,
        F::Item: AsRef<str>,
    {
        fn lower<I: IntoIterator>(items: I) -> HashSet<String>
        where
            I::Item: AsRef<str>,
        {
            items
                .into_iter()
                .map(|item| item.as_ref().trim().to_lowercase())
                .filter(|item| !item.is_empty())
                .collect()
        }

        Self {
            tables: lower(tables),
            columns: lower(columns),
            findings: lower(findings),
        }
    }

    /// Whether a finding on `table.column` is excluded.
    pub fn excludes(&self, table: &str, column: &str) -> bool {
        let table = table.to_lowercase();
        let column = column.to_lowercase();
        self.tables.contains(&table)
            || self.columns.contains(&column)
            || self.findings.contains(&format!("{table}.{column}"))
    }

    /// Whether nothing is excluded.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.columns.is_empty() && self.findings.is_empty()
    }
}

/// Report the query columns of `service` that no index leads.
///
/// Each `(table, column)` pair is reported once, for the first query that
/// uses it. The result is ordered by table, then column, ignoring case.
pub fn compare(
    service: &str,
    query_columns: &[QueryColumn],
    indexed_columns: &[IndexedColumn],
    exclusions: &Exclusions,
) -> Vec<MissingIndex> {
    let mut leading: HashMap<String, HashSet<String>> = HashMap::new();
    for indexed in indexed_columns
        .iter()
        .filter(|c| c.composite_position == 0)
    {
        leading
            .entry(indexed.table_name.to_lowercase())
            .or_default()
            .insert(indexed.column_name.to_lowercase());
    }

    let mut emitted = HashSet::new();
    let mut missing = Vec::new();

    for query in query_columns {
        let table = query.table_name.to_lowercase();
        let column = query.column_name.to_lowercase();

        if exclusions.excludes(&table, &column) || column == ID_FIELD {
            continue;
        }
        if leading
            .get(&table)
            .is_some_and(|columns| columns.contains(&column))
        {
            continue;
        }
        if !emitted.insert((table, column)) {
            continue;
        }

        missing.push(MissingIndex {
            service_name: service.to_string(),
            table_name: query.table_name.clone(),
            column_name: query.column_name.clone(),
            query_source: query.source.clone(),
            repository_file: query.file_path.clone(),
            line_number: query.line_number,
            query_type: query.query_type,
        });
    }

    missing.sort_by_cached_key(|m| (m.table_name.to_lowercase(), m.column_name.to_lowercase()));
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QueryType;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn query(table: &str, column: &str, source: &str) -> QueryColumn {
        QueryColumn {
            table_name: table.to_string(),
            column_name: column.to_string(),
            source: source.to_string(),
            file_path: PathBuf::from("UserRepository.kt"),
            line_number: 3,
            query_type: QueryType::DerivedQuery,
        }
    }

    fn index(table: &str, column: &str, position: usize) -> IndexedColumn {
        IndexedColumn {
            table_name: table.to_string(),
            column_name: column.to_string(),
            index_name: "idx".to_string(),
            file_path: PathBuf::from("db.changelog-master.yaml"),
            is_unique: false,
            is_partial: false,
            composite_position: position,
        }
    }

    fn pairs(missing: &[MissingIndex]) -> Vec<(&str, &str)> {
        missing
            .iter()
            .map(|m| (m.table_name.as_str(), m.column_name.as_str()))
            .collect()
    }

    #[test]
    fn test_unindexed_column_reported() {
        let missing = compare(
            "accounts",
            &[query("users", "email_address", "UserRepository.findByEmail")],
            &[],
            &Exclusions::default(),
        );
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].service_name, "accounts");
        assert_eq!(missing[0].query_source, "UserRepository.findByEmail");
        assert_eq!(missing[0].query_type, QueryType::DerivedQuery);

        let missing = compare(
            "accounts",
            &[query("users", "email_address", "UserRepository.findByEmail")],
            &[index("users", "email_address", 0)],
            &Exclusions::default(),
        );
        assert!(missing.is_empty());
    }

    #[test]
    fn test_leftmost_prefix_rule() {
        let missing = compare(
            "svc",
            &[query("users", "name", "a"), query("users", "email", "b")],
            &[index("users", "name", 0), index("users", "email", 1)],
            &Exclusions::default(),
        );
        assert_eq!(pairs(&missing), vec![("users", "email")]);
    }

    #[test]
    fn test_case_insensitive_match() {
        let missing = compare(
            "svc",
            &[query("Users", "EMAIL", "a")],
            &[index("users", "email", 0)],
            &Exclusions::default(),
        );
        assert!(missing.is_empty());
    }

    #[test]
    fn test_first_query_wins_and_sorted() {
        let missing = compare(
            "svc",
            &[
                query("users", "status", "UserRepository.findByStatus"),
                query("orders", "total", "OrderRepository.findByTotal"),
                query("Users", "Status", "UserRepository.countByStatus"),
                query("users", "age", "UserRepository.findByAge"),
            ],
            &[],
            &Exclusions::default(),
        );
        assert_eq!(
            pairs(&missing),
            vec![("orders", "total"), ("users", "age"), ("users", "status")]
        );
        assert_eq!(missing[2].query_source, "UserRepository.findByStatus");
    }

    #[test]
    fn test_id_and_exclusions() {
        let exclusions = Exclusions::new(["AUDIT_LOG"], ["tenant_id"], ["users.Status"]);
        let missing = compare(
            "svc",
            &[
                query("users", "ID", "a"),
                query("audit_log", "kind", "b"),
                query("orders", "tenant_id", "c"),
                query("USERS", "status", "d"),
                query("users", "email", "e"),
            ],
            &[],
            &exclusions,
        );
        assert_eq!(pairs(&missing), vec![("users", "email")]);
        assert!(!exclusions.is_empty());
        assert!(Exclusions::default().is_empty());
    }
}
