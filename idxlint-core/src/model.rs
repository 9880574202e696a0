//! Data model shared by the analysis components.

use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::naming::to_snake_case;

/// Field name of the entity identifier.
pub const ID_FIELD: &str = "id";

/// Audit fields every mapping carries unless the entity declares them itself.
pub const DEFAULT_AUDIT_FIELDS: &[(&str, &str)] =
    &[("createdAt", "created_at"), ("updatedAt", "updated_at")];

/// The table an entity class is mapped to, and how its fields map to columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMapping {
    /// Simple class name of the entity.
    pub entity_name: String,
    /// Database table the entity is stored in.
    pub table_name: String,
    /// Field name to column name, in declaration order.
    pub field_to_column: IndexMap<String, String>,
}

impl TableMapping {
    /// Create a mapping from declared fields, adding the identifier and
    /// audit defaults for anything the entity did not declare.
    pub fn new(
        entity_name: impl Into<String>,
        table_name: impl Into<String>,
        mut field_to_column: IndexMap<String, String>,
    ) -> Self {
        field_to_column
            .entry(ID_FIELD.to_string())
            .or_insert_with(|| ID_FIELD.to_string());
        for (field, column) in DEFAULT_AUDIT_FIELDS {
            field_to_column
                .entry((*field).to_string())
                .or_insert_with(|| (*column).to_string());
        }

        Self {
            entity_name: entity_name.into(),
            table_name: table_name.into(),
            field_to_column,
        }
    }

    /// Column for a field, if the field is mapped.
    pub fn column(&self, field: &str) -> Option<&str> {
        self.field_to_column.get(field).map(String::as_str)
    }

    /// Column for a field, falling back to the snake_case transliteration.
    pub fn resolve(&self, field: &str) -> String {
        self.column(field)
            .map(str::to_string)
            .unwrap_or_else(|| to_snake_case(field))
    }
}

/// Which query dialect a column reference was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QueryType {
    /// Fields encoded in the method name.
    DerivedQuery,
    /// A `@Query` in the portable entity query language.
    Jpql,
    /// A `@Query` with `nativeQuery = true`.
    NativeSql,
}

impl QueryType {
    /// Short label used in reports.
    pub fn label(self) -> &'static str {
        match self {
            QueryType::DerivedQuery => "derived",
            QueryType::Jpql => "jpql",
            QueryType::NativeSql => "native",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A column referenced by a repository query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryColumn {
    pub table_name: String,
    pub column_name: String,
    /// `Repository.method` the reference came from.
    pub source: String,
    pub file_path: PathBuf,
    /// 1-based line of the method declaration.
    pub line_number: usize,
    pub query_type: QueryType,
}

/// A column covered by an index, unique constraint or primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedColumn {
    pub table_name: String,
    pub column_name: String,
    pub index_name: String,
    pub file_path: PathBuf,
    pub is_unique: bool,
    /// The index carries a filter predicate.
    pub is_partial: bool,
    /// 0-based ordinal within the index column list.
    pub composite_position: usize,
}

/// A queried column with no index usable for a standalone lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingIndex {
    pub service_name: String,
    pub table_name: String,
    pub column_name: String,
    pub query_source: String,
    pub repository_file: PathBuf,
    pub line_number: usize,
    pub query_type: QueryType,
}

impl MissingIndex {
    /// Case-insensitive `(service, table, column)` identity.
    pub fn key(&self) -> IssueKey {
        IssueKey::new(&self.service_name, &self.table_name, &self.column_name)
    }
}

/// Minimal identity of a finding, persisted in a baseline file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineIssue {
    pub service: String,
    pub table: String,
    pub column: String,
}

impl BaselineIssue {
    /// Create a baseline issue.
    pub fn new(
        service: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            table: table.into(),
            column: column.into(),
        }
    }

    /// Case-insensitive `(service, table, column)` identity.
    pub fn key(&self) -> IssueKey {
        IssueKey::new(&self.service, &self.table, &self.column)
    }
}

impl From<&MissingIndex> for BaselineIssue {
    fn from(issue: &MissingIndex) -> Self {
        Self::new(
            issue.service_name.clone(),
            issue.table_name.clone(),
            issue.column_name.clone(),
        )
    }
}

/// Lower-cased `(service, table, column)` triple; orders findings everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IssueKey {
    pub service: String,
    pub table: String,
    pub column: String,
}

impl IssueKey {
    /// Build a key, lower-casing every part.
    pub fn new(service: &str, table: &str, column: &str) -> Self {
        Self {
            service: service.to_lowercase(),
            table: table.to_lowercase(),
            column: column.to_lowercase(),
        }
    }
}

/// Current findings partitioned against a baseline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineComparison {
    pub current: Vec<MissingIndex>,
    pub new_issues: Vec<MissingIndex>,
    pub existing_issues: Vec<MissingIndex>,
    pub resolved_issues: Vec<BaselineIssue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_adds_defaults() {
        let mapping = TableMapping::new("User", "users", IndexMap::new());
        assert_eq!(mapping.column("id"), Some("id"));
        assert_eq!(mapping.column("createdAt"), Some("created_at"));
        assert_eq!(mapping.column("updatedAt"), Some("updated_at"));
    }

    #[test]
    fn test_mapping_keeps_declared_audit_columns() {
        let mut fields = IndexMap::new();
        fields.insert("createdAt".to_string(), "creation_ts".to_string());
        fields.insert("id".to_string(), "user_id".to_string());

        let mapping = TableMapping::new("User", "users", fields);
        assert_eq!(mapping.column("createdAt"), Some("creation_ts"));
        assert_eq!(mapping.column("id"), Some("user_id"));
        assert_eq!(mapping.column("updatedAt"), Some("updated_at"));
    }

    #[test]
    fn test_resolve_falls_back_to_snake_case() {
        let mapping = TableMapping::new("Order", "orders", IndexMap::new());
        assert_eq!(mapping.resolve("shippingAddress"), "shipping_address");
    }

    #[test]
    fn test_issue_key_ignores_case() {
        let a = BaselineIssue::new("Billing", "Users", "EMAIL");
        let b = BaselineIssue::new("billing", "users", "email");
        assert_eq!(a.key(), b.key());
    }
}
