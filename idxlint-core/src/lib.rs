//! # idxlint-core
//!
//! Static analysis that finds database columns queried without a usable
//! index.
//!
//! Three text sources are cross-referenced:
//!
//! - JPA entity classes (Kotlin or Java), mapping entities to tables and
//!   fields to columns ([`entity`])
//! - Spring Data repositories, whose derived method names, JPQL and native
//!   SQL queries reference columns ([`query`])
//! - Liquibase changelogs, which declare indexes, unique constraints and
//!   primary keys ([`changelog`])
//!
//! The [`compare`] module reports every queried column that does not lead
//! an index, and [`baseline`] separates new findings from accepted ones.
//!
//! ## Example
//!
//! ```rust,no_run
//! use idxlint_core::{Exclusions, ModuleLayout, ModuleSource, analyze_modules};
//!
//! let modules = vec![ModuleSource::new("orders", "services/orders")];
//! let missing = analyze_modules(&modules, &ModuleLayout::default(), &Exclusions::default());
//!
//! for finding in &missing {
//!     println!(
//!         "{}: {}.{} ({})",
//!         finding.service_name, finding.table_name, finding.column_name, finding.query_source
//!     );
//! }
//! ```
//!
//! Scanning is textual: no source file is compiled or fully parsed, and no
//! database is contacted.

pub mod baseline;
pub mod changelog;
pub mod compare;
pub mod entity;
pub mod error;
pub mod lexer;
pub mod model;
pub mod naming;
pub mod query;
pub mod scan;
pub mod source;

pub use compare::Exclusions;
pub use error::{LintError, LintResult};
pub use model::{
    BaselineComparison, BaselineIssue, IndexedColumn, IssueKey, MissingIndex, QueryColumn,
    QueryType, TableMapping,
};
pub use scan::{ModuleLayout, ModuleSource, analyze_module, analyze_modules};
