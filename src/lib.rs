//! # idxlint
//!
//! Static detection of database columns that are queried without a usable
//! index.
//!
//! idxlint reads three kinds of source text and never touches a database:
//! - JPA entity classes, which map entities to tables and fields to columns
//! - Spring Data repositories, whose derived query methods, JPQL and native
//!   SQL name the columns being filtered on
//! - Liquibase changelogs, which declare indexes, unique constraints and
//!   primary keys
//!
//! A queried column is covered only when some index starts with it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use idxlint::prelude::*;
//!
//! let modules = vec![ModuleSource::new("accounts", "services/accounts")];
//! let missing = analyze_modules(&modules, &ModuleLayout::default(), &Exclusions::default());
//!
//! for issue in &missing {
//!     println!("{}.{} ({})", issue.table_name, issue.column_name, issue.query_source);
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The analysis engine.
pub mod engine {
    pub use idxlint_core::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::engine::baseline;
    pub use crate::engine::{
        BaselineComparison, BaselineIssue, Exclusions, MissingIndex, ModuleLayout, ModuleSource,
        analyze_module, analyze_modules,
    };
}

// Re-export key types at the crate root
pub use idxlint_core::{LintError, LintResult, MissingIndex};
