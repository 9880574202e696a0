//! Lexers shared by the extractors.
//!
//! - [`code`] splits Kotlin/Java sources into code and comments and provides
//!   string-aware bracket matching.
//! - [`annotation`] reads annotations and their arguments.
//! - [`sql`] tokenizes SQL and JPQL statements.

pub mod annotation;
pub mod code;
pub mod sql;

pub use annotation::{Annotation, leading_annotations};
pub use code::{SourceLine, code_text, line_of, mask_strings, matching_close, split_lines};
pub use sql::{SqlToken, tokenize};
