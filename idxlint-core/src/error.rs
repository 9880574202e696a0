//! Error types for the analysis engine.
//!
//! Most anomalies met while scanning (a file that is not an entity, a method
//! that is not a query, a changelog that does not parse) are not errors: they
//! contribute nothing to the result. The variants here cover the few places
//! where the engine talks to the filesystem on the caller's behalf.

// These warnings are false positives - the fields are used by derive macros
#![allow(unused_assignments)]

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for analysis operations.
pub type LintResult<T> = Result<T, LintError>;

/// Errors that can occur while loading or persisting analysis state.
#[derive(Debug, Error, Diagnostic)]
pub enum LintError {
    /// File system error.
    #[error("I/O error on {path}: {source}")]
    #[diagnostic(code(idxlint::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The baseline file exists but could not be understood.
    #[error("invalid baseline file {path}: {message}")]
    #[diagnostic(
        code(idxlint::baseline),
        help("delete the file or regenerate it with `idxlint baseline`")
    )]
    Baseline { path: PathBuf, message: String },

    /// Serialization of an output document failed.
    #[error("serialization error: {0}")]
    #[diagnostic(code(idxlint::serialization))]
    Serialization(#[from] serde_json::Error),
}

impl LintError {
    /// Create an I/O error bound to a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a baseline format error.
    pub fn baseline(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Baseline {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[allow(unused_assignments)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let err = LintError::io(
            "baseline.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("baseline.json"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_baseline_error_display() {
        let err = LintError::baseline("idxlint-baseline.json", "expected an object");
        assert_eq!(
            err.to_string(),
            "invalid baseline file idxlint-baseline.json: expected an object"
        );
    }
}
