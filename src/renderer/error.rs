//! Errors raised while evaluating a parsed template

use thiserror::Error;

use crate::error::{report, Location, Span};
use crate::renderer::value::Value;

/// What went wrong during evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Reason {
    #[error("undefined variable `{name}`")]
    UndefinedVariable { name: String },

    #[error("{owner} has no attribute `{name}`")]
    UndefinedAttribute { owner: String, name: String },

    #[error("no entry named `{key}`")]
    UndefinedKey { key: String },

    #[error("index {index} is out of range for a list of length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    /// A catalog record names an architecture the catalog does not define
    #[error("{owner} references unknown architecture `{arch}`")]
    DanglingArch { owner: String, arch: String },

    #[error("unknown function `{name}`")]
    UnknownFunction { name: String },

    #[error("`{function}` takes {expected} argument(s), got {found}")]
    ArgumentCount {
        function: String,
        expected: &'static str,
        found: usize,
    },

    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("integer overflow")]
    Overflow,

    #[error("range of {len} items exceeds the limit of {limit}")]
    RangeTooLarge { len: u64, limit: u64 },
}

impl Reason {
    pub fn type_mismatch(expected: &'static str, found: &Value<'_>) -> Self {
        Reason::TypeMismatch {
            expected,
            found: found.type_name(),
        }
    }

    /// True for failures caused by a name that resolves to nothing
    pub fn is_undefined_reference(&self) -> bool {
        matches!(
            self,
            Reason::UndefinedVariable { .. }
                | Reason::UndefinedAttribute { .. }
                | Reason::UndefinedKey { .. }
                | Reason::IndexOutOfRange { .. }
                | Reason::DanglingArch { .. }
                | Reason::UnknownFunction { .. }
        )
    }
}

/// An evaluation failure pinned to the template source
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{reason} at {location}")]
pub struct EvalError {
    pub reason: Reason,
    pub span: Span,
    pub location: Location,
}

impl EvalError {
    pub fn new(source: &str, span: Span, reason: Reason) -> Self {
        Self {
            location: Location::locate(source, span.start),
            span,
            reason,
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let headline = if self.reason.is_undefined_reference() {
            "undefined reference"
        } else {
            "template evaluation error"
        };
        report(
            source,
            filename,
            self.span.clone(),
            headline,
            &self.reason.to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_location() {
        let err = EvalError::new(
            "line one\n{{ nope }}",
            12..16,
            Reason::UndefinedVariable {
                name: "nope".to_string(),
            },
        );
        insta::assert_snapshot!(err.to_string(), @"undefined variable `nope` at line 2, column 4");
    }

    #[test]
    fn test_classification() {
        assert!(Reason::UndefinedKey {
            key: "avx9".to_string()
        }
        .is_undefined_reference());
        assert!(!Reason::Overflow.is_undefined_reference());
        assert!(!Reason::TypeMismatch {
            expected: "int",
            found: "string"
        }
        .is_undefined_reference());
    }

    #[test]
    fn test_format_shows_reason() {
        let source = "{{ m.nmae }}";
        let err = EvalError::new(
            source,
            3..9,
            Reason::UndefinedAttribute {
                owner: "machine `avx2`".to_string(),
                name: "nmae".to_string(),
            },
        );
        let report = err.format(source, "dispatch.tmpl");
        assert!(report.contains("has no attribute `nmae`"));
    }
}
