//! Non-fatal issues found while loading a document, and the policy that
//! decides what to do with them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ParseError;

/// A structural issue found while loading a document.
///
/// Loading continues past these; the [`DiagnosticPolicy`] decides whether
/// they abort the load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// JSON pointer into the document (e.g. `/paths/~1users/get/parameters/0`).
    pub pointer: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(pointer: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pointer, self.message)
    }
}

/// How diagnostics discovered while loading are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiagnosticPolicy {
    /// Any diagnostic aborts the load.
    Strict,
    /// Diagnostics are logged and the best-effort document is kept.
    #[default]
    Lenient,
}

impl DiagnosticPolicy {
    /// Apply the policy to the diagnostics collected for `location`.
    pub fn process(&self, location: &str, issues: &[Diagnostic]) -> Result<(), ParseError> {
        if issues.is_empty() {
            return Ok(());
        }
        match self {
            Self::Strict => Err(ParseError::Diagnostics {
                location: location.to_string(),
                issues: issues.to_vec(),
            }),
            Self::Lenient => {
                for issue in issues {
                    tracing::warn!(
                        location = %location,
                        pointer = %issue.pointer,
                        "error reading spec: {}",
                        issue.message
                    );
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_accepts_issues() {
        let issues = vec![Diagnostic::new("/paths", "bad")];
        assert!(DiagnosticPolicy::Lenient.process("a.yaml", &issues).is_ok());
    }

    #[test]
    fn strict_rejects_issues() {
        let issues = vec![
            Diagnostic::new("/paths/~1a/get/parameters/0", "parameter has no name"),
            Diagnostic::new("/components/schemas/X", "schema must be an object"),
        ];
        let err = DiagnosticPolicy::Strict
            .process("a.yaml", &issues)
            .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("E1005"));
        assert!(message.contains("a.yaml"));
        assert!(message.contains("parameter has no name"));
        assert!(message.contains("schema must be an object"));
    }

    #[test]
    fn strict_accepts_clean_document() {
        assert!(DiagnosticPolicy::Strict.process("a.yaml", &[]).is_ok());
    }

    #[test]
    fn default_is_lenient() {
        assert_eq!(DiagnosticPolicy::default(), DiagnosticPolicy::Lenient);
    }
}
