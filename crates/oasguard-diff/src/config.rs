//! Engine configuration.

use crate::verdict::Verdict;

/// Tunable classification rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffConfig {
    /// Verdict for an enum value removed from a response schema
    /// (default: breaking, since clients may switch on it).
    pub enum_removal_in_output: Verdict,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            enum_removal_in_output: Verdict::Breaking,
        }
    }
}

impl DiffConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the verdict for enum values removed from response schemas.
    pub fn with_enum_removal_in_output(mut self, verdict: Verdict) -> Self {
        self.enum_removal_in_output = verdict;
        self
    }
}
