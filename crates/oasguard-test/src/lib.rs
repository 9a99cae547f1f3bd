//! Regression tests that drive the `oasguard` binary end to end.
//!
//! Fixture specs live in `tests/fixtures` at the workspace root.

#[cfg(test)]
pub mod cli;
