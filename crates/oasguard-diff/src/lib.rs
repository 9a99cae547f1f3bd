//! Semantic diff of two OpenAPI documents with a backward-compatibility verdict.
//!
//! [`DiffEngine::compare`] walks paths, operations, parameters, bodies,
//! responses and schemas of both documents and returns a [`ChangeSet`] tree in
//! which every finding is classified as compatible or breaking. Schema
//! comparisons are direction-aware: narrowing what a client may send breaks
//! requests, widening what a server may return breaks responses.

pub mod changeset;
pub mod config;
pub mod engine;
pub mod error;
pub mod extension;
mod operation;
mod parameters;
pub mod paths;
pub mod schema;
pub mod verdict;

pub use changeset::{Change, ChangeKind, ChangeSet, Element, Finding};
pub use config::DiffConfig;
pub use engine::DiffEngine;
pub use error::DiffError;
pub use extension::{
    ExtensionComparator, ExtensionContext, ExtensionRegistry, SunsetComparator, SUNSET_KEY,
};
pub use schema::SchemaComparator;
pub use verdict::{Direction, Verdict};
// Re-export loader types so callers need a single dependency
pub use oasguard_spec_parser::{load_spec, parse_spec, ApiSpec, DiagnosticPolicy, ParseError};
