//! OpenAPI 3.x document model and loader.
//!
//! Reads YAML/JSON specs into an [`ApiSpec`]: paths, operations, parameters,
//! bodies, responses, security and `x-*` vendor extensions. Schemas live in an
//! arena addressed by [`SchemaId`]; `$ref` to a component schema is kept as a
//! reference node so recursive definitions stay finite.

pub mod diagnostics;
pub mod error;
pub mod model;
pub mod parser;

pub use diagnostics::{Diagnostic, DiagnosticPolicy};
pub use error::ParseError;
pub use model::{
    AdditionalProperties, ApiSpec, Extensions, Header, MediaType, Operation, Parameter,
    ParameterLocation, PathItem, RequestBody, Response, Schema, SchemaArena, SchemaId,
    SchemaKind, SchemaNode, SecurityRequirement,
};
pub use parser::{load_spec, parse_spec, ParsedSpec};
