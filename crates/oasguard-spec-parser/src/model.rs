use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Vendor extensions (`x-*` keys) attached to a node.
pub type Extensions = BTreeMap<String, serde_json::Value>;

/// A parsed OpenAPI document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiSpec {
    /// Source filename, set when loaded from disk.
    pub filename: Option<String>,
    /// The OpenAPI version string (e.g. "3.1.0").
    pub version: String,
    /// The `info.title` field.
    pub title: String,
    /// The `info.version` field.
    pub api_version: String,
    /// Path items keyed by their template (e.g. "/users/{id}").
    pub paths: BTreeMap<String, PathItem>,
    /// Every schema node in the document.
    pub schemas: SchemaArena,
    /// Reusable named schemas from `components.schemas`.
    pub components: BTreeMap<String, SchemaId>,
    /// Raw `components.securitySchemes` definitions.
    pub security_schemes: BTreeMap<String, serde_json::Value>,
    /// Root-level security requirements, inherited by operations without their own.
    pub security: Vec<SecurityRequirement>,
    /// Root-level `x-*` extensions.
    pub extensions: Extensions,
}

/// A path template and the operations bound to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathItem {
    /// The path template as written in the document.
    pub template: String,
    /// Operations keyed by uppercase HTTP method.
    pub operations: BTreeMap<String, Operation>,
    /// Path-item-level `x-*` extensions.
    pub extensions: Extensions,
}

/// A single API operation (path + method).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Operation {
    /// The OpenAPI operationId, if present.
    pub operation_id: Option<String>,
    /// Path-level and operation-level parameters, merged.
    pub parameters: Vec<Parameter>,
    /// Request body, if declared.
    pub request_body: Option<RequestBody>,
    /// Responses keyed by status code, `NXX` range or `default`.
    pub responses: BTreeMap<String, Response>,
    /// Operation-level security; `None` inherits the root list.
    pub security: Option<Vec<SecurityRequirement>>,
    /// Whether the operation is deprecated.
    pub deprecated: bool,
    /// Operation-level `x-*` extensions.
    pub extensions: Extensions,
}

/// Where a parameter travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
    /// OpenAPI 3.2 whole-query-string parameter.
    QueryString,
}

impl ParameterLocation {
    /// Parse the `in` field of a parameter object.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "cookie" => Some(Self::Cookie),
            "querystring" => Some(Self::QueryString),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
            Self::QueryString => "querystring",
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parameter definition. `(name, location)` is its identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub deprecated: bool,
    pub schema: Option<SchemaId>,
    pub extensions: Extensions,
}

impl Parameter {
    /// The identity key used to match parameters across versions.
    pub fn key(&self) -> (&str, ParameterLocation) {
        (self.name.as_str(), self.location)
    }
}

/// Request body definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestBody {
    /// Whether the request body is required.
    pub required: bool,
    /// Content schemas keyed by media type.
    pub content: BTreeMap<String, MediaType>,
    pub extensions: Extensions,
}

/// Schema for a specific media type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Option<SchemaId>,
}

/// A response for one status code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    pub content: BTreeMap<String, MediaType>,
    pub headers: BTreeMap<String, Header>,
    pub extensions: Extensions,
}

/// A response header definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Header {
    pub required: bool,
    pub deprecated: bool,
    pub schema: Option<SchemaId>,
}

/// One security requirement: scheme name to sorted scopes.
///
/// All schemes in a requirement must be satisfied together.
pub type SecurityRequirement = BTreeMap<String, Vec<String>>;

/// Stable identity of a schema node inside one document's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(pub usize);

/// Arena owning every schema node of a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaArena {
    nodes: Vec<SchemaNode>,
}

impl SchemaArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and return its id.
    pub fn push(&mut self, node: SchemaNode) -> SchemaId {
        self.nodes.push(node);
        SchemaId(self.nodes.len() - 1)
    }

    pub fn get(&self, id: SchemaId) -> Option<&SchemaNode> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// A node in the schema graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaNode {
    /// An inline or named schema definition.
    Definition(Box<Schema>),
    /// An alias of a reusable named schema. Holds the component name, or the
    /// raw `$ref` string when it does not point into `components.schemas`.
    Reference(String),
}

/// The primitive or composite kind declared by `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

impl SchemaKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `additionalProperties` setting of an object schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdditionalProperties {
    /// Absent or `true`.
    #[default]
    Allowed,
    /// `false`.
    Denied,
    /// Constrained by a schema.
    Schema(SchemaId),
}

/// A JSON Schema definition, reduced to what matters for compatibility.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    pub kind: Option<SchemaKind>,
    pub format: Option<String>,
    pub nullable: bool,
    pub properties: BTreeMap<String, SchemaId>,
    pub required: BTreeSet<String>,
    pub additional_properties: AdditionalProperties,
    pub items: Option<SchemaId>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: bool,
    pub exclusive_maximum: bool,
    pub pattern: Option<String>,
    pub enumeration: Vec<serde_json::Value>,
    pub one_of: Vec<SchemaId>,
    pub any_of: Vec<SchemaId>,
    pub all_of: Vec<SchemaId>,
    pub default: Option<serde_json::Value>,
    pub read_only: bool,
    pub write_only: bool,
    pub deprecated: bool,
    pub extensions: Extensions,
}

impl Schema {
    /// Whether the schema accepts every value (`{}` or annotations only).
    pub fn is_unconstrained(&self) -> bool {
        self.kind.is_none()
            && self.format.is_none()
            && !self.nullable
            && self.properties.is_empty()
            && self.required.is_empty()
            && self.additional_properties == AdditionalProperties::Allowed
            && self.items.is_none()
            && self.min_items.is_none()
            && self.max_items.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.minimum.is_none()
            && self.maximum.is_none()
            && self.pattern.is_none()
            && self.enumeration.is_empty()
            && self.one_of.is_empty()
            && self.any_of.is_empty()
            && self.all_of.is_empty()
            && !self.read_only
            && !self.write_only
    }
}

impl ApiSpec {
    /// Follow reference aliases from `id` down to a definition.
    ///
    /// Returns the id of the definition node together with the schema, or
    /// `None` when a reference names a missing component or the chain loops
    /// through references only.
    pub fn resolve_schema(&self, id: SchemaId) -> Option<(SchemaId, &Schema)> {
        let mut current = id;
        // A chain longer than the component count must revisit a node.
        for _ in 0..=self.components.len() {
            match self.schemas.get(current)? {
                SchemaNode::Definition(schema) => return Some((current, schema)),
                SchemaNode::Reference(name) => current = *self.components.get(name)?,
            }
        }
        None
    }

    /// The reference name held by `id`, if it is an alias node.
    pub fn reference_name(&self, id: SchemaId) -> Option<&str> {
        match self.schemas.get(id)? {
            SchemaNode::Reference(name) => Some(name),
            SchemaNode::Definition(_) => None,
        }
    }
}
