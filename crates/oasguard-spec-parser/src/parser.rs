use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{Map, Value};

use crate::diagnostics::{Diagnostic, DiagnosticPolicy};
use crate::error::ParseError;
use crate::model::{
    AdditionalProperties, ApiSpec, Extensions, Header, MediaType, Operation, Parameter,
    ParameterLocation, PathItem, RequestBody, Response, Schema, SchemaArena, SchemaId,
    SchemaKind, SchemaNode, SecurityRequirement,
};

/// HTTP methods we recognize in OpenAPI paths.
/// Includes `query` from OpenAPI 3.2 (RFC 9110 extension).
const HTTP_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace", "query",
];

/// Prefix of references into the reusable schema table.
const COMPONENT_SCHEMA_PREFIX: &str = "#/components/schemas/";

/// Maximum number of `$ref` hops followed for non-schema objects.
const MAX_REF_HOPS: usize = 16;

/// A loaded document together with the non-fatal issues found in it.
#[derive(Debug, Clone)]
pub struct ParsedSpec {
    pub spec: ApiSpec,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolve a JSON Reference like `#/components/parameters/Page` from the spec root.
///
/// Only local references (`#/...`) are supported. Returns `None` for external refs.
fn resolve_ref<'a>(root: &'a Value, ref_path: &str) -> Option<&'a Value> {
    let pointer = ref_path.strip_prefix('#')?;
    if !pointer.starts_with('/') {
        return None;
    }
    root.pointer(pointer)
}

fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Parse an OpenAPI 3.x spec from a YAML/JSON string.
pub fn parse_spec(input: &str) -> Result<ParsedSpec, ParseError> {
    // Parse YAML (also handles JSON since JSON is valid YAML)
    let root: Value =
        serde_yaml::from_str(input).map_err(|e| ParseError::ParseError(e.to_string()))?;

    let root_obj = root
        .as_object()
        .ok_or_else(|| ParseError::ParseError("spec root must be an object".into()))?;

    let version = detect_version(root_obj)?;

    let info = root_obj
        .get("info")
        .and_then(|v| v.as_object())
        .ok_or_else(|| ParseError::SchemaError("missing 'info' object".into()))?;

    let title = info
        .get("title")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ParseError::SchemaError("missing 'info.title'".into()))?
        .to_string();

    let api_version = info
        .get("version")
        .and_then(|v| v.as_str())
        .unwrap_or("0.0.0")
        .to_string();

    let mut loader = Loader::new(&root);
    let components = loader.parse_components(root_obj);
    let security_schemes: BTreeMap<String, Value> = root_obj
        .get("components")
        .and_then(|c| c.get("securitySchemes"))
        .and_then(|v| v.as_object())
        .map(|schemes| {
            schemes
                .iter()
                .map(|(name, scheme)| {
                    let pointer = format!("/components/securitySchemes/{}", escape(name));
                    let resolved = loader.resolve_local(scheme, &pointer).cloned();
                    (name.clone(), resolved.unwrap_or(Value::Null))
                })
                .collect()
        })
        .unwrap_or_default();
    let security = root_obj
        .get("security")
        .map(|v| loader.parse_security(v, "/security"))
        .unwrap_or_default();
    let paths = loader.parse_paths(root_obj);

    let spec = ApiSpec {
        filename: None,
        version,
        title,
        api_version,
        paths,
        schemas: loader.arena,
        components,
        security_schemes,
        security,
        extensions: extract_extensions(root_obj),
    };

    Ok(ParsedSpec {
        spec,
        diagnostics: loader.diagnostics,
    })
}

/// Load a spec from a file path, applying `policy` to any diagnostics.
pub fn load_spec(path: &Path, policy: DiagnosticPolicy) -> Result<ApiSpec, ParseError> {
    let content = std::fs::read_to_string(path)?;
    let ParsedSpec {
        mut spec,
        diagnostics,
    } = parse_spec(&content)?;
    policy.process(&path.display().to_string(), &diagnostics)?;
    spec.filename = path
        .file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string());
    tracing::debug!(
        path = %path.display(),
        paths = spec.paths.len(),
        schemas = spec.schemas.len(),
        diagnostics = diagnostics.len(),
        "spec loaded"
    );
    Ok(spec)
}

/// Check for a supported `openapi` field and return the version.
fn detect_version(root: &Map<String, Value>) -> Result<String, ParseError> {
    let version = root
        .get("openapi")
        .and_then(|v| v.as_str())
        .ok_or(ParseError::UnknownFormat)?;
    if !version.starts_with("3.") {
        tracing::debug!(version, "unsupported OpenAPI version");
        return Err(ParseError::UnknownFormat);
    }
    Ok(version.to_string())
}

/// Extract all `x-*` keys from an object.
fn extract_extensions(obj: &Map<String, Value>) -> Extensions {
    obj.iter()
        .filter(|(k, _)| k.starts_with("x-"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn get_bool(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

fn get_string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// Walks the raw document, filling the schema arena and collecting diagnostics.
struct Loader<'a> {
    root: &'a Value,
    arena: SchemaArena,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Loader<'a> {
    fn new(root: &'a Value) -> Self {
        Self {
            root,
            arena: SchemaArena::new(),
            diagnostics: Vec::new(),
        }
    }

    fn report(&mut self, pointer: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(pointer, message));
    }

    /// Follow `$ref` on a non-schema object (parameter, response, ...).
    fn resolve_local(&mut self, value: &'a Value, pointer: &str) -> Option<&'a Value> {
        let mut current = value;
        for _ in 0..MAX_REF_HOPS {
            let Some(ref_str) = current.get("$ref").and_then(|v| v.as_str()) else {
                return Some(current);
            };
            match resolve_ref(self.root, ref_str) {
                Some(target) => current = target,
                None => {
                    self.report(pointer, format!("unresolved $ref: {}", ref_str));
                    return None;
                }
            }
        }
        self.report(pointer, "$ref chain too long or circular");
        None
    }

    fn parse_components(&mut self, root: &'a Map<String, Value>) -> BTreeMap<String, SchemaId> {
        let Some(schemas) = root
            .get("components")
            .and_then(|c| c.get("schemas"))
            .and_then(|v| v.as_object())
        else {
            return BTreeMap::new();
        };
        schemas
            .iter()
            .map(|(name, value)| {
                let pointer = format!("/components/schemas/{}", escape(name));
                (name.clone(), self.parse_schema(value, &pointer))
            })
            .collect()
    }

    /// Parse a schema into the arena.
    ///
    /// `$ref` nodes become [`SchemaNode::Reference`] without descending into the
    /// target, so recursive definitions need no special handling here.
    fn parse_schema(&mut self, value: &'a Value, pointer: &str) -> SchemaId {
        let Some(obj) = value.as_object() else {
            if value.as_bool() != Some(true) {
                self.report(pointer, "schema must be an object");
            }
            return self.arena.push(SchemaNode::Definition(Box::default()));
        };

        if let Some(ref_str) = obj.get("$ref").and_then(|v| v.as_str()) {
            let name = match ref_str.strip_prefix(COMPONENT_SCHEMA_PREFIX) {
                Some(escaped) => unescape(escaped),
                None => ref_str.to_string(),
            };
            let defined = self
                .root
                .get("components")
                .and_then(|c| c.get("schemas"))
                .and_then(|s| s.get(&name))
                .is_some();
            if !defined {
                self.report(pointer, format!("unresolved $ref: {}", ref_str));
            }
            return self.arena.push(SchemaNode::Reference(name));
        }

        let mut schema = Schema {
            nullable: get_bool(obj, "nullable"),
            format: get_string(obj, "format"),
            pattern: get_string(obj, "pattern"),
            min_items: obj.get("minItems").and_then(|v| v.as_u64()),
            max_items: obj.get("maxItems").and_then(|v| v.as_u64()),
            min_length: obj.get("minLength").and_then(|v| v.as_u64()),
            max_length: obj.get("maxLength").and_then(|v| v.as_u64()),
            minimum: obj.get("minimum").and_then(|v| v.as_f64()),
            maximum: obj.get("maximum").and_then(|v| v.as_f64()),
            default: obj.get("default").cloned(),
            read_only: get_bool(obj, "readOnly"),
            write_only: get_bool(obj, "writeOnly"),
            deprecated: get_bool(obj, "deprecated"),
            extensions: extract_extensions(obj),
            ..Default::default()
        };

        match obj.get("type") {
            Some(Value::String(name)) => {
                schema.kind = SchemaKind::parse(name);
                if schema.kind.is_none() {
                    self.report(pointer, format!("unknown schema type '{}'", name));
                }
            }
            // OpenAPI 3.1: `type: [string, "null"]`
            Some(Value::Array(names)) => {
                let kinds: Vec<SchemaKind> = names
                    .iter()
                    .filter_map(|v| v.as_str())
                    .filter_map(SchemaKind::parse)
                    .collect();
                if kinds.contains(&SchemaKind::Null) {
                    schema.nullable = true;
                }
                let mut non_null = kinds.iter().filter(|k| **k != SchemaKind::Null);
                match (non_null.next(), non_null.next()) {
                    (Some(kind), None) => schema.kind = Some(*kind),
                    (None, None) if !kinds.is_empty() => schema.kind = Some(SchemaKind::Null),
                    _ => {}
                }
            }
            Some(_) => self.report(pointer, "'type' must be a string or an array"),
            None => {}
        }

        // 3.0 uses booleans, 3.1 uses the bound itself
        match obj.get("exclusiveMinimum") {
            Some(Value::Bool(flag)) => schema.exclusive_minimum = *flag,
            Some(Value::Number(bound)) => {
                schema.minimum = bound.as_f64();
                schema.exclusive_minimum = true;
            }
            _ => {}
        }
        match obj.get("exclusiveMaximum") {
            Some(Value::Bool(flag)) => schema.exclusive_maximum = *flag,
            Some(Value::Number(bound)) => {
                schema.maximum = bound.as_f64();
                schema.exclusive_maximum = true;
            }
            _ => {}
        }

        if let Some(values) = obj.get("enum").and_then(|v| v.as_array()) {
            schema.enumeration = values.clone();
        }

        if let Some(required) = obj.get("required").and_then(|v| v.as_array()) {
            schema.required = required
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect();
        }

        if let Some(properties) = obj.get("properties").and_then(|v| v.as_object()) {
            for (name, prop) in properties {
                let child = format!("{}/properties/{}", pointer, escape(name));
                let id = self.parse_schema(prop, &child);
                schema.properties.insert(name.clone(), id);
            }
        }

        schema.additional_properties = match obj.get("additionalProperties") {
            Some(Value::Bool(false)) => AdditionalProperties::Denied,
            Some(value) if value.is_object() => {
                let child = format!("{}/additionalProperties", pointer);
                AdditionalProperties::Schema(self.parse_schema(value, &child))
            }
            _ => AdditionalProperties::Allowed,
        };

        if let Some(items) = obj.get("items") {
            let child = format!("{}/items", pointer);
            schema.items = Some(self.parse_schema(items, &child));
        }

        schema.one_of = self.parse_branches(obj, "oneOf", pointer);
        schema.any_of = self.parse_branches(obj, "anyOf", pointer);
        schema.all_of = self.parse_branches(obj, "allOf", pointer);

        self.arena.push(SchemaNode::Definition(Box::new(schema)))
    }

    fn parse_branches(
        &mut self,
        obj: &'a Map<String, Value>,
        keyword: &str,
        pointer: &str,
    ) -> Vec<SchemaId> {
        let Some(branches) = obj.get(keyword).and_then(|v| v.as_array()) else {
            return Vec::new();
        };
        branches
            .iter()
            .enumerate()
            .map(|(i, branch)| {
                let child = format!("{}/{}/{}", pointer, keyword, i);
                self.parse_schema(branch, &child)
            })
            .collect()
    }

    fn parse_optional_schema(&mut self, value: Option<&'a Value>, pointer: &str) -> Option<SchemaId> {
        value.map(|v| self.parse_schema(v, pointer))
    }

    /// Parse a `content` map into media types.
    fn parse_content(&mut self, obj: &'a Map<String, Value>, pointer: &str) -> BTreeMap<String, MediaType> {
        let Some(content) = obj.get("content").and_then(|v| v.as_object()) else {
            return BTreeMap::new();
        };
        content
            .iter()
            .map(|(media_type, media_obj)| {
                let child = format!("{}/content/{}/schema", pointer, escape(media_type));
                let schema = self.parse_optional_schema(media_obj.get("schema"), &child);
                (media_type.clone(), MediaType { schema })
            })
            .collect()
    }

    fn parse_security(&mut self, value: &'a Value, pointer: &str) -> Vec<SecurityRequirement> {
        let Some(requirements) = value.as_array() else {
            self.report(pointer, "security must be an array");
            return Vec::new();
        };
        requirements
            .iter()
            .filter_map(|req| req.as_object())
            .map(|req| {
                req.iter()
                    .map(|(scheme, scopes)| {
                        let mut scopes: Vec<String> = scopes
                            .as_array()
                            .map(|arr| {
                                arr.iter()
                                    .filter_map(|s| s.as_str())
                                    .map(|s| s.to_string())
                                    .collect()
                            })
                            .unwrap_or_default();
                        scopes.sort();
                        (scheme.clone(), scopes)
                    })
                    .collect()
            })
            .collect()
    }

    /// Parse OpenAPI 3.x paths into path items.
    fn parse_paths(&mut self, root: &'a Map<String, Value>) -> BTreeMap<String, PathItem> {
        let mut items = BTreeMap::new();

        // No paths is valid (empty API)
        let Some(paths) = root.get("paths").and_then(|v| v.as_object()) else {
            return items;
        };

        for (path, path_value) in paths {
            let pointer = format!("/paths/{}", escape(path));
            let Some(resolved) = self.resolve_local(path_value, &pointer) else {
                continue;
            };
            let Some(path_obj) = resolved.as_object() else {
                self.report(&pointer, "path item must be an object");
                continue;
            };

            // Path-level parameters (inherited by all operations)
            let path_params = self.parse_parameters(path_obj, &pointer);

            let mut operations = BTreeMap::new();
            for method in HTTP_METHODS {
                if let Some(op_value) = path_obj.get(*method) {
                    let op_pointer = format!("{}/{}", pointer, method);
                    if let Some(op) = self.parse_operation(op_value, &path_params, &op_pointer) {
                        operations.insert(method.to_uppercase(), op);
                    }
                }
            }

            // OpenAPI 3.2: additionalOperations (custom HTTP methods)
            if let Some(additional) = path_obj
                .get("additionalOperations")
                .and_then(|v| v.as_object())
            {
                for (method_name, op_value) in additional {
                    let op_pointer = format!("{}/additionalOperations/{}", pointer, escape(method_name));
                    if let Some(op) = self.parse_operation(op_value, &path_params, &op_pointer) {
                        operations.insert(method_name.to_uppercase(), op);
                    }
                }
            }

            items.insert(
                path.clone(),
                PathItem {
                    template: path.clone(),
                    operations,
                    extensions: extract_extensions(path_obj),
                },
            );
        }

        items
    }

    fn parse_operation(
        &mut self,
        value: &'a Value,
        path_params: &[Parameter],
        pointer: &str,
    ) -> Option<Operation> {
        let Some(op_obj) = value.as_object() else {
            self.report(pointer, "operation must be an object");
            return None;
        };

        // Operation-level parameters override path-level ones with the same key
        let own = self.parse_parameters(op_obj, pointer);
        let mut parameters: Vec<Parameter> = path_params
            .iter()
            .filter(|p| !own.iter().any(|o| o.key() == p.key()))
            .cloned()
            .collect();
        parameters.extend(own);

        let request_body = op_obj
            .get("requestBody")
            .and_then(|body| self.parse_request_body(body, &format!("{}/requestBody", pointer)));

        let mut responses = BTreeMap::new();
        if let Some(map) = op_obj.get("responses").and_then(|v| v.as_object()) {
            for (status, response) in map {
                let child = format!("{}/responses/{}", pointer, escape(status));
                if let Some(parsed) = self.parse_response(response, &child) {
                    responses.insert(status.clone(), parsed);
                }
            }
        }

        let security = op_obj
            .get("security")
            .map(|v| self.parse_security(v, &format!("{}/security", pointer)));

        Some(Operation {
            operation_id: get_string(op_obj, "operationId"),
            parameters,
            request_body,
            responses,
            security,
            deprecated: get_bool(op_obj, "deprecated"),
            extensions: extract_extensions(op_obj),
        })
    }

    /// Parse parameters from a path item or operation object.
    ///
    /// OpenAPI 3.2: `in: querystring` parameters use `content` instead of `schema`.
    /// The schema is extracted from `content.<media-type>.schema`.
    fn parse_parameters(&mut self, obj: &'a Map<String, Value>, pointer: &str) -> Vec<Parameter> {
        let Some(arr) = obj.get("parameters").and_then(|v| v.as_array()) else {
            return Vec::new();
        };

        let mut params = Vec::with_capacity(arr.len());
        for (i, item) in arr.iter().enumerate() {
            let param_pointer = format!("{}/parameters/{}", pointer, i);
            let Some(param_obj) = self
                .resolve_local(item, &param_pointer)
                .and_then(|v| v.as_object())
            else {
                continue;
            };
            let Some(name) = param_obj.get("name").and_then(|v| v.as_str()) else {
                self.report(&param_pointer, "parameter has no name");
                continue;
            };
            let raw_location = param_obj.get("in").and_then(|v| v.as_str()).unwrap_or("");
            let Some(location) = ParameterLocation::parse(raw_location) else {
                self.report(
                    &param_pointer,
                    format!("parameter '{}' has invalid location '{}'", name, raw_location),
                );
                continue;
            };

            let schema_pointer = format!("{}/schema", param_pointer);
            let schema = match param_obj.get("schema") {
                Some(schema) if location != ParameterLocation::QueryString => {
                    Some(self.parse_schema(schema, &schema_pointer))
                }
                _ => self.parse_content_schema(param_obj, &param_pointer),
            };

            params.push(Parameter {
                name: name.to_string(),
                location,
                // Path parameters are always required
                required: location == ParameterLocation::Path || get_bool(param_obj, "required"),
                deprecated: get_bool(param_obj, "deprecated"),
                schema,
                extensions: extract_extensions(param_obj),
            });
        }
        params
    }

    /// Extract schema from a `content` map (first media type entry).
    fn parse_content_schema(&mut self, obj: &'a Map<String, Value>, pointer: &str) -> Option<SchemaId> {
        let content = obj.get("content")?.as_object()?;
        // Use the first (and typically only) media type entry
        let (media_type, media_obj) = content.iter().next()?;
        let child = format!("{}/content/{}/schema", pointer, escape(media_type));
        self.parse_optional_schema(media_obj.get("schema"), &child)
    }

    /// Parse request body from an operation object.
    fn parse_request_body(&mut self, value: &'a Value, pointer: &str) -> Option<RequestBody> {
        let body = self.resolve_local(value, pointer)?.as_object()?;
        Some(RequestBody {
            required: get_bool(body, "required"),
            content: self.parse_content(body, pointer),
            extensions: extract_extensions(body),
        })
    }

    fn parse_response(&mut self, value: &'a Value, pointer: &str) -> Option<Response> {
        let response = self.resolve_local(value, pointer)?.as_object()?;
        let mut headers = BTreeMap::new();
        if let Some(map) = response.get("headers").and_then(|v| v.as_object()) {
            for (name, header) in map {
                let child = format!("{}/headers/{}", pointer, escape(name));
                let Some(header_obj) = self
                    .resolve_local(header, &child)
                    .and_then(|v| v.as_object())
                else {
                    continue;
                };
                let schema = match header_obj.get("schema") {
                    Some(schema) => Some(self.parse_schema(schema, &format!("{}/schema", child))),
                    None => self.parse_content_schema(header_obj, &child),
                };
                // Header names are case-insensitive on the wire
                headers.insert(
                    name.to_lowercase(),
                    Header {
                        required: get_bool(header_obj, "required"),
                        deprecated: get_bool(header_obj, "deprecated"),
                        schema,
                    },
                );
            }
        }
        Some(Response {
            content: self.parse_content(response, pointer),
            headers,
            extensions: extract_extensions(response),
        })
    }
}
