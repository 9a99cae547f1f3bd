//! Comparison of one matched (path, method) pair.

use std::collections::{BTreeMap, BTreeSet};

use oasguard_spec_parser::{
    Header, MediaType, Operation, RequestBody, Response, SecurityRequirement,
};
use serde_json::Value;

use crate::changeset::{Change, ChangeKind, ChangeSet, Element};
use crate::engine::Comparison;
use crate::parameters::compare_parameters;
use crate::schema::required_change;
use crate::verdict::{Direction, Verdict};

/// Compare two operations bound to the same method and matched template.
pub(crate) fn compare_operation(
    cx: &mut Comparison<'_>,
    path: &str,
    method: &str,
    old: &Operation,
    new: &Operation,
    renames: &BTreeMap<String, String>,
) -> ChangeSet {
    let element = Element::Operation {
        method: method.to_string(),
        path: path.to_string(),
    };
    let mut set = ChangeSet::new(element.clone());

    compare_parameters(cx, &mut set, &old.parameters, &new.parameters, renames);
    compare_request_body(cx, &mut set, old.request_body.as_ref(), new.request_body.as_ref());
    compare_responses(cx, &mut set, &old.responses, &new.responses);

    let (old_spec, new_spec) = (cx.old, cx.new);
    let old_security = old.security.as_deref().unwrap_or(&old_spec.security);
    let new_security = new.security.as_deref().unwrap_or(&new_spec.security);
    set.push_child(compare_security(old_security, new_security));

    if old.deprecated != new.deprecated {
        let message = if new.deprecated {
            "operation deprecated"
        } else {
            "operation no longer deprecated"
        };
        set.push(
            Change::new(ChangeKind::DeprecationChanged, Verdict::Compatible, message)
                .with_old(old.deprecated)
                .with_new(new.deprecated),
        );
    }

    set.extend(
        cx.extensions
            .compare(&old.extensions, &new.extensions, &element, None),
    );

    set
}

fn compare_request_body(
    cx: &mut Comparison<'_>,
    set: &mut ChangeSet,
    old: Option<&RequestBody>,
    new: Option<&RequestBody>,
) {
    let child = match (old, new) {
        (None, None) => return,
        (None, Some(body)) => {
            let (verdict, message) = if body.required {
                (Verdict::Breaking, "required request body added")
            } else {
                (Verdict::Compatible, "optional request body added")
            };
            ChangeSet::single(
                Element::RequestBody,
                Change::new(ChangeKind::RequestBodyAdded, verdict, message),
            )
        }
        (Some(_), None) => ChangeSet::single(
            Element::RequestBody,
            Change::new(
                ChangeKind::RequestBodyRemoved,
                Verdict::Breaking,
                "request body removed",
            ),
        ),
        (Some(old), Some(new)) => {
            let mut child = ChangeSet::new(Element::RequestBody);
            if old.required != new.required {
                child.push(required_change(old.required, new.required, Direction::Input));
            }
            compare_content(cx, &mut child, &old.content, &new.content, Direction::Input);
            child.extend(cx.extensions.compare(
                &old.extensions,
                &new.extensions,
                &Element::RequestBody,
                Some(Direction::Input),
            ));
            child
        }
    };
    set.push_child(child);
}

/// Compare media type maps. Schemas are compared in `direction`.
fn compare_content(
    cx: &mut Comparison<'_>,
    set: &mut ChangeSet,
    old: &BTreeMap<String, MediaType>,
    new: &BTreeMap<String, MediaType>,
    direction: Direction,
) {
    let names: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    for name in names {
        let element = Element::MediaType { name: name.clone() };
        let child = match (old.get(name), new.get(name)) {
            (Some(o), Some(n)) => cx
                .schemas
                .compare_optional(Element::Schema, o.schema, n.schema, direction)
                .with_element(element),
            (Some(_), None) => ChangeSet::single(
                element,
                Change::new(
                    ChangeKind::MediaTypeRemoved,
                    Verdict::Breaking,
                    "media type removed",
                ),
            ),
            (None, Some(_)) => ChangeSet::single(
                element,
                Change::new(
                    ChangeKind::MediaTypeAdded,
                    Verdict::Compatible,
                    "media type added",
                ),
            ),
            (None, None) => continue,
        };
        set.push_child(child);
    }
}

fn compare_responses(
    cx: &mut Comparison<'_>,
    set: &mut ChangeSet,
    old: &BTreeMap<String, Response>,
    new: &BTreeMap<String, Response>,
) {
    let codes: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    for code in codes {
        let element = Element::Response {
            status: code.clone(),
        };
        let child = match (old.get(code), new.get(code)) {
            (Some(o), Some(n)) => {
                let mut child = ChangeSet::new(element.clone());
                compare_content(cx, &mut child, &o.content, &n.content, Direction::Output);
                compare_headers(cx, &mut child, &o.headers, &n.headers);
                child.extend(cx.extensions.compare(
                    &o.extensions,
                    &n.extensions,
                    &element,
                    Some(Direction::Output),
                ));
                child
            }
            (Some(_), None) => ChangeSet::single(
                element,
                Change::new(
                    ChangeKind::ResponseRemoved,
                    Verdict::Breaking,
                    format!("response {} removed", code),
                ),
            ),
            (None, Some(_)) => ChangeSet::single(
                element,
                Change::new(
                    ChangeKind::ResponseAdded,
                    Verdict::Compatible,
                    format!("response {} added", code),
                ),
            ),
            (None, None) => continue,
        };
        set.push_child(child);
    }
}

fn compare_headers(
    cx: &mut Comparison<'_>,
    set: &mut ChangeSet,
    old: &BTreeMap<String, Header>,
    new: &BTreeMap<String, Header>,
) {
    let names: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    for name in names {
        let element = Element::Header { name: name.clone() };
        let child = match (old.get(name), new.get(name)) {
            (Some(o), Some(n)) => {
                let schema = cx
                    .schemas
                    .compare_optional(Element::Schema, o.schema, n.schema, Direction::Output);
                let mut header = ChangeSet::new(element);
                if o.required != n.required {
                    header.push(required_change(o.required, n.required, Direction::Output));
                }
                if o.deprecated != n.deprecated {
                    header.push(
                        Change::new(
                            ChangeKind::DeprecationChanged,
                            Verdict::Compatible,
                            if n.deprecated {
                                "header deprecated"
                            } else {
                                "header no longer deprecated"
                            },
                        )
                        .with_old(o.deprecated)
                        .with_new(n.deprecated),
                    );
                }
                header.push_child(schema);
                header
            }
            (Some(_), None) => ChangeSet::single(
                element,
                Change::new(ChangeKind::HeaderRemoved, Verdict::Breaking, "header removed"),
            ),
            (None, Some(_)) => ChangeSet::single(
                element,
                Change::new(ChangeKind::HeaderAdded, Verdict::Compatible, "header added"),
            ),
            (None, None) => continue,
        };
        set.push_child(child);
    }
}

/// Render a requirement as `scheme[scope, ...] + scheme`.
fn describe_requirement(requirement: &SecurityRequirement) -> String {
    if requirement.is_empty() {
        return "anonymous".to_string();
    }
    requirement
        .iter()
        .map(|(scheme, scopes)| {
            if scopes.is_empty() {
                scheme.clone()
            } else {
                format!("{}[{}]", scheme, scopes.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join(" + ")
}

fn requirement_value(requirement: &SecurityRequirement) -> Value {
    Value::Object(
        requirement
            .iter()
            .map(|(scheme, scopes)| (scheme.clone(), Value::from(scopes.clone())))
            .collect(),
    )
}

/// Requirements are compared as sets over the effective list.
fn compare_security(old: &[SecurityRequirement], new: &[SecurityRequirement]) -> ChangeSet {
    let mut set = ChangeSet::new(Element::Security);
    for requirement in new.iter().filter(|r| !old.contains(r)) {
        set.push(
            Change::new(
                ChangeKind::SecurityRequirementAdded,
                Verdict::Breaking,
                format!(
                    "security requirement {} added",
                    describe_requirement(requirement)
                ),
            )
            .with_new(requirement_value(requirement)),
        );
    }
    for requirement in old.iter().filter(|r| !new.contains(r)) {
        set.push(
            Change::new(
                ChangeKind::SecurityRequirementRemoved,
                Verdict::Compatible,
                format!(
                    "security requirement {} removed",
                    describe_requirement(requirement)
                ),
            )
            .with_old(requirement_value(requirement)),
        );
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiffConfig;
    use crate::extension::ExtensionRegistry;
    use oasguard_spec_parser::{parse_spec, ApiSpec};

    const HEADER: &str = r#"openapi: "3.0.3"
info:
  title: T
  version: "1"
"#;

    fn spec(body: &str) -> ApiSpec {
        parse_spec(&format!("{}{}", HEADER, body)).unwrap().spec
    }

    fn compare(old: &str, new: &str) -> ChangeSet {
        let (old, new) = (spec(old), spec(new));
        let config = DiffConfig::default();
        let registry = ExtensionRegistry::with_defaults();
        let mut cx = Comparison::new(&old, &new, &config, &registry);
        let old_op = &old.paths["/orders"].operations["POST"];
        let new_op = &new.paths["/orders"].operations["POST"];
        compare_operation(&mut cx, "/orders", "POST", old_op, new_op, &BTreeMap::new())
    }

    fn kinds(set: &ChangeSet) -> Vec<ChangeKind> {
        set.findings().iter().map(|f| f.change.kind).collect()
    }

    const BASE: &str = r#"paths:
  /orders:
    post:
      requestBody:
        content:
          application/json:
            schema:
              type: object
              properties:
                status: {type: string, enum: [A, B]}
      responses:
        "201":
          description: created
          headers:
            Location:
              required: true
              schema: {type: string}
        "404":
          description: missing
"#;

    #[test]
    fn identical_operations_are_unchanged() {
        assert!(compare(BASE, BASE).is_unchanged());
    }

    #[test]
    fn request_enum_narrowed_is_breaking() {
        let new = BASE.replace("enum: [A, B]", "enum: [A]");
        let set = compare(BASE, &new);
        assert_eq!(set.verdict(), Verdict::Breaking);
        let findings = set.findings();
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].location(),
            "request body > application/json > property 'status'"
        );
    }

    #[test]
    fn response_removed_is_breaking() {
        let new = BASE.replace("        \"404\":\n          description: missing\n", "");
        let set = compare(BASE, &new);
        assert_eq!(set.verdict(), Verdict::Breaking);
        assert_eq!(kinds(&set), vec![ChangeKind::ResponseRemoved]);
        assert_eq!(set.findings()[0].location(), "response 404");
    }

    #[test]
    fn response_added_is_compatible() {
        let new = format!("{}        \"409\":\n          description: conflict\n", BASE);
        let set = compare(BASE, &new);
        assert_eq!(set.verdict(), Verdict::Compatible);
        assert_eq!(kinds(&set), vec![ChangeKind::ResponseAdded]);
    }

    #[test]
    fn request_body_required_toggle() {
        let required = BASE.replace("      requestBody:\n", "      requestBody:\n        required: true\n");
        assert_eq!(compare(BASE, &required).verdict(), Verdict::Breaking);
        assert_eq!(compare(&required, BASE).verdict(), Verdict::Compatible);
    }

    #[test]
    fn media_type_added_and_removed() {
        let xml = BASE.replace(
            "          application/json:\n",
            "          application/xml:\n            schema: {type: string}\n          application/json:\n",
        );
        let added = compare(BASE, &xml);
        assert_eq!(added.verdict(), Verdict::Compatible);
        assert_eq!(kinds(&added), vec![ChangeKind::MediaTypeAdded]);

        let removed = compare(&xml, BASE);
        assert_eq!(removed.verdict(), Verdict::Breaking);
        assert_eq!(kinds(&removed), vec![ChangeKind::MediaTypeRemoved]);
    }

    #[test]
    fn header_removed_or_optional_is_breaking() {
        let optional = BASE.replace("              required: true\n", "");
        let set = compare(BASE, &optional);
        assert_eq!(set.verdict(), Verdict::Breaking);
        assert_eq!(set.findings()[0].location(), "response 201 > header 'location'");

        assert_eq!(compare(&optional, BASE).verdict(), Verdict::Compatible);
    }

    #[test]
    fn security_added_is_breaking_and_removed_is_compatible() {
        let secured = format!(
            "security:\n  - api_key: []\n{}",
            BASE
        );
        let set = compare(BASE, &secured);
        assert_eq!(set.verdict(), Verdict::Breaking);
        assert_eq!(kinds(&set), vec![ChangeKind::SecurityRequirementAdded]);
        assert!(set.findings()[0].change.message.contains("api_key"));

        assert_eq!(compare(&secured, BASE).verdict(), Verdict::Compatible);
    }

    #[test]
    fn operation_security_overrides_global() {
        let global = format!("security:\n  - api_key: []\n{}", BASE);
        let overridden = global.replace("    post:\n", "    post:\n      security:\n        - api_key: []\n");
        assert!(compare(&global, &overridden).is_unchanged());
    }

    #[test]
    fn deprecation_is_compatible() {
        let deprecated = BASE.replace("    post:\n", "    post:\n      deprecated: true\n");
        let set = compare(BASE, &deprecated);
        assert_eq!(set.verdict(), Verdict::Compatible);
        assert_eq!(kinds(&set), vec![ChangeKind::DeprecationChanged]);
        assert_eq!(set.changes()[0].new, Some(Value::Bool(true)));
    }

    #[test]
    fn sunset_moved_earlier_on_operation_is_breaking() {
        let old = BASE.replace(
            "    post:\n",
            "    post:\n      x-sunset: \"Wed, 31 Dec 2025 23:59:59 GMT\"\n",
        );
        let new = BASE.replace(
            "    post:\n",
            "    post:\n      x-sunset: \"Mon, 30 Jun 2025 00:00:00 GMT\"\n",
        );
        let set = compare(&old, &new);
        assert_eq!(set.verdict(), Verdict::Breaking);
        assert!(set.changes()[0].message.contains("POST /orders"));
    }
}
