//! Parameter set comparison.

use std::collections::BTreeMap;

use oasguard_spec_parser::{Parameter, ParameterLocation};

use crate::changeset::{Change, ChangeKind, ChangeSet, Element};
use crate::engine::Comparison;
use crate::schema::required_change;
use crate::verdict::{Direction, Verdict};

type ParameterKey = (String, ParameterLocation);

/// Compare the effective parameters of two matched operations.
///
/// `renames` maps old path variable names to their new names, so that a
/// renamed template variable still matches its parameter.
pub(crate) fn compare_parameters(
    cx: &mut Comparison<'_>,
    set: &mut ChangeSet,
    old: &[Parameter],
    new: &[Parameter],
    renames: &BTreeMap<String, String>,
) {
    let old_by_key: BTreeMap<ParameterKey, &Parameter> = old
        .iter()
        .map(|p| {
            let name = match p.location {
                ParameterLocation::Path => renames.get(&p.name).unwrap_or(&p.name),
                _ => &p.name,
            };
            ((name.clone(), p.location), p)
        })
        .collect();
    let new_by_key: BTreeMap<ParameterKey, &Parameter> = new
        .iter()
        .map(|p| ((p.name.clone(), p.location), p))
        .collect();

    let mut removed = Vec::new();
    for (key, old_param) in &old_by_key {
        match new_by_key.get(key) {
            Some(new_param) => set.push_child(compare_parameter(cx, old_param, new_param)),
            None => removed.push(*old_param),
        }
    }
    let mut added: Vec<&Parameter> = new_by_key
        .iter()
        .filter(|(key, _)| !old_by_key.contains_key(*key))
        .map(|(_, p)| *p)
        .collect();

    // A leftover on each side sharing a name that is unique among the
    // leftovers is the same parameter moved to another location.
    let moved: Vec<(&Parameter, &Parameter)> = removed
        .iter()
        .filter(|o| unique(&removed, &o.name) && unique(&added, &o.name))
        .filter_map(|o| added.iter().find(|n| n.name == o.name).map(|n| (*o, *n)))
        .collect();

    for (old_param, new_param) in moved {
        removed.retain(|p| !std::ptr::eq(*p, old_param));
        added.retain(|p| !std::ptr::eq(*p, new_param));

        let mut child = compare_parameter(cx, old_param, new_param);
        child.push(
            Change::new(
                ChangeKind::ParameterLocationChanged,
                Verdict::Breaking,
                format!(
                    "moved from {} to {}",
                    old_param.location, new_param.location
                ),
            )
            .with_old(old_param.location.as_str())
            .with_new(new_param.location.as_str()),
        );
        set.push_child(child);
    }

    for param in removed {
        let (verdict, label) = if param.required {
            (Verdict::Breaking, "required")
        } else {
            (Verdict::Compatible, "optional")
        };
        set.push_child(ChangeSet::single(
            element(param),
            Change::new(
                ChangeKind::ParameterRemoved,
                verdict,
                format!("{} parameter removed", label),
            ),
        ));
    }

    for param in added {
        let (verdict, label) = if param.required {
            (Verdict::Breaking, "required")
        } else {
            (Verdict::Compatible, "optional")
        };
        set.push_child(ChangeSet::single(
            element(param),
            Change::new(
                ChangeKind::ParameterAdded,
                verdict,
                format!("{} parameter added", label),
            ),
        ));
    }
}

fn unique(params: &[&Parameter], name: &str) -> bool {
    params.iter().filter(|p| p.name == name).count() == 1
}

fn element(param: &Parameter) -> Element {
    Element::Parameter {
        name: param.name.clone(),
        location: param.location,
    }
}

fn compare_parameter(cx: &mut Comparison<'_>, old: &Parameter, new: &Parameter) -> ChangeSet {
    let element = element(new);
    let mut set = ChangeSet::new(element.clone());

    if old.required != new.required {
        set.push(required_change(old.required, new.required, Direction::Input));
    }

    if old.deprecated != new.deprecated {
        let message = if new.deprecated {
            "parameter deprecated"
        } else {
            "parameter no longer deprecated"
        };
        set.push(
            Change::new(ChangeKind::DeprecationChanged, Verdict::Compatible, message)
                .with_old(old.deprecated)
                .with_new(new.deprecated),
        );
    }

    let schema = cx
        .schemas
        .compare_optional(Element::Schema, old.schema, new.schema, Direction::Input);
    set.push_child(schema);

    set.extend(cx.extensions.compare(
        &old.extensions,
        &new.extensions,
        &element,
        Some(Direction::Input),
    ));

    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiffConfig;
    use crate::extension::ExtensionRegistry;
    use oasguard_spec_parser::{parse_spec, ApiSpec};

    fn spec(parameters: &str) -> ApiSpec {
        let indented: String = parameters
            .lines()
            .map(|l| format!("        {}\n", l))
            .collect();
        let yaml = format!(
            r#"openapi: "3.0.3"
info:
  title: T
  version: "1"
paths:
  /items/{{id}}:
    get:
      parameters:
{}      responses:
        "200":
          description: ok
"#,
            indented
        );
        parse_spec(&yaml).unwrap().spec
    }

    fn compare(old: &str, new: &str, renames: &[(&str, &str)]) -> ChangeSet {
        let (old, new) = (spec(old), spec(new));
        let config = DiffConfig::default();
        let registry = ExtensionRegistry::new();
        let mut cx = Comparison::new(&old, &new, &config, &registry);
        let renames: BTreeMap<String, String> = renames
            .iter()
            .map(|(o, n)| (o.to_string(), n.to_string()))
            .collect();
        let mut set = ChangeSet::new(Element::Operation {
            method: "GET".into(),
            path: "/items/{id}".into(),
        });
        let old_params = &old.paths["/items/{id}"].operations["GET"].parameters;
        let new_params = &new.paths["/items/{id}"].operations["GET"].parameters;
        compare_parameters(&mut cx, &mut set, old_params, new_params, &renames);
        set
    }

    fn kinds(set: &ChangeSet) -> Vec<ChangeKind> {
        set.findings().iter().map(|f| f.change.kind).collect()
    }

    const ID: &str = "- {name: id, in: path, required: true, schema: {type: string}}";

    #[test]
    fn required_query_parameter_removed_is_breaking() {
        let old = format!("{}\n- {{name: page, in: query, required: true, schema: {{type: integer}}}}", ID);
        let set = compare(&old, ID, &[]);
        assert_eq!(set.verdict(), Verdict::Breaking);
        assert_eq!(kinds(&set), vec![ChangeKind::ParameterRemoved]);
        assert_eq!(set.findings()[0].location(), "query parameter 'page'");
    }

    #[test]
    fn optional_parameter_removed_or_added_is_compatible() {
        let with_page = format!("{}\n- {{name: page, in: query, schema: {{type: integer}}}}", ID);
        assert_eq!(compare(&with_page, ID, &[]).verdict(), Verdict::Compatible);
        assert_eq!(compare(ID, &with_page, &[]).verdict(), Verdict::Compatible);
    }

    #[test]
    fn required_parameter_added_is_breaking() {
        let with_header = format!("{}\n- {{name: X-Tenant, in: header, required: true}}", ID);
        let set = compare(ID, &with_header, &[]);
        assert_eq!(set.verdict(), Verdict::Breaking);
        assert_eq!(kinds(&set), vec![ChangeKind::ParameterAdded]);
    }

    #[test]
    fn parameter_becoming_required_is_breaking() {
        let optional = format!("{}\n- {{name: page, in: query}}", ID);
        let required = format!("{}\n- {{name: page, in: query, required: true}}", ID);
        assert_eq!(compare(&optional, &required, &[]).verdict(), Verdict::Breaking);
        assert_eq!(compare(&required, &optional, &[]).verdict(), Verdict::Compatible);
    }

    #[test]
    fn location_change_is_reported_once() {
        let query = format!("{}\n- {{name: token, in: query}}", ID);
        let header = format!("{}\n- {{name: token, in: header}}", ID);
        let set = compare(&query, &header, &[]);
        assert_eq!(set.verdict(), Verdict::Breaking);
        assert_eq!(kinds(&set), vec![ChangeKind::ParameterLocationChanged]);
    }

    #[test]
    fn renamed_path_variable_is_not_a_change() {
        let renamed = "- {name: itemId, in: path, required: true, schema: {type: string}}";
        let set = compare(ID, renamed, &[("id", "itemId")]);
        assert!(set.is_unchanged());
    }

    #[test]
    fn schema_is_compared_as_input() {
        let old = format!("{}\n- {{name: limit, in: query, schema: {{type: integer, maximum: 100}}}}", ID);
        let new = format!("{}\n- {{name: limit, in: query, schema: {{type: integer, maximum: 50}}}}", ID);
        let set = compare(&old, &new, &[]);
        assert_eq!(set.verdict(), Verdict::Breaking);
        assert_eq!(
            set.findings()[0].location(),
            "query parameter 'limit' > schema"
        );
    }

    #[test]
    fn deprecation_is_advisory() {
        let old = format!("{}\n- {{name: q, in: query}}", ID);
        let new = format!("{}\n- {{name: q, in: query, deprecated: true}}", ID);
        let set = compare(&old, &new, &[]);
        assert_eq!(set.verdict(), Verdict::Compatible);
        assert_eq!(kinds(&set), vec![ChangeKind::DeprecationChanged]);
    }
}
