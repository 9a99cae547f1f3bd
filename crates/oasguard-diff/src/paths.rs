//! Path template matching across documents.
//!
//! Templates are matched on their shape: literal segments must be equal and
//! variables must sit at the same positions, whatever they are named.

use std::collections::{BTreeMap, BTreeSet};

use oasguard_spec_parser::{ApiSpec, PathItem};
use serde_json::Value;

use crate::changeset::{Change, ChangeKind, ChangeSet, Element};
use crate::engine::Comparison;
use crate::operation::compare_operation;
use crate::verdict::Verdict;

/// Normalize a path template.
///
/// - Collapses repeated slashes
/// - Strips trailing slash (except for root "/")
pub fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len());
    let mut prev_slash = false;

    for ch in path.chars() {
        if ch == '/' {
            if !prev_slash {
                normalized.push('/');
            }
            prev_slash = true;
        } else {
            normalized.push(ch);
            prev_slash = false;
        }
    }

    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }

    if normalized.is_empty() {
        "/".to_string()
    } else {
        normalized
    }
}

/// The matching key of a template: normalized, with every `{variable}`
/// replaced by `{}`.
pub fn template_key(template: &str) -> String {
    let normalized = normalize_path(template);
    let mut key = String::with_capacity(normalized.len());
    let mut in_variable = false;

    for ch in normalized.chars() {
        match ch {
            '{' if !in_variable => {
                in_variable = true;
                key.push_str("{}");
            }
            '}' if in_variable => in_variable = false,
            _ if in_variable => {}
            _ => key.push(ch),
        }
    }

    key
}

/// Variable names of a template, in order of appearance.
pub fn template_variables(template: &str) -> Vec<&str> {
    let mut variables = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        variables.push(&rest[start + 1..start + len]);
        rest = &rest[start + len + 1..];
    }
    variables
}

/// Old-to-new variable names for two matched templates, by position.
pub fn path_renames(old: &str, new: &str) -> BTreeMap<String, String> {
    template_variables(old)
        .into_iter()
        .zip(template_variables(new))
        .filter(|(o, n)| o != n)
        .map(|(o, n)| (o.to_string(), n.to_string()))
        .collect()
}

/// Paths of one document grouped by matching key.
///
/// The lexically first template claims each key; later templates with the
/// same shape are left unmatched.
struct Index<'a> {
    by_key: BTreeMap<String, &'a PathItem>,
    unmatched: Vec<&'a PathItem>,
}

impl<'a> Index<'a> {
    fn build(spec: &'a ApiSpec) -> Self {
        let mut by_key = BTreeMap::new();
        let mut unmatched = Vec::new();
        for item in spec.paths.values() {
            let key = template_key(&item.template);
            if by_key.contains_key(&key) {
                tracing::debug!(
                    template = %item.template,
                    key = %key,
                    "path template shadowed by an equivalent template"
                );
                unmatched.push(item);
            } else {
                by_key.insert(key, item);
            }
        }
        Self { by_key, unmatched }
    }
}

/// Methods of a path item, carried on path-level findings so reports can
/// list the affected endpoints.
fn methods(item: &PathItem) -> Value {
    Value::from(item.operations.keys().cloned().collect::<Vec<_>>())
}

fn path_added(item: &PathItem) -> ChangeSet {
    ChangeSet::single(
        Element::Path {
            template: item.template.clone(),
        },
        Change::new(ChangeKind::PathAdded, Verdict::Compatible, "path added")
            .with_new(methods(item)),
    )
}

fn path_removed(item: &PathItem) -> ChangeSet {
    ChangeSet::single(
        Element::Path {
            template: item.template.clone(),
        },
        Change::new(ChangeKind::PathRemoved, Verdict::Breaking, "path removed")
            .with_old(methods(item)),
    )
}

/// Compare every path of both documents, attaching one child per changed path.
pub(crate) fn compare_paths(cx: &mut Comparison<'_>, root: &mut ChangeSet) {
    let (old_spec, new_spec) = (cx.old, cx.new);
    let old = Index::build(old_spec);
    let new = Index::build(new_spec);

    let keys: BTreeSet<&String> = old.by_key.keys().chain(new.by_key.keys()).collect();
    for key in keys {
        let child = match (old.by_key.get(key), new.by_key.get(key)) {
            (Some(o), Some(n)) => compare_path_item(cx, o, n),
            (Some(o), None) => path_removed(o),
            (None, Some(n)) => path_added(n),
            (None, None) => continue,
        };
        root.push_child(child);
    }

    for item in old.unmatched {
        root.push_child(path_removed(item));
    }
    for item in new.unmatched {
        root.push_child(path_added(item));
    }
}

fn compare_path_item(cx: &mut Comparison<'_>, old: &PathItem, new: &PathItem) -> ChangeSet {
    let element = Element::Path {
        template: new.template.clone(),
    };
    let mut set = ChangeSet::new(element.clone());
    let renames = path_renames(&old.template, &new.template);

    let methods: BTreeSet<&String> = old
        .operations
        .keys()
        .chain(new.operations.keys())
        .collect();
    for method in methods {
        let child = match (old.operations.get(method), new.operations.get(method)) {
            (Some(o), Some(n)) => compare_operation(cx, &new.template, method, o, n, &renames),
            (Some(_), None) => ChangeSet::single(
                Element::Operation {
                    method: method.clone(),
                    path: old.template.clone(),
                },
                Change::new(
                    ChangeKind::OperationRemoved,
                    Verdict::Breaking,
                    "operation removed",
                ),
            ),
            (None, Some(_)) => ChangeSet::single(
                Element::Operation {
                    method: method.clone(),
                    path: new.template.clone(),
                },
                Change::new(
                    ChangeKind::OperationAdded,
                    Verdict::Compatible,
                    "operation added",
                ),
            ),
            (None, None) => continue,
        };
        set.push_child(child);
    }

    set.extend(
        cx.extensions
            .compare(&old.extensions, &new.extensions, &element, None),
    );

    set
}
