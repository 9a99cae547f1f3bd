//! Grouping of findings into report sections.

use oasguard_diff::{ChangeKind, ChangeSet, Element, Finding, Verdict};
use serde_json::Value;

/// A method bound to a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Upper-case method, empty when a path had no operations.
    pub method: String,
    pub path: String,
}

/// One finding inside a changed group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub verdict: Verdict,
    /// Location below the group's element, empty for findings on the element itself.
    pub location: String,
    pub message: String,
}

/// Findings sharing an operation (or a document-level element).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub title: String,
    pub endpoint: Option<Endpoint>,
    pub items: Vec<Item>,
}

/// Findings of a [`ChangeSet`] sorted into report sections.
#[derive(Debug, Clone)]
pub struct Summary {
    pub title: String,
    pub verdict: Verdict,
    pub new_endpoints: Vec<Endpoint>,
    pub deleted_endpoints: Vec<Endpoint>,
    pub deprecated_endpoints: Vec<Endpoint>,
    pub changed: Vec<Group>,
}

impl Summary {
    pub fn from_changes(changes: &ChangeSet) -> Self {
        let mut summary = Self {
            title: changes.element().to_string(),
            verdict: changes.verdict(),
            new_endpoints: Vec::new(),
            deleted_endpoints: Vec::new(),
            deprecated_endpoints: Vec::new(),
            changed: Vec::new(),
        };

        for finding in changes.findings() {
            summary.add(&finding);
        }

        summary
    }

    /// The closing line of every report.
    pub fn result_line(&self) -> &'static str {
        match self.verdict {
            Verdict::Breaking => "API changes broke backward compatibility",
            Verdict::Compatible => "API changes are backward compatible",
            Verdict::Unchanged => "No differences. Specifications are equivalent",
        }
    }

    fn add(&mut self, finding: &Finding<'_>) {
        let change = finding.change;
        let holder = finding.path.last().copied();

        match (change.kind, holder) {
            (ChangeKind::PathAdded, Some(Element::Path { template })) => {
                self.new_endpoints
                    .extend(path_endpoints(template, change.new.as_ref()));
            }
            (ChangeKind::PathRemoved, Some(Element::Path { template })) => {
                self.deleted_endpoints
                    .extend(path_endpoints(template, change.old.as_ref()));
            }
            (ChangeKind::OperationAdded, Some(Element::Operation { method, path })) => {
                self.new_endpoints.push(endpoint(method, path));
            }
            (ChangeKind::OperationRemoved, Some(Element::Operation { method, path })) => {
                self.deleted_endpoints.push(endpoint(method, path));
            }
            (ChangeKind::DeprecationChanged, Some(Element::Operation { method, path }))
                if change.new == Some(Value::Bool(true)) =>
            {
                self.deprecated_endpoints.push(endpoint(method, path));
            }
            _ => self.add_changed(finding),
        }
    }

    fn add_changed(&mut self, finding: &Finding<'_>) {
        // Group under the nearest operation, else under the first element
        // below the root.
        let anchor = finding
            .path
            .iter()
            .rposition(|e| matches!(e, Element::Operation { .. }))
            .unwrap_or(1.min(finding.path.len().saturating_sub(1)));

        let (title, endpoint) = match finding.path.get(anchor) {
            Some(Element::Operation { method, path }) => {
                (format!("{} {}", method, path), Some(endpoint(method, path)))
            }
            Some(element) if anchor > 0 => (element.to_string(), None),
            _ => ("document".to_string(), None),
        };

        let location = finding
            .path
            .iter()
            .skip(anchor + 1)
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(" > ");
        let item = Item {
            verdict: finding.change.verdict,
            location,
            message: finding.change.message.clone(),
        };

        match self.changed.iter_mut().find(|g| g.title == title) {
            Some(group) => group.items.push(item),
            None => self.changed.push(Group {
                title,
                endpoint,
                items: vec![item],
            }),
        }
    }
}

fn endpoint(method: &str, path: &str) -> Endpoint {
    Endpoint {
        method: method.to_string(),
        path: path.to_string(),
    }
}

fn path_endpoints(template: &str, methods: Option<&Value>) -> Vec<Endpoint> {
    let methods: Vec<&str> = methods
        .and_then(Value::as_array)
        .map(|m| m.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if methods.is_empty() {
        return vec![endpoint("", template)];
    }
    methods.into_iter().map(|m| endpoint(m, template)).collect()
}
