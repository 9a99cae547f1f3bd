//! The comparison result tree.
//!
//! A [`ChangeSet`] mirrors the compared structure. Each node carries the
//! element it describes, its own findings, its children, and a verdict that is
//! always the maximum of the findings and the children's verdicts.

use oasguard_spec_parser::ParameterLocation;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::verdict::Verdict;

/// The identity of a compared element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Specification { old: String, new: String },
    Path { template: String },
    Operation { method: String, path: String },
    Parameter { name: String, location: ParameterLocation },
    RequestBody,
    Response { status: String },
    MediaType { name: String },
    Header { name: String },
    Schema,
    Property { name: String },
    Items,
    AdditionalProperties,
    Branch { keyword: String, index: usize },
    Security,
    SecuritySchemes,
    SecurityScheme { name: String },
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Specification { old, new } => write!(f, "{} -> {}", old, new),
            Self::Path { template } => f.write_str(template),
            Self::Operation { method, path } => write!(f, "{} {}", method, path),
            Self::Parameter { name, location } => write!(f, "{} parameter '{}'", location, name),
            Self::RequestBody => f.write_str("request body"),
            Self::Response { status } => write!(f, "response {}", status),
            Self::MediaType { name } => f.write_str(name),
            Self::Header { name } => write!(f, "header '{}'", name),
            Self::Schema => f.write_str("schema"),
            Self::Property { name } => write!(f, "property '{}'", name),
            Self::Items => f.write_str("items"),
            Self::AdditionalProperties => f.write_str("additionalProperties"),
            Self::Branch { keyword, index } => write!(f, "{}[{}]", keyword, index),
            Self::Security => f.write_str("security"),
            Self::SecuritySchemes => f.write_str("securitySchemes"),
            Self::SecurityScheme { name } => write!(f, "security scheme '{}'", name),
        }
    }
}

/// What kind of difference a [`Change`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    PathAdded,
    PathRemoved,
    OperationAdded,
    OperationRemoved,
    ParameterAdded,
    ParameterRemoved,
    ParameterLocationChanged,
    RequiredChanged,
    RequestBodyAdded,
    RequestBodyRemoved,
    MediaTypeAdded,
    MediaTypeRemoved,
    ResponseAdded,
    ResponseRemoved,
    HeaderAdded,
    HeaderRemoved,
    SchemaAdded,
    SchemaRemoved,
    TypeChanged,
    FormatChanged,
    PropertyAdded,
    PropertyRemoved,
    AdditionalPropertiesChanged,
    EnumChanged,
    EnumValueAdded,
    EnumValueRemoved,
    ConstraintChanged,
    NullableChanged,
    BranchAdded,
    BranchRemoved,
    UnresolvedReference,
    SecurityRequirementAdded,
    SecurityRequirementRemoved,
    SecuritySchemeAdded,
    SecuritySchemeRemoved,
    SecuritySchemeChanged,
    DeprecationChanged,
    ExtensionAdded,
    ExtensionRemoved,
    ExtensionChanged,
}

/// A single leaf-level difference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    pub kind: ChangeKind,
    pub verdict: Verdict,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<Value>,
}

impl Change {
    pub fn new(kind: ChangeKind, verdict: Verdict, message: impl Into<String>) -> Self {
        Self {
            kind,
            verdict,
            message: message.into(),
            old: None,
            new: None,
        }
    }

    /// Attach the value on the old side.
    pub fn with_old(mut self, value: impl Into<Value>) -> Self {
        self.old = Some(value.into());
        self
    }

    /// Attach the value on the new side.
    pub fn with_new(mut self, value: impl Into<Value>) -> Self {
        self.new = Some(value.into());
        self
    }
}

/// A node of the comparison result tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeSet {
    element: Element,
    verdict: Verdict,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    changes: Vec<Change>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<ChangeSet>,
}

impl ChangeSet {
    /// An empty, unchanged node.
    pub fn new(element: Element) -> Self {
        Self {
            element,
            verdict: Verdict::Unchanged,
            changes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// A node holding exactly one finding.
    pub fn single(element: Element, change: Change) -> Self {
        let mut set = Self::new(element);
        set.push(change);
        set
    }

    /// Replace the element this node describes.
    pub fn with_element(mut self, element: Element) -> Self {
        self.element = element;
        self
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn children(&self) -> &[ChangeSet] {
        &self.children
    }

    /// True iff nothing differs anywhere below this node.
    pub fn is_unchanged(&self) -> bool {
        self.verdict == Verdict::Unchanged
    }

    /// True iff no breaking change exists below this node.
    pub fn is_compatible(&self) -> bool {
        self.verdict != Verdict::Breaking
    }

    pub fn is_breaking(&self) -> bool {
        self.verdict == Verdict::Breaking
    }

    /// Record a finding on this node.
    pub fn push(&mut self, change: Change) {
        self.verdict = self.verdict.max(change.verdict);
        self.changes.push(change);
    }

    pub fn extend(&mut self, changes: impl IntoIterator<Item = Change>) {
        for change in changes {
            self.push(change);
        }
    }

    /// Attach a child node. Unchanged children are dropped.
    pub fn push_child(&mut self, child: ChangeSet) {
        if child.is_unchanged() {
            return;
        }
        self.verdict = self.verdict.max(child.verdict);
        self.children.push(child);
    }

    /// Every finding in the tree, depth-first, with the element chain leading to it.
    pub fn findings(&self) -> Vec<Finding<'_>> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        self.collect_findings(&mut path, &mut out);
        out
    }

    fn collect_findings<'a>(&'a self, path: &mut Vec<&'a Element>, out: &mut Vec<Finding<'a>>) {
        path.push(&self.element);
        for change in &self.changes {
            out.push(Finding {
                path: path.clone(),
                change,
            });
        }
        for child in &self.children {
            child.collect_findings(path, out);
        }
        path.pop();
    }

    /// Number of findings in the tree with the given verdict.
    pub fn count(&self, verdict: Verdict) -> usize {
        self.changes.iter().filter(|c| c.verdict == verdict).count()
            + self.children.iter().map(|c| c.count(verdict)).sum::<usize>()
    }
}

/// A finding together with its location in the tree.
#[derive(Debug, Clone)]
pub struct Finding<'a> {
    /// Elements from the root down to the node holding the change.
    pub path: Vec<&'a Element>,
    pub change: &'a Change,
}

impl Finding<'_> {
    /// The location without the root element, joined with ` > `.
    pub fn location(&self) -> String {
        self.path
            .iter()
            .skip(1)
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(" > ")
    }

    /// The nearest enclosing operation, if any.
    pub fn operation(&self) -> Option<&Element> {
        self.path
            .iter()
            .rev()
            .find(|e| matches!(e, Element::Operation { .. }))
            .copied()
    }
}
