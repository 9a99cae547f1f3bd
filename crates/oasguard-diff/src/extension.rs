//! Pluggable comparators for `x-*` vendor extensions.
//!
//! Every extensible node (document, path item, operation, parameter, request
//! body, response, schema) hands its extension maps to the
//! [`ExtensionRegistry`]. Keys no comparator claims still produce a
//! compatible finding when they differ.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, FixedOffset};
use oasguard_spec_parser::Extensions;
use serde_json::Value;

use crate::changeset::{Change, ChangeKind, Element};
use crate::verdict::{Direction, Verdict};

/// Where an extension value was found.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionContext<'a> {
    /// The extension key (e.g. `x-sunset`).
    pub key: &'a str,
    /// The element carrying the extension.
    pub element: &'a Element,
    /// Request or response side, when the node sits inside a schema or parameter.
    pub direction: Option<Direction>,
}

/// A comparator for one or more extension keys.
///
/// Implementations must be free of observable side effects: the registry may
/// call them in any order.
pub trait ExtensionComparator: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Whether this comparator owns `key`.
    fn handles(&self, key: &str) -> bool;

    /// Compare the old and new values of a handled key. At least one side is present.
    fn compare(
        &self,
        old: Option<&Value>,
        new: Option<&Value>,
        context: &ExtensionContext<'_>,
    ) -> Vec<Change>;
}

/// Ordered set of extension comparators.
#[derive(Default)]
pub struct ExtensionRegistry {
    comparators: Vec<Box<dyn ExtensionComparator>>,
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.comparators.iter().map(|c| c.name()))
            .finish()
    }
}

impl ExtensionRegistry {
    /// An empty registry: every differing extension is reported generically.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in comparators (`x-sunset`).
    pub fn with_defaults() -> Self {
        Self::new().with(SunsetComparator)
    }

    /// Add a comparator (builder style).
    pub fn with(mut self, comparator: impl ExtensionComparator + 'static) -> Self {
        self.register(Box::new(comparator));
        self
    }

    pub fn register(&mut self, comparator: Box<dyn ExtensionComparator>) {
        tracing::debug!(comparator = comparator.name(), "extension comparator registered");
        self.comparators.push(comparator);
    }

    pub fn len(&self) -> usize {
        self.comparators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comparators.is_empty()
    }

    /// Compare two extension maps of the same element.
    pub fn compare(
        &self,
        old: &Extensions,
        new: &Extensions,
        element: &Element,
        direction: Option<Direction>,
    ) -> Vec<Change> {
        let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
        let mut changes = Vec::new();

        for key in keys {
            let (old_value, new_value) = (old.get(key), new.get(key));
            let context = ExtensionContext {
                key,
                element,
                direction,
            };

            let mut handled = false;
            for comparator in self.comparators.iter().filter(|c| c.handles(key)) {
                handled = true;
                changes.extend(comparator.compare(old_value, new_value, &context));
            }
            if !handled {
                changes.extend(generic_change(key, old_value, new_value));
            }
        }

        changes
    }
}

/// Fallback for keys no comparator claims: any difference is compatible.
fn generic_change(key: &str, old: Option<&Value>, new: Option<&Value>) -> Option<Change> {
    match (old, new) {
        (None, Some(n)) => Some(
            Change::new(
                ChangeKind::ExtensionAdded,
                Verdict::Compatible,
                format!("extension '{}' added", key),
            )
            .with_new(n.clone()),
        ),
        (Some(o), None) => Some(
            Change::new(
                ChangeKind::ExtensionRemoved,
                Verdict::Compatible,
                format!("extension '{}' removed", key),
            )
            .with_old(o.clone()),
        ),
        (Some(o), Some(n)) if o != n => Some(
            Change::new(
                ChangeKind::ExtensionChanged,
                Verdict::Compatible,
                format!("extension '{}' changed", key),
            )
            .with_old(o.clone())
            .with_new(n.clone()),
        ),
        _ => None,
    }
}

/// Compares `x-sunset` dates (RFC 8594).
///
/// Moving the sunset earlier shortens the window clients were promised, so it
/// is breaking; everything else is advisory.
#[derive(Debug, Clone, Copy, Default)]
pub struct SunsetComparator;

pub const SUNSET_KEY: &str = "x-sunset";

/// Parse an HTTP-date (`Wed, 31 Dec 2025 23:59:59 GMT`) or RFC 3339 timestamp.
fn parse_sunset(value: &Value) -> Option<DateTime<FixedOffset>> {
    let raw = value.as_str()?;
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
}

impl ExtensionComparator for SunsetComparator {
    fn name(&self) -> &str {
        "sunset"
    }

    fn handles(&self, key: &str) -> bool {
        key == SUNSET_KEY
    }

    fn compare(
        &self,
        old: Option<&Value>,
        new: Option<&Value>,
        context: &ExtensionContext<'_>,
    ) -> Vec<Change> {
        let change = match (old, new) {
            (None, Some(n)) => Change::new(
                ChangeKind::ExtensionAdded,
                Verdict::Compatible,
                format!("{} scheduled for sunset", context.element),
            )
            .with_new(n.clone()),
            (Some(o), None) => Change::new(
                ChangeKind::ExtensionRemoved,
                Verdict::Compatible,
                format!("sunset of {} cancelled", context.element),
            )
            .with_old(o.clone()),
            (Some(o), Some(n)) if o != n => {
                let verdict = match (parse_sunset(o), parse_sunset(n)) {
                    (Some(before), Some(after)) if after < before => Verdict::Breaking,
                    _ => Verdict::Compatible,
                };
                let message = if verdict == Verdict::Breaking {
                    format!("sunset of {} moved earlier", context.element)
                } else {
                    format!("sunset of {} changed", context.element)
                };
                Change::new(ChangeKind::ExtensionChanged, verdict, message)
                    .with_old(o.clone())
                    .with_new(n.clone())
            }
            _ => return Vec::new(),
        };
        vec![change]
    }
}
