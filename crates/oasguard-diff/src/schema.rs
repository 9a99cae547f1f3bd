//! Recursive structural comparison of two schema graphs.
//!
//! Schemas are compared after resolving references, so moving an inline
//! definition into `components.schemas` (or back) is not a difference. Each
//! pair met again while still in progress is a cycle and counts as unchanged
//! for that edge. A finished pair reuses its cached result, but only when its
//! subtree never cut a cycle at an ancestor: such a result is partial and is
//! recomputed when the pair is reached from elsewhere.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;

use oasguard_spec_parser::{AdditionalProperties, ApiSpec, Schema, SchemaId};
use serde_json::Value;

use crate::changeset::{Change, ChangeKind, ChangeSet, Element};
use crate::config::DiffConfig;
use crate::extension::ExtensionRegistry;
use crate::verdict::{Direction, Verdict};

type PairKey = (SchemaId, SchemaId, Direction);

/// Compares schemas of two documents.
///
/// Holds the visited-pair state for one top-level comparison; create a new one
/// per comparison.
pub struct SchemaComparator<'a> {
    old: &'a ApiSpec,
    new: &'a ApiSpec,
    config: &'a DiffConfig,
    extensions: &'a ExtensionRegistry,
    /// Pairs on the current comparison stack, with their stack depth.
    in_progress: HashMap<PairKey, usize>,
    completed: HashMap<PairKey, ChangeSet>,
    /// Shallowest stack depth a cycle was cut at since the current frame began.
    cycle_floor: usize,
}

impl<'a> SchemaComparator<'a> {
    pub fn new(
        old: &'a ApiSpec,
        new: &'a ApiSpec,
        config: &'a DiffConfig,
        extensions: &'a ExtensionRegistry,
    ) -> Self {
        Self {
            old,
            new,
            config,
            extensions,
            in_progress: HashMap::new(),
            completed: HashMap::new(),
            cycle_floor: usize::MAX,
        }
    }

    /// Compare schemas that may be absent on either side.
    ///
    /// A missing schema accepts anything, so introducing one narrows and
    /// dropping one widens.
    pub fn compare_optional(
        &mut self,
        element: Element,
        old: Option<SchemaId>,
        new: Option<SchemaId>,
        direction: Direction,
    ) -> ChangeSet {
        match (old, new) {
            (None, None) => ChangeSet::new(element),
            (None, Some(_)) => ChangeSet::single(
                element,
                Change::new(
                    ChangeKind::SchemaAdded,
                    direction.narrowing(),
                    "schema introduced",
                ),
            ),
            (Some(_), None) => ChangeSet::single(
                element,
                Change::new(
                    ChangeKind::SchemaRemoved,
                    direction.widening(),
                    "schema removed",
                ),
            ),
            (Some(o), Some(n)) => self.compare(o, n, direction).with_element(element),
        }
    }

    /// Compare two schema nodes. The result is labelled [`Element::Schema`].
    pub fn compare(&mut self, old: SchemaId, new: SchemaId, direction: Direction) -> ChangeSet {
        let (old_spec, new_spec) = (self.old, self.new);
        let ((old_id, old_schema), (new_id, new_schema)) =
            match (old_spec.resolve_schema(old), new_spec.resolve_schema(new)) {
                (Some(o), Some(n)) => (o, n),
                (o, n) => return self.unresolved(old, new, o.is_some(), n.is_some()),
            };

        let key = (old_id, new_id, direction);
        if let Some(cached) = self.completed.get(&key) {
            return cached.clone();
        }
        if let Some(&depth) = self.in_progress.get(&key) {
            self.cycle_floor = self.cycle_floor.min(depth);
            return ChangeSet::new(Element::Schema);
        }

        let depth = self.in_progress.len();
        self.in_progress.insert(key, depth);
        let outer_floor = std::mem::replace(&mut self.cycle_floor, usize::MAX);

        let result = self.compare_definitions(old_schema, new_schema, direction);

        self.in_progress.remove(&key);
        let floor = std::mem::replace(&mut self.cycle_floor, outer_floor);
        if floor >= depth {
            self.completed.insert(key, result.clone());
        } else {
            tracing::trace!(depth, floor, "partial schema result not cached");
            self.cycle_floor = self.cycle_floor.min(floor);
        }
        result
    }

    fn unresolved(&self, old: SchemaId, new: SchemaId, old_ok: bool, new_ok: bool) -> ChangeSet {
        let old_name = self.old.reference_name(old).unwrap_or("<inline>");
        let new_name = self.new.reference_name(new).unwrap_or("<inline>");
        let mut set = ChangeSet::new(Element::Schema);
        let change = match (old_ok, new_ok) {
            (false, true) => Change::new(
                ChangeKind::UnresolvedReference,
                Verdict::Compatible,
                format!("reference '{}' now resolves", old_name),
            ),
            (false, false) if old_name == new_name => return set,
            (_, false) => Change::new(
                ChangeKind::UnresolvedReference,
                Verdict::Breaking,
                format!("reference '{}' cannot be resolved", new_name),
            ),
            (true, true) => return set,
        };
        set.push(change.with_old(old_name).with_new(new_name));
        set
    }

    fn compare_definitions(
        &mut self,
        old: &'a Schema,
        new: &'a Schema,
        direction: Direction,
    ) -> ChangeSet {
        let mut set = ChangeSet::new(Element::Schema);

        compare_kind(&mut set, old, new);
        compare_nullable(&mut set, old, new, direction);
        compare_enumeration(&mut set, old, new, direction, self.config);
        compare_constraints(&mut set, old, new, direction);

        if old.deprecated != new.deprecated {
            let message = if new.deprecated {
                "schema deprecated"
            } else {
                "schema no longer deprecated"
            };
            set.push(
                Change::new(ChangeKind::DeprecationChanged, Verdict::Compatible, message)
                    .with_old(old.deprecated)
                    .with_new(new.deprecated),
            );
        }

        self.compare_properties(&mut set, old, new, direction);
        self.compare_additional_properties(&mut set, old, new, direction);

        let items = self.compare_optional(Element::Items, old.items, new.items, direction);
        set.push_child(items);

        self.compare_branches(&mut set, "oneOf", &old.one_of, &new.one_of, direction);
        self.compare_branches(&mut set, "anyOf", &old.any_of, &new.any_of, direction);
        self.compare_branches(&mut set, "allOf", &old.all_of, &new.all_of, direction);

        set.extend(self.extensions.compare(
            &old.extensions,
            &new.extensions,
            &Element::Schema,
            Some(direction),
        ));

        set
    }

    /// Whether a property is invisible in this direction (`readOnly` properties
    /// are never sent by clients, `writeOnly` ones never returned).
    fn hidden(spec: &ApiSpec, id: SchemaId, direction: Direction) -> bool {
        spec.resolve_schema(id).is_some_and(|(_, schema)| match direction {
            Direction::Input => schema.read_only,
            Direction::Output => schema.write_only,
        })
    }

    fn compare_properties(
        &mut self,
        set: &mut ChangeSet,
        old: &'a Schema,
        new: &'a Schema,
        direction: Direction,
    ) {
        let names: BTreeSet<&String> = old.properties.keys().chain(new.properties.keys()).collect();

        for name in names {
            let old_prop = old
                .properties
                .get(name)
                .filter(|id| !Self::hidden(self.old, **id, direction));
            let new_prop = new
                .properties
                .get(name)
                .filter(|id| !Self::hidden(self.new, **id, direction));
            let element = Element::Property { name: name.clone() };
            let was_required = old.required.contains(name);
            let is_required = new.required.contains(name);

            match (old_prop, new_prop) {
                (None, None) => {}
                (None, Some(id)) => {
                    let has_default = self
                        .new
                        .resolve_schema(*id)
                        .is_some_and(|(_, s)| s.default.is_some());
                    let verdict = match direction {
                        Direction::Input if is_required && !has_default => Verdict::Breaking,
                        _ => Verdict::Compatible,
                    };
                    let label = if is_required { "required" } else { "optional" };
                    set.push_child(ChangeSet::single(
                        element,
                        Change::new(
                            ChangeKind::PropertyAdded,
                            verdict,
                            format!("{} property added", label),
                        ),
                    ));
                }
                (Some(_), None) => {
                    let verdict = match direction {
                        Direction::Output if was_required => Verdict::Breaking,
                        _ => Verdict::Compatible,
                    };
                    let label = if was_required { "required" } else { "optional" };
                    set.push_child(ChangeSet::single(
                        element,
                        Change::new(
                            ChangeKind::PropertyRemoved,
                            verdict,
                            format!("{} property removed", label),
                        ),
                    ));
                }
                (Some(o), Some(n)) => {
                    let mut child = self.compare(*o, *n, direction).with_element(element);
                    if was_required != is_required {
                        child.push(required_change(was_required, is_required, direction));
                    }
                    set.push_child(child);
                }
            }
        }
    }

    fn compare_additional_properties(
        &mut self,
        set: &mut ChangeSet,
        old: &Schema,
        new: &Schema,
        direction: Direction,
    ) {
        use AdditionalProperties::{Allowed, Denied, Schema as Constrained};

        let old_setting = effective_additional(self.old, old.additional_properties);
        let new_setting = effective_additional(self.new, new.additional_properties);
        let verdict = match (old_setting, new_setting) {
            (Allowed, Allowed) | (Denied, Denied) => return,
            (Constrained(o), Constrained(n)) => {
                let child = self
                    .compare(o, n, direction)
                    .with_element(Element::AdditionalProperties);
                set.push_child(child);
                return;
            }
            (Allowed, _) | (Constrained(_), Denied) => direction.narrowing(),
            (_, Allowed) | (Denied, Constrained(_)) => direction.widening(),
        };
        set.push(
            Change::new(
                ChangeKind::AdditionalPropertiesChanged,
                verdict,
                format!(
                    "additionalProperties changed from {} to {}",
                    describe_additional(old_setting),
                    describe_additional(new_setting)
                ),
            )
            .with_old(describe_additional(old_setting))
            .with_new(describe_additional(new_setting)),
        );
    }

    /// Compare one composition keyword.
    ///
    /// Equal branch counts pair by position. Otherwise each old branch, in
    /// order, pairs with the first unpaired new branch it is structurally
    /// identical to; whatever is left is added or removed.
    fn compare_branches(
        &mut self,
        set: &mut ChangeSet,
        keyword: &str,
        old: &[SchemaId],
        new: &[SchemaId],
        direction: Direction,
    ) {
        if old.is_empty() && new.is_empty() {
            return;
        }

        let mut pairs = Vec::new();
        let mut removed = Vec::new();
        let mut taken = vec![false; new.len()];

        if old.len() == new.len() {
            pairs.extend((0..old.len()).map(|i| (i, i)));
            taken.iter_mut().for_each(|t| *t = true);
        } else {
            for (i, old_branch) in old.iter().enumerate() {
                let mut found = None;
                for (j, new_branch) in new.iter().enumerate() {
                    if !taken[j] && self.compare(*old_branch, *new_branch, direction).is_unchanged() {
                        found = Some(j);
                        break;
                    }
                }
                match found {
                    Some(j) => {
                        taken[j] = true;
                        pairs.push((i, j));
                    }
                    None => removed.push(i),
                }
            }
        }

        for (i, j) in pairs {
            let element = Element::Branch {
                keyword: keyword.to_string(),
                index: j,
            };
            let child = self.compare(old[i], new[j], direction).with_element(element);
            set.push_child(child);
        }

        // Dropping an alternative rejects values it used to accept; dropping an
        // allOf member removes guarantees from responses.
        let removed_verdict = match (direction, keyword) {
            (Direction::Input, _) => Verdict::Breaking,
            (Direction::Output, "allOf") => Verdict::Breaking,
            (Direction::Output, _) => Verdict::Compatible,
        };
        for i in removed {
            set.push_child(ChangeSet::single(
                Element::Branch {
                    keyword: keyword.to_string(),
                    index: i,
                },
                Change::new(
                    ChangeKind::BranchRemoved,
                    removed_verdict,
                    format!("{} branch removed", keyword),
                ),
            ));
        }
        for (j, _) in taken.iter().enumerate().filter(|(_, t)| !**t) {
            set.push_child(ChangeSet::single(
                Element::Branch {
                    keyword: keyword.to_string(),
                    index: j,
                },
                Change::new(
                    ChangeKind::BranchAdded,
                    Verdict::Compatible,
                    format!("{} branch added", keyword),
                ),
            ));
        }
    }
}

/// A required flag toggled on a property, parameter or header.
///
/// Making something required narrows what a client may send and strengthens
/// what a server guarantees.
pub(crate) fn required_change(was: bool, is: bool, direction: Direction) -> Change {
    let (verdict, message) = if is {
        (direction.narrowing(), "became required")
    } else {
        (direction.widening(), "became optional")
    };
    Change::new(ChangeKind::RequiredChanged, verdict, message)
        .with_old(was)
        .with_new(is)
}

/// `additionalProperties: {}` accepts the same values as `true`.
fn effective_additional(spec: &ApiSpec, value: AdditionalProperties) -> AdditionalProperties {
    match value {
        AdditionalProperties::Schema(id)
            if spec
                .resolve_schema(id)
                .is_some_and(|(_, schema)| schema.is_unconstrained()) =>
        {
            AdditionalProperties::Allowed
        }
        other => other,
    }
}

fn describe_additional(value: AdditionalProperties) -> &'static str {
    match value {
        AdditionalProperties::Allowed => "allowed",
        AdditionalProperties::Denied => "denied",
        AdditionalProperties::Schema(_) => "schema",
    }
}

fn compare_kind(set: &mut ChangeSet, old: &Schema, new: &Schema) {
    match (old.kind, new.kind) {
        (Some(o), Some(n)) if o != n => set.push(
            Change::new(
                ChangeKind::TypeChanged,
                Verdict::Breaking,
                format!("type changed from {} to {}", o, n),
            )
            .with_old(o.as_str())
            .with_new(n.as_str()),
        ),
        _ => {}
    }

    match (&old.format, &new.format) {
        (Some(o), Some(n)) if o != n => set.push(
            Change::new(
                ChangeKind::FormatChanged,
                Verdict::Breaking,
                format!("format changed from {} to {}", o, n),
            )
            .with_old(o.as_str())
            .with_new(n.as_str()),
        ),
        _ => {}
    }
}

/// Kind and format appearing or disappearing depend on direction.
fn compare_kind_presence(set: &mut ChangeSet, old: &Schema, new: &Schema, direction: Direction) {
    match (old.kind, new.kind) {
        (None, Some(n)) => set.push(
            Change::new(
                ChangeKind::TypeChanged,
                direction.narrowing(),
                format!("type restricted to {}", n),
            )
            .with_new(n.as_str()),
        ),
        (Some(o), None) => set.push(
            Change::new(
                ChangeKind::TypeChanged,
                direction.widening(),
                format!("type restriction {} removed", o),
            )
            .with_old(o.as_str()),
        ),
        _ => {}
    }

    match (&old.format, &new.format) {
        (None, Some(n)) => set.push(
            Change::new(
                ChangeKind::FormatChanged,
                direction.narrowing(),
                format!("format {} added", n),
            )
            .with_new(n.as_str()),
        ),
        (Some(o), None) => set.push(
            Change::new(
                ChangeKind::FormatChanged,
                direction.widening(),
                format!("format {} removed", o),
            )
            .with_old(o.as_str()),
        ),
        _ => {}
    }
}

fn compare_nullable(set: &mut ChangeSet, old: &Schema, new: &Schema, direction: Direction) {
    let verdict = match (old.nullable, new.nullable) {
        (false, true) => match direction {
            Direction::Input => Verdict::Breaking,
            Direction::Output => Verdict::Compatible,
        },
        (true, false) => match direction {
            Direction::Input => Verdict::Compatible,
            Direction::Output => Verdict::Breaking,
        },
        _ => return,
    };
    let message = if new.nullable {
        "became nullable"
    } else {
        "no longer nullable"
    };
    set.push(
        Change::new(ChangeKind::NullableChanged, verdict, message)
            .with_old(old.nullable)
            .with_new(new.nullable),
    );
}

fn compare_enumeration(
    set: &mut ChangeSet,
    old: &Schema,
    new: &Schema,
    direction: Direction,
    config: &DiffConfig,
) {
    match (old.enumeration.is_empty(), new.enumeration.is_empty()) {
        (true, true) => {}
        (true, false) => set.push(
            Change::new(
                ChangeKind::EnumChanged,
                direction.narrowing(),
                "restricted to an enumeration",
            )
            .with_new(Value::Array(new.enumeration.clone())),
        ),
        (false, true) => set.push(
            Change::new(
                ChangeKind::EnumChanged,
                direction.widening(),
                "enumeration removed",
            )
            .with_old(Value::Array(old.enumeration.clone())),
        ),
        (false, false) => {
            let removed_verdict = match direction {
                Direction::Input => Verdict::Breaking,
                Direction::Output => config.enum_removal_in_output,
            };
            for value in old.enumeration.iter().filter(|v| !new.enumeration.contains(v)) {
                set.push(
                    Change::new(
                        ChangeKind::EnumValueRemoved,
                        removed_verdict,
                        format!("enum value {} removed", value),
                    )
                    .with_old(value.clone()),
                );
            }
            for value in new.enumeration.iter().filter(|v| !old.enumeration.contains(v)) {
                set.push(
                    Change::new(
                        ChangeKind::EnumValueAdded,
                        Verdict::Compatible,
                        format!("enum value {} added", value),
                    )
                    .with_new(value.clone()),
                );
            }
        }
    }
}

/// Which side of a range a constraint bounds.
#[derive(Clone, Copy)]
enum Bound {
    Lower,
    Upper,
}

fn compare_bound<T>(
    set: &mut ChangeSet,
    name: &str,
    bound: Bound,
    old: Option<T>,
    new: Option<T>,
    direction: Direction,
) where
    T: PartialOrd + Copy + Display + Into<Value>,
{
    let (narrowed, message) = match (old, new) {
        (None, None) => return,
        (None, Some(n)) => (true, format!("{} {} added", name, n)),
        (Some(o), None) => (false, format!("{} {} removed", name, o)),
        (Some(o), Some(n)) => {
            let narrowed = match bound {
                Bound::Lower if n > o => true,
                Bound::Lower if n < o => false,
                Bound::Upper if n < o => true,
                Bound::Upper if n > o => false,
                _ => return,
            };
            (narrowed, format!("{} changed from {} to {}", name, o, n))
        }
    };
    let verdict = if narrowed {
        direction.narrowing()
    } else {
        direction.widening()
    };
    let mut change = Change::new(ChangeKind::ConstraintChanged, verdict, message);
    change.old = old.map(Into::into);
    change.new = new.map(Into::into);
    set.push(change);
}

fn compare_flag(set: &mut ChangeSet, name: &str, old: bool, new: bool, direction: Direction) {
    if old == new {
        return;
    }
    let verdict = if new {
        direction.narrowing()
    } else {
        direction.widening()
    };
    let message = if new {
        format!("{} enabled", name)
    } else {
        format!("{} disabled", name)
    };
    set.push(
        Change::new(ChangeKind::ConstraintChanged, verdict, message)
            .with_old(old)
            .with_new(new),
    );
}

fn compare_constraints(set: &mut ChangeSet, old: &Schema, new: &Schema, direction: Direction) {
    compare_kind_presence(set, old, new, direction);

    compare_bound(set, "minimum", Bound::Lower, old.minimum, new.minimum, direction);
    compare_bound(set, "maximum", Bound::Upper, old.maximum, new.maximum, direction);
    compare_flag(set, "exclusiveMinimum", old.exclusive_minimum, new.exclusive_minimum, direction);
    compare_flag(set, "exclusiveMaximum", old.exclusive_maximum, new.exclusive_maximum, direction);
    compare_bound(set, "minLength", Bound::Lower, old.min_length, new.min_length, direction);
    compare_bound(set, "maxLength", Bound::Upper, old.max_length, new.max_length, direction);
    compare_bound(set, "minItems", Bound::Lower, old.min_items, new.min_items, direction);
    compare_bound(set, "maxItems", Bound::Upper, old.max_items, new.max_items, direction);

    match (&old.pattern, &new.pattern) {
        (None, None) => {}
        (Some(o), Some(n)) if o == n => {}
        (o, n) => {
            // A rewritten pattern cannot be proven wider, so treat it as narrowing
            let verdict = if n.is_some() {
                direction.narrowing()
            } else {
                direction.widening()
            };
            let mut change = Change::new(
                ChangeKind::ConstraintChanged,
                verdict,
                match (o, n) {
                    (Some(_), Some(_)) => "pattern changed",
                    (None, _) => "pattern added",
                    (_, None) => "pattern removed",
                },
            );
            change.old = o.clone().map(Value::from);
            change.new = n.clone().map(Value::from);
            set.push(change);
        }
    }
}
