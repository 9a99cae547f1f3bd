//! Top-level comparison of two documents.

use std::collections::BTreeSet;
use std::path::Path;

use oasguard_spec_parser::{load_spec, ApiSpec, DiagnosticPolicy};

use crate::changeset::{Change, ChangeKind, ChangeSet, Element};
use crate::config::DiffConfig;
use crate::error::DiffError;
use crate::extension::ExtensionRegistry;
use crate::paths::compare_paths;
use crate::schema::SchemaComparator;
use crate::verdict::Verdict;

/// State shared by the comparators during one `compare` call.
pub(crate) struct Comparison<'a> {
    pub old: &'a ApiSpec,
    pub new: &'a ApiSpec,
    pub extensions: &'a ExtensionRegistry,
    pub schemas: SchemaComparator<'a>,
}

impl<'a> Comparison<'a> {
    pub fn new(
        old: &'a ApiSpec,
        new: &'a ApiSpec,
        config: &'a DiffConfig,
        extensions: &'a ExtensionRegistry,
    ) -> Self {
        Self {
            old,
            new,
            extensions,
            schemas: SchemaComparator::new(old, new, config, extensions),
        }
    }
}

/// Compares two API documents and classifies every difference.
///
/// The engine is immutable and can be shared across threads; each call
/// allocates its own traversal state.
#[derive(Debug)]
pub struct DiffEngine {
    config: DiffConfig,
    extensions: ExtensionRegistry,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new(DiffConfig::default(), ExtensionRegistry::with_defaults())
    }
}

impl DiffEngine {
    pub fn new(config: DiffConfig, extensions: ExtensionRegistry) -> Self {
        Self { config, extensions }
    }

    pub fn config(&self) -> &DiffConfig {
        &self.config
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    /// Compare `old` against `new`.
    ///
    /// The identifiers label the root of the result. Fails only when one of
    /// them is blank; anything unusual inside the documents is reported as a
    /// change.
    pub fn compare(
        &self,
        old: &ApiSpec,
        old_id: &str,
        new: &ApiSpec,
        new_id: &str,
    ) -> Result<ChangeSet, DiffError> {
        if old_id.trim().is_empty() {
            return Err(DiffError::InvalidArgument(
                "old specification identifier is blank".into(),
            ));
        }
        if new_id.trim().is_empty() {
            return Err(DiffError::InvalidArgument(
                "new specification identifier is blank".into(),
            ));
        }

        tracing::debug!(
            old = old_id,
            new = new_id,
            old_paths = old.paths.len(),
            new_paths = new.paths.len(),
            "comparison started"
        );

        let element = Element::Specification {
            old: old_id.to_string(),
            new: new_id.to_string(),
        };
        let mut root = ChangeSet::new(element.clone());
        let mut cx = Comparison::new(old, new, &self.config, &self.extensions);

        compare_paths(&mut cx, &mut root);
        root.push_child(compare_security_schemes(old, new));
        root.extend(
            self.extensions
                .compare(&old.extensions, &new.extensions, &element, None),
        );

        tracing::info!(
            old = old_id,
            new = new_id,
            verdict = %root.verdict(),
            breaking = root.count(Verdict::Breaking),
            compatible = root.count(Verdict::Compatible),
            "comparison completed"
        );

        Ok(root)
    }

    /// Load two documents from disk and compare them.
    ///
    /// Each file stem becomes the identifier of its document.
    pub fn compare_files(
        &self,
        old: &Path,
        new: &Path,
        policy: DiagnosticPolicy,
    ) -> Result<ChangeSet, DiffError> {
        let old_spec = load(old, policy)?;
        let new_spec = load(new, policy)?;
        self.compare(&old_spec, &identifier(old), &new_spec, &identifier(new))
    }
}

fn load(path: &Path, policy: DiagnosticPolicy) -> Result<ApiSpec, DiffError> {
    load_spec(path, policy).map_err(|source| DiffError::Load {
        location: path.display().to_string(),
        source,
    })
}

fn identifier(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Compare `components.securitySchemes` by name.
fn compare_security_schemes(old: &ApiSpec, new: &ApiSpec) -> ChangeSet {
    let mut set = ChangeSet::new(Element::SecuritySchemes);
    let names: BTreeSet<&String> = old
        .security_schemes
        .keys()
        .chain(new.security_schemes.keys())
        .collect();

    for name in names {
        let element = Element::SecurityScheme { name: name.clone() };
        let change = match (old.security_schemes.get(name), new.security_schemes.get(name)) {
            (Some(o), None) => Change::new(
                ChangeKind::SecuritySchemeRemoved,
                Verdict::Breaking,
                "security scheme removed",
            )
            .with_old(o.clone()),
            (None, Some(n)) => Change::new(
                ChangeKind::SecuritySchemeAdded,
                Verdict::Compatible,
                "security scheme added",
            )
            .with_new(n.clone()),
            (Some(o), Some(n)) if o != n => Change::new(
                ChangeKind::SecuritySchemeChanged,
                Verdict::Breaking,
                "security scheme definition changed",
            )
            .with_old(o.clone())
            .with_new(n.clone()),
            _ => continue,
        };
        set.push_child(ChangeSet::single(element, change));
    }

    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use oasguard_spec_parser::parse_spec;
    use std::io::Write;

    const HEADER: &str = r#"openapi: "3.0.3"
info:
  title: Users
  version: "1"
"#;

    fn spec(body: &str) -> ApiSpec {
        parse_spec(&format!("{}{}", HEADER, body)).unwrap().spec
    }

    fn diff(old: &str, new: &str) -> ChangeSet {
        DiffEngine::default()
            .compare(&spec(old), "old", &spec(new), "new")
            .unwrap()
    }

    const USERS: &str = r##"paths:
  /users/{id}:
    get:
      parameters:
        - name: id
          in: path
          required: true
          schema: {type: string}
        - name: page
          in: query
          required: true
          schema: {type: integer}
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema:
                $ref: "#/components/schemas/User"
        "404":
          description: missing
    post:
      requestBody:
        required: true
        content:
          application/json:
            schema:
              type: object
              properties:
                status: {type: string, enum: [A, B]}
      responses:
        "204":
          description: done
components:
  securitySchemes:
    api_key: {type: apiKey, in: header, name: X-Key}
  schemas:
    User:
      type: object
      required: [id]
      properties:
        id: {type: string}
        friends:
          type: array
          items:
            $ref: "#/components/schemas/User"
"##;

    /// Every node's verdict equals the max over its findings and children.
    fn assert_aggregated(set: &ChangeSet) {
        let expected = set
            .changes()
            .iter()
            .map(|c| c.verdict)
            .chain(set.children().iter().map(|c| c.verdict()))
            .max()
            .unwrap_or(Verdict::Unchanged);
        assert_eq!(set.verdict(), expected, "at {}", set.element());
        set.children().iter().for_each(assert_aggregated);
    }

    #[test]
    fn identical_documents_are_unchanged() {
        let set = diff(USERS, USERS);
        assert!(set.is_unchanged());
        assert!(set.is_compatible());
        assert!(set.findings().is_empty());
    }

    #[test]
    fn optional_response_property_added_is_compatible() {
        let new = USERS.replace(
            "        id: {type: string}\n",
            "        id: {type: string}\n        name: {type: string}\n",
        );
        let set = diff(USERS, &new);
        assert_eq!(set.verdict(), Verdict::Compatible);

        let findings = set.findings();
        // The request body has no reference to User, so only the response changes
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].change.kind, ChangeKind::PropertyAdded);
        assert_eq!(
            findings[0].location(),
            "/users/{id} > GET /users/{id} > response 200 > application/json > property 'name'"
        );
        assert_aggregated(&set);
    }

    #[test]
    fn required_query_parameter_removed_is_breaking() {
        let new = USERS.replace(
            "        - name: page\n          in: query\n          required: true\n          schema: {type: integer}\n",
            "",
        );
        let set = diff(USERS, &new);
        assert!(set.is_breaking());
        assert_eq!(set.findings()[0].change.kind, ChangeKind::ParameterRemoved);
    }

    #[test]
    fn request_enum_narrowed_is_breaking() {
        let new = USERS.replace("enum: [A, B]", "enum: [A]");
        let set = diff(USERS, &new);
        assert!(set.is_breaking());
        let findings = set.findings();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].change.kind, ChangeKind::EnumValueRemoved);
        assert!(matches!(
            findings[0].operation(),
            Some(Element::Operation { method, .. }) if method == "POST"
        ));
    }

    #[test]
    fn path_added_is_compatible() {
        let new = USERS.replace(
            "components:\n",
            "  /orders:\n    get:\n      responses:\n        \"200\":\n          description: ok\ncomponents:\n",
        );
        let set = diff(USERS, &new);
        assert_eq!(set.verdict(), Verdict::Compatible);
        let findings = set.findings();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].change.kind, ChangeKind::PathAdded);
        assert_eq!(findings[0].location(), "/orders");
    }

    #[test]
    fn response_404_removed_is_breaking() {
        let new = USERS.replace("        \"404\":\n          description: missing\n", "");
        let set = diff(USERS, &new);
        assert!(set.is_breaking());
        assert_eq!(set.findings()[0].change.kind, ChangeKind::ResponseRemoved);
    }

    #[test]
    fn path_removed_is_breaking() {
        let set = diff(USERS, "paths: {}\n");
        assert!(set.is_breaking());
        assert_eq!(set.findings()[0].change.kind, ChangeKind::PathRemoved);
    }

    #[test]
    fn method_added_and_removed() {
        let without_post = USERS.replace("    post:\n", "    put:\n");
        let set = diff(USERS, &without_post);
        let kinds: Vec<ChangeKind> = set.findings().iter().map(|f| f.change.kind).collect();
        assert_eq!(
            kinds,
            vec![ChangeKind::OperationRemoved, ChangeKind::OperationAdded]
        );
        assert!(set.is_breaking());
    }

    #[test]
    fn renamed_path_variable_matches() {
        let new = USERS
            .replace("/users/{id}:", "/users/{userId}:")
            .replace("        - name: id\n", "        - name: userId\n");
        assert!(diff(USERS, &new).is_unchanged());
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let new = USERS.replace("/users/{id}:", "/users/{id}/:");
        assert!(diff(USERS, &new).is_unchanged());
    }

    #[test]
    fn security_scheme_changes() {
        let removed = USERS.replace(
            "  securitySchemes:\n    api_key: {type: apiKey, in: header, name: X-Key}\n",
            "",
        );
        assert!(diff(USERS, &removed).is_breaking());
        assert_eq!(diff(&removed, USERS).verdict(), Verdict::Compatible);

        let changed = USERS.replace("name: X-Key", "name: X-Api-Key");
        let set = diff(USERS, &changed);
        assert!(set.is_breaking());
        assert_eq!(
            set.findings()[0].change.kind,
            ChangeKind::SecuritySchemeChanged
        );
    }

    #[test]
    fn root_extensions_are_compared() {
        let new = format!("x-audience: external\n{}", USERS);
        let set = diff(USERS, &new);
        assert_eq!(set.verdict(), Verdict::Compatible);
        assert_eq!(set.changes()[0].kind, ChangeKind::ExtensionAdded);
    }

    #[test]
    fn every_operation_returning_a_cycle_member_sees_the_change() {
        let old = r##"paths:
  /a:
    get:
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema: {$ref: "#/components/schemas/A"}
  /b:
    get:
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema: {$ref: "#/components/schemas/B"}
components:
  schemas:
    A:
      type: object
      properties:
        x: {type: string}
        b: {$ref: "#/components/schemas/B"}
    B:
      type: object
      properties:
        a: {$ref: "#/components/schemas/A"}
"##;
        let new = old.replace("x: {type: string}", "x: {type: integer}");
        let set = diff(old, &new);
        assert_eq!(set.verdict(), Verdict::Breaking);

        for path in ["/a", "/b"] {
            let count = set
                .findings()
                .iter()
                .filter(|f| f.change.kind == ChangeKind::TypeChanged)
                .filter(|f| {
                    matches!(f.operation(), Some(Element::Operation { path: p, .. }) if p.as_str() == path)
                })
                .count();
            assert_eq!(count, 1, "type change under {}", path);
        }
    }

    #[test]
    fn comparison_is_deterministic() {
        let new = USERS
            .replace("enum: [A, B]", "enum: [A, C]")
            .replace("        \"404\":\n          description: missing\n", "");
        let (old, new) = (spec(USERS), spec(&new));
        let engine = DiffEngine::default();
        let first = engine.compare(&old, "a", &new, "b").unwrap();
        let second = engine.compare(&old, "a", &new, "b").unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_aggregated(&first);
    }

    #[test]
    fn blank_identifier_is_rejected() {
        let spec = spec(USERS);
        let engine = DiffEngine::default();
        let err = engine.compare(&spec, " ", &spec, "new").unwrap_err();
        assert!(matches!(err, DiffError::InvalidArgument(_)));
        assert!(engine.compare(&spec, "old", &spec, "").is_err());
    }

    #[test]
    fn engine_is_shareable_across_threads() {
        let engine = DiffEngine::default();
        let old = spec(USERS);
        let new = spec(&USERS.replace("enum: [A, B]", "enum: [A]"));

        let verdicts: Vec<Verdict> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let (engine, old, new) = (&engine, &old, &new);
                    scope.spawn(move || {
                        engine
                            .compare(old, &format!("old-{}", i), new, "new")
                            .unwrap()
                            .verdict()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(verdicts.iter().all(|v| *v == Verdict::Breaking));
    }

    #[test]
    fn compare_files_uses_file_stems() {
        let dir = tempfile::tempdir().unwrap();
        let old_path = dir.path().join("users-v1.yaml");
        let new_path = dir.path().join("users-v2.yaml");
        let mut file = std::fs::File::create(&old_path).unwrap();
        write!(file, "{}{}", HEADER, USERS).unwrap();
        let mut file = std::fs::File::create(&new_path).unwrap();
        write!(file, "{}{}", HEADER, USERS.replace("enum: [A, B]", "enum: [A]")).unwrap();

        let set = DiffEngine::default()
            .compare_files(&old_path, &new_path, DiagnosticPolicy::Lenient)
            .unwrap();
        assert!(set.is_breaking());
        assert_eq!(
            set.element(),
            &Element::Specification {
                old: "users-v1".into(),
                new: "users-v2".into()
            }
        );
    }

    #[test]
    fn compare_files_reports_load_failures() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yaml");
        let err = DiffEngine::default()
            .compare_files(&missing, &missing, DiagnosticPolicy::Lenient)
            .unwrap_err();
        match err {
            DiffError::Load { location, .. } => assert!(location.ends_with("missing.yaml")),
            other => panic!("expected load error, got {other:?}"),
        }
    }
}
