//! Manifest loading and the read-only lookup index over packages.
//!
//! The manifest is YAML describing packages of actions and sequences, in the
//! shape deployment tooling uses:
//!
//! ```yaml
//! packages:
//!   demo:
//!     actions:
//!       hello:
//!         function: actions/hello/index.js
//!         inputs:
//!           name: world
//!         annotations:
//!           web-export: true
//!           require-adobe-auth: false
//!     sequences:
//!       pipeline:
//!         actions: hello, goodbye
//! ```
//!
//! Annotation flags arrive as heterogeneous truthy values (`true`, `'yes'`,
//! `'raw'`, ...). They are parsed exactly once here, so the dispatch engine
//! only ever sees the strict [`WebExposure`] enum and plain booleans.

use crate::error::{OwlocalError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const ANNOTATION_WEB_EXPORT: &str = "web-export";
pub const ANNOTATION_REQUIRE_AUTH: &str = "require-adobe-auth";

// ---------------------------------------------------------------------------
// WebExposure
// ---------------------------------------------------------------------------

/// How (and whether) an item is reachable from the public web surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WebExposure {
    /// Not web-exposed. The default when neither annotation nor flag is set.
    #[default]
    No,
    /// Reachable via the web-prefixed route.
    Web,
    /// Web-exposed and requesting raw passthrough handling.
    Raw,
}

impl WebExposure {
    /// Parse the `web-export` annotation (preferred) or the legacy `web`
    /// flag. Truthy representations: `true`, `"true"`, `"yes"`, `"raw"`.
    /// Explicit falsy representations and anything unrecognized map to `No`.
    pub fn parse(annotation: Option<&Value>, legacy: Option<&Value>) -> Self {
        match annotation.or(legacy) {
            Some(Value::Bool(true)) => Self::Web,
            Some(Value::String(s)) => match s.as_str() {
                "raw" => Self::Raw,
                "true" | "yes" => Self::Web,
                _ => Self::No,
            },
            _ => Self::No,
        }
    }

    pub fn is_web_exposed(self) -> bool {
        matches!(self, Self::Web | Self::Raw)
    }

    pub fn is_raw(self) -> bool {
        self == Self::Raw
    }
}

/// Parse a boolean-like annotation value (`true`, `"true"`, `"yes"`).
fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.as_str(), "true" | "yes"),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Raw manifest shape (serde)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    packages: HashMap<String, RawPackage>,
}

#[derive(Debug, Deserialize)]
struct RawPackage {
    #[serde(default)]
    actions: HashMap<String, RawAction>,
    #[serde(default)]
    sequences: HashMap<String, RawSequence>,
}

#[derive(Debug, Deserialize)]
struct RawAction {
    function: PathBuf,
    #[serde(default)]
    inputs: serde_json::Map<String, Value>,
    #[serde(default)]
    annotations: HashMap<String, Value>,
    /// Legacy web flag, superseded by the `web-export` annotation.
    #[serde(default)]
    web: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawSequence {
    /// Comma-delimited list of action names in the same package.
    actions: String,
    #[serde(default)]
    annotations: HashMap<String, Value>,
    #[serde(default)]
    web: Option<Value>,
}

// ---------------------------------------------------------------------------
// Runtime manifest
// ---------------------------------------------------------------------------

/// A single invocable unit of code with its declared defaults and parsed
/// annotations.
#[derive(Debug, Clone)]
pub struct Action {
    pub name: String,
    /// Filesystem path to the reloadable entry point.
    pub function: PathBuf,
    /// Declared default input parameters.
    pub inputs: serde_json::Map<String, Value>,
    pub web: WebExposure,
    pub requires_auth: bool,
}

/// An ordered chain of actions invoked with output-to-input threading.
#[derive(Debug, Clone)]
pub struct Sequence {
    pub name: String,
    /// Action names, split and trimmed from the declared delimited string.
    pub components: Vec<String>,
    pub web: WebExposure,
}

#[derive(Debug, Clone, Default)]
pub struct Package {
    pub actions: HashMap<String, Action>,
    pub sequences: HashMap<String, Sequence>,
}

/// Read-only index over packages, built once per run.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub packages: HashMap<String, Package>,
}

/// Result of a manifest lookup. Absent package and absent item are
/// indistinguishable to callers.
#[derive(Debug)]
pub enum Resolved<'a> {
    Action(&'a Action),
    Sequence(&'a Sequence),
    None,
}

impl Manifest {
    /// Load and validate a manifest from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| OwlocalError::ManifestRead {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawManifest =
            serde_yaml::from_str(&text).map_err(|source| OwlocalError::ManifestParse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_raw(raw)
    }

    /// Parse a manifest from a YAML string (primarily for tests and
    /// embedders).
    pub fn from_yaml(text: &str) -> Result<Self> {
        let raw: RawManifest = serde_yaml::from_str(text)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawManifest) -> Result<Self> {
        let mut packages = HashMap::new();
        for (pkg_name, raw_pkg) in raw.packages {
            let mut package = Package::default();

            for (name, a) in raw_pkg.actions {
                let web = WebExposure::parse(
                    a.annotations.get(ANNOTATION_WEB_EXPORT),
                    a.web.as_ref(),
                );
                let requires_auth = truthy(a.annotations.get(ANNOTATION_REQUIRE_AUTH));
                package.actions.insert(
                    name.clone(),
                    Action {
                        name,
                        function: a.function,
                        inputs: a.inputs,
                        web,
                        requires_auth,
                    },
                );
            }

            for (name, s) in raw_pkg.sequences {
                let web = WebExposure::parse(
                    s.annotations.get(ANNOTATION_WEB_EXPORT),
                    s.web.as_ref(),
                );
                let components = split_components(&s.actions);
                package.sequences.insert(
                    name.clone(),
                    Sequence {
                        name,
                        components,
                        web,
                    },
                );
            }

            packages.insert(pkg_name, package);
        }

        let manifest = Self { packages };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Every sequence component must name an action in the same package.
    /// The sequence executor still guards at runtime, but a manifest that
    /// fails here never reaches dispatch.
    fn validate(&self) -> Result<()> {
        for (pkg_name, package) in &self.packages {
            for sequence in package.sequences.values() {
                for component in &sequence.components {
                    if !package.actions.contains_key(component) {
                        return Err(OwlocalError::UnknownSequenceComponent {
                            package: pkg_name.clone(),
                            sequence: sequence.name.clone(),
                            component: component.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Pure O(1) lookup of an item within a package.
    pub fn resolve(&self, package: &str, item: &str) -> Resolved<'_> {
        let Some(pkg) = self.packages.get(package) else {
            return Resolved::None;
        };
        if let Some(action) = pkg.actions.get(item) {
            return Resolved::Action(action);
        }
        if let Some(sequence) = pkg.sequences.get(item) {
            return Resolved::Sequence(sequence);
        }
        Resolved::None
    }
}

/// Split a declared sequence action list, trimming whitespace per element.
/// A blank declaration yields an empty component list.
fn split_components(declared: &str) -> Vec<String> {
    declared
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MANIFEST: &str = r#"
packages:
  demo:
    actions:
      hello:
        function: actions/hello/index.js
        inputs:
          name: world
        annotations:
          web-export: true
      hidden:
        function: actions/hidden/index.js
      rawling:
        function: actions/rawling/index.js
        annotations:
          web-export: raw
      secured:
        function: actions/secured/index.js
        annotations:
          web-export: 'yes'
          require-adobe-auth: true
    sequences:
      pipeline:
        actions: " hello ,hidden "
        annotations:
          web-export: true
"#;

    #[test]
    fn resolves_actions_and_sequences() {
        let manifest = Manifest::from_yaml(MANIFEST).unwrap();
        assert!(matches!(
            manifest.resolve("demo", "hello"),
            Resolved::Action(_)
        ));
        assert!(matches!(
            manifest.resolve("demo", "pipeline"),
            Resolved::Sequence(_)
        ));
        assert!(matches!(manifest.resolve("demo", "nope"), Resolved::None));
        assert!(matches!(manifest.resolve("other", "hello"), Resolved::None));
    }

    #[test]
    fn sequence_components_are_split_and_trimmed() {
        let manifest = Manifest::from_yaml(MANIFEST).unwrap();
        let Resolved::Sequence(seq) = manifest.resolve("demo", "pipeline") else {
            panic!("expected sequence");
        };
        assert_eq!(seq.components, vec!["hello", "hidden"]);
    }

    #[test]
    fn action_defaults_and_annotations_are_parsed() {
        let manifest = Manifest::from_yaml(MANIFEST).unwrap();
        let Resolved::Action(hello) = manifest.resolve("demo", "hello") else {
            panic!("expected action");
        };
        assert_eq!(hello.inputs.get("name"), Some(&json!("world")));
        assert_eq!(hello.web, WebExposure::Web);
        assert!(!hello.requires_auth);

        let Resolved::Action(secured) = manifest.resolve("demo", "secured") else {
            panic!("expected action");
        };
        assert_eq!(secured.web, WebExposure::Web);
        assert!(secured.requires_auth);
    }

    #[test]
    fn absent_web_annotation_defaults_to_not_exposed() {
        let manifest = Manifest::from_yaml(MANIFEST).unwrap();
        let Resolved::Action(hidden) = manifest.resolve("demo", "hidden") else {
            panic!("expected action");
        };
        assert_eq!(hidden.web, WebExposure::No);
        assert!(!hidden.web.is_web_exposed());
    }

    #[test]
    fn raw_exposure_is_web_exposed_and_raw() {
        let manifest = Manifest::from_yaml(MANIFEST).unwrap();
        let Resolved::Action(rawling) = manifest.resolve("demo", "rawling") else {
            panic!("expected action");
        };
        assert_eq!(rawling.web, WebExposure::Raw);
        assert!(rawling.web.is_web_exposed());
        assert!(rawling.web.is_raw());
    }

    #[test]
    fn web_exposure_truthy_table() {
        for v in [json!(true), json!("true"), json!("yes")] {
            assert_eq!(WebExposure::parse(Some(&v), None), WebExposure::Web);
        }
        assert_eq!(
            WebExposure::parse(Some(&json!("raw")), None),
            WebExposure::Raw
        );
        for v in [json!(false), json!("false"), json!("no"), json!(1)] {
            assert_eq!(WebExposure::parse(Some(&v), None), WebExposure::No);
        }
        assert_eq!(WebExposure::parse(None, None), WebExposure::No);
    }

    #[test]
    fn annotation_takes_precedence_over_legacy_flag() {
        let annotation = json!("no");
        let legacy = json!(true);
        assert_eq!(
            WebExposure::parse(Some(&annotation), Some(&legacy)),
            WebExposure::No
        );
        assert_eq!(WebExposure::parse(None, Some(&legacy)), WebExposure::Web);
    }

    #[test]
    fn unknown_sequence_component_fails_validation() {
        let yaml = r#"
packages:
  demo:
    actions:
      hello:
        function: hello.js
    sequences:
      broken:
        actions: hello, missing
"#;
        let err = Manifest::from_yaml(yaml).unwrap_err();
        assert!(matches!(
            err,
            OwlocalError::UnknownSequenceComponent { ref component, .. } if component == "missing"
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Manifest::load(Path::new("/nonexistent/manifest.yaml")).unwrap_err();
        assert!(matches!(err, OwlocalError::ManifestRead { .. }));
    }

    #[test]
    fn load_reads_manifest_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("manifest.yaml");
        std::fs::write(&path, MANIFEST).unwrap();
        let manifest = Manifest::load(&path).unwrap();
        assert!(manifest.packages.contains_key("demo"));
    }
}
