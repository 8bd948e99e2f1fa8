use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::models::Scope;

/// The parts of a `package.json` the aggregator reads.
///
/// Fields are read leniently: a malformed section (an `engines` array, a
/// numeric script, a non-string range) is dropped instead of rejecting the
/// whole file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "string_map")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "string_map")]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "string_map")]
    pub peer_dependencies: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "string_map")]
    pub optional_dependencies: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "string_map")]
    pub engines: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "string_map")]
    pub scripts: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient_workspaces")]
    pub workspaces: Option<Workspaces>,
}

/// Object entries whose values are strings; anything else reads as empty.
fn string_map<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<BTreeMap<String, String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) => Some((k, s)),
                _ => None,
            })
            .collect(),
        _ => BTreeMap::new(),
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_workspaces<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<Workspaces>, D::Error> {
    Ok(serde_json::from_value(Value::deserialize(d)?).ok())
}

/// `workspaces` is either a pattern list or `{ "packages": [...] }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Workspaces {
    List(Vec<String>),
    Object {
        #[serde(default)]
        packages: Vec<String>,
    },
}

impl Manifest {
    /// Read `<dir>/package.json`. A missing or malformed project manifest is fatal.
    pub fn load(dir: &Path) -> Result<Manifest> {
        let path = dir.join("package.json");
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let manifest = serde_json::from_str(&content)
            .with_context(|| format!("cannot parse {}", path.display()))?;
        Ok(manifest)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("(unnamed)")
    }

    pub fn display_version(&self) -> &str {
        self.version.as_deref().unwrap_or("0.0.0")
    }

    pub fn workspace_patterns(&self) -> &[String] {
        match &self.workspaces {
            Some(Workspaces::List(list)) => list,
            Some(Workspaces::Object { packages }) => packages,
            None => &[],
        }
    }

    /// Every declared name with its range, dev entries last so runtime ranges win.
    pub fn declared_ranges(&self) -> BTreeMap<&str, &str> {
        let mut out = BTreeMap::new();
        for section in [
            &self.dev_dependencies,
            &self.peer_dependencies,
            &self.optional_dependencies,
            &self.dependencies,
        ] {
            for (name, range) in section {
                out.insert(name.as_str(), range.as_str());
            }
        }
        out
    }
}

/// Declared-name sets derived from one or more manifests.
#[derive(Debug, Clone, Default)]
pub struct DeclaredSets {
    /// dependencies ∪ optionalDependencies ∪ peerDependencies
    pub runtime: BTreeSet<String>,
    /// devDependencies that are not also runtime
    pub dev: BTreeSet<String>,
    /// dependencies ∪ devDependencies ∪ optionalDependencies
    pub direct: BTreeSet<String>,
    optional: BTreeSet<String>,
    peer: BTreeSet<String>,
}

impl DeclaredSets {
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let mut sets = DeclaredSets::default();
        sets.add(manifest);
        sets
    }

    /// Union another manifest's declarations into this set.
    pub fn add(&mut self, manifest: &Manifest) {
        let keys = |m: &BTreeMap<String, String>| m.keys().cloned().collect::<Vec<_>>();

        self.runtime.extend(keys(&manifest.dependencies));
        self.runtime.extend(keys(&manifest.optional_dependencies));
        self.runtime.extend(keys(&manifest.peer_dependencies));
        self.optional.extend(keys(&manifest.optional_dependencies));
        self.peer.extend(keys(&manifest.peer_dependencies));

        self.direct.extend(keys(&manifest.dependencies));
        self.direct.extend(keys(&manifest.dev_dependencies));
        self.direct.extend(keys(&manifest.optional_dependencies));

        self.dev.extend(keys(&manifest.dev_dependencies));
        let runtime = &self.runtime;
        self.dev.retain(|name| !runtime.contains(name));
    }

    pub fn is_direct(&self, name: &str) -> bool {
        self.direct.contains(name)
    }

    /// Declared scope of a direct name; `None` for names the manifest never mentions.
    pub fn scope_of(&self, name: &str) -> Option<Scope> {
        if self.optional.contains(name) {
            Some(Scope::Optional)
        } else if self.peer.contains(name) {
            Some(Scope::Peer)
        } else if self.runtime.contains(name) {
            Some(Scope::Runtime)
        } else if self.dev.contains(name) {
            Some(Scope::Dev)
        } else {
            None
        }
    }

    /// Every name mentioned in any dependency section.
    pub fn all_names(&self) -> BTreeSet<String> {
        self.runtime.union(&self.direct).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manifest(json: &str) -> Manifest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_load_missing_manifest_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(Manifest::load(dir.path()).is_err());
    }

    #[test]
    fn test_load_manifest() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{ "name": "app", "version": "1.2.3", "dependencies": { "express": "^4.18.2" } }"#,
        )
        .unwrap();
        let m = Manifest::load(dir.path()).unwrap();
        assert_eq!(m.display_name(), "app");
        assert_eq!(m.dependencies.get("express").map(String::as_str), Some("^4.18.2"));
    }

    #[test]
    fn test_declared_sets() {
        let m = manifest(
            r#"{
  "dependencies": { "express": "^4", "lodash": "^4" },
  "devDependencies": { "jest": "^29", "lodash": "^4" },
  "optionalDependencies": { "fsevents": "^2" },
  "peerDependencies": { "react": "^18" }
}"#,
        );
        let sets = DeclaredSets::from_manifest(&m);
        assert!(sets.is_direct("express"));
        assert!(sets.is_direct("jest"));
        assert!(sets.is_direct("fsevents"));
        assert!(!sets.is_direct("react"));
        assert!(sets.dev.contains("jest"));
        assert!(!sets.dev.contains("lodash"));
        assert_eq!(sets.scope_of("fsevents"), Some(Scope::Optional));
        assert_eq!(sets.scope_of("react"), Some(Scope::Peer));
        assert_eq!(sets.scope_of("jest"), Some(Scope::Dev));
        assert_eq!(sets.scope_of("lodash"), Some(Scope::Runtime));
        assert_eq!(sets.scope_of("left-pad"), None);
    }

    #[test]
    fn test_malformed_sections_do_not_reject_manifest() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{
  "name": "legacy",
  "version": 3,
  "engines": ["node >= 0.8"],
  "scripts": { "build": "tsc", "weird": 1 },
  "dependencies": { "express": "^4", "broken": { "x": 1 } },
  "workspaces": "packages/*"
}"#,
        )
        .unwrap();
        let m = Manifest::load(dir.path()).unwrap();
        assert_eq!(m.display_name(), "legacy");
        assert_eq!(m.display_version(), "0.0.0");
        assert!(m.engines.is_empty());
        assert_eq!(m.scripts.len(), 1);
        assert_eq!(m.dependencies.keys().collect::<Vec<_>>(), vec!["express"]);
        assert!(m.workspace_patterns().is_empty());
    }

    #[test]
    fn test_workspace_patterns_both_shapes() {
        let list = manifest(r#"{ "workspaces": ["packages/*"] }"#);
        assert_eq!(list.workspace_patterns(), ["packages/*".to_string()]);
        let obj = manifest(r#"{ "workspaces": { "packages": ["apps/web"] } }"#);
        assert_eq!(obj.workspace_patterns(), ["apps/web".to_string()]);
    }
}
