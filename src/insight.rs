//! Per-package inspection of installed files under `node_modules`.
//!
//! Results are cached by package name for the lifetime of one
//! [`InsightGatherer`]; unreadable packages yield [`PackageInsight::unknown`].

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::license::extract_license;
use crate::models::{DataStatus, RiskTier};

const INSTALL_SCRIPTS: &[&str] = &["preinstall", "install", "postinstall"];
const NATIVE_TOOLS: &[&str] = &["node-gyp", "prebuild-install", "node-pre-gyp", "cmake-js"];
const NATIVE_DEPS: &[&str] = &["node-gyp-build", "bindings", "nan", "node-addon-api", "prebuild-install"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    Esm,
    Cjs,
    Dual,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypesSource {
    Bundled,
    External,
    None,
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyCounts {
    pub runtime: usize,
    pub peer: usize,
    pub optional: usize,
    pub dev: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Links {
    pub homepage: Option<String>,
    pub repository: Option<String>,
    pub bugs: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageInsight {
    pub status: DataStatus,
    pub license: Option<String>,
    pub dependency_counts: DependencyCounts,
    /// Evidence of a native build: `binding.gyp`, `*.node` artifacts, build tooling.
    pub native_signals: Vec<String>,
    pub install_scripts: Vec<String>,
    pub module_format: ModuleFormat,
    pub types: TypesSource,
    pub size_bytes: u64,
    pub file_count: usize,
    pub deprecated: Option<String>,
    pub engines: BTreeMap<String, String>,
    pub links: Links,
}

impl PackageInsight {
    pub fn unknown() -> Self {
        PackageInsight {
            status: DataStatus::Unknown,
            license: None,
            dependency_counts: DependencyCounts::default(),
            native_signals: Vec::new(),
            install_scripts: Vec::new(),
            module_format: ModuleFormat::Unknown,
            types: TypesSource::Unknown,
            size_bytes: 0,
            file_count: 0,
            deprecated: None,
            engines: BTreeMap::new(),
            links: Links::default(),
        }
    }

    pub fn is_native(&self) -> bool {
        !self.native_signals.is_empty()
    }

    pub fn build_risk(&self) -> RiskTier {
        if self.status == DataStatus::Unknown {
            RiskTier::Unknown
        } else if self.is_native() {
            RiskTier::High
        } else if !self.install_scripts.is_empty() {
            RiskTier::Medium
        } else {
            RiskTier::None
        }
    }
}

/// Inspects installed packages, searching each root's `node_modules` in order.
pub struct InsightGatherer {
    roots: Vec<PathBuf>,
    cache: HashMap<String, PackageInsight>,
}

impl InsightGatherer {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        InsightGatherer {
            roots,
            cache: HashMap::new(),
        }
    }

    pub fn inspect(&mut self, name: &str) -> PackageInsight {
        if let Some(hit) = self.cache.get(name) {
            debug!(package = name, "insight cache hit");
            return hit.clone();
        }
        let insight = match self.locate(name) {
            Some(dir) => gather(&dir, name, &self.roots).unwrap_or_else(|e| {
                debug!(package = name, error = %e, "package inspection failed");
                PackageInsight::unknown()
            }),
            None => {
                debug!(package = name, "package not installed");
                PackageInsight::unknown()
            }
        };
        self.cache.insert(name.to_string(), insight.clone());
        insight
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        self.roots
            .iter()
            .map(|root| root.join("node_modules").join(name))
            .find(|dir| dir.join("package.json").is_file())
    }
}

fn gather(dir: &Path, name: &str, roots: &[PathBuf]) -> Result<PackageInsight> {
    let manifest_path = dir.join("package.json");
    let content = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("cannot read {}", manifest_path.display()))?;
    let manifest: Value = serde_json::from_str(&content)
        .with_context(|| format!("cannot parse {}", manifest_path.display()))?;

    let count = |key: &str| {
        manifest
            .get(key)
            .and_then(Value::as_object)
            .map(|m| m.len())
            .unwrap_or(0)
    };
    let dependency_counts = DependencyCounts {
        runtime: count("dependencies"),
        peer: count("peerDependencies"),
        optional: count("optionalDependencies"),
        dev: count("devDependencies"),
    };

    let scripts: BTreeMap<String, String> = manifest
        .get("scripts")
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();
    let install_scripts: Vec<String> = INSTALL_SCRIPTS
        .iter()
        .filter(|s| scripts.contains_key(**s))
        .map(|s| s.to_string())
        .collect();

    let (size_bytes, file_count, has_node_artifact) = walk_package(dir);

    let mut native_signals = Vec::new();
    if dir.join("binding.gyp").is_file() {
        native_signals.push("binding.gyp".to_string());
    }
    if manifest.get("gypfile").and_then(Value::as_bool) == Some(true) {
        native_signals.push("gypfile".to_string());
    }
    if has_node_artifact {
        native_signals.push("compiled .node artifact".to_string());
    }
    for tool in NATIVE_TOOLS {
        if scripts.values().any(|cmd| cmd.contains(tool)) {
            native_signals.push(format!("script invokes {}", tool));
        }
    }
    if let Some(deps) = manifest.get("dependencies").and_then(Value::as_object) {
        for dep in NATIVE_DEPS {
            if deps.contains_key(*dep) {
                native_signals.push(format!("depends on {}", dep));
            }
        }
    }

    let engines = manifest
        .get("engines")
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();

    Ok(PackageInsight {
        status: DataStatus::Resolved,
        license: extract_license(&manifest),
        dependency_counts,
        native_signals,
        install_scripts,
        module_format: module_format(&manifest),
        types: types_source(&manifest, dir, name, roots),
        size_bytes,
        file_count,
        deprecated: manifest
            .get("deprecated")
            .and_then(Value::as_str)
            .map(str::to_string),
        engines,
        links: Links {
            homepage: manifest.get("homepage").and_then(Value::as_str).map(str::to_string),
            repository: url_field(manifest.get("repository")),
            bugs: url_field(manifest.get("bugs")),
        },
    })
}

/// Total size, file count and whether any `*.node` binary ships, ignoring
/// nested `node_modules`.
fn walk_package(dir: &Path) -> (u64, usize, bool) {
    let mut size = 0;
    let mut files = 0;
    let mut native = false;
    for entry in WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != "node_modules")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        files += 1;
        size += entry.metadata().map(|m| m.len()).unwrap_or(0);
        if entry.path().extension().is_some_and(|ext| ext == "node") {
            native = true;
        }
    }
    (size, files, native)
}

fn module_format(manifest: &Value) -> ModuleFormat {
    if manifest.get("type").and_then(Value::as_str) == Some("module") {
        return ModuleFormat::Esm;
    }
    if let Some(exports) = manifest.get("exports") {
        if has_key(exports, "import") && has_key(exports, "require") {
            return ModuleFormat::Dual;
        }
    }
    if manifest.get("module").is_some() && manifest.get("main").is_some() {
        return ModuleFormat::Dual;
    }
    ModuleFormat::Cjs
}

fn types_source(manifest: &Value, dir: &Path, name: &str, roots: &[PathBuf]) -> TypesSource {
    let declared = manifest.get("types").is_some()
        || manifest.get("typings").is_some()
        || manifest.get("exports").is_some_and(|e| has_key(e, "types"));
    if declared || dir.join("index.d.ts").is_file() {
        return TypesSource::Bundled;
    }
    let types_name = match name.strip_prefix('@') {
        Some(scoped) => scoped.replacen('/', "__", 1),
        None => name.to_string(),
    };
    let external = roots.iter().any(|root| {
        root.join("node_modules")
            .join("@types")
            .join(&types_name)
            .join("package.json")
            .is_file()
    });
    if external {
        TypesSource::External
    } else {
        TypesSource::None
    }
}

/// Whether `key` appears anywhere in a nested `exports` map.
fn has_key(value: &Value, key: &str) -> bool {
    match value {
        Value::Object(map) => map.contains_key(key) || map.values().any(|v| has_key(v, key)),
        Value::Array(list) => list.iter().any(|v| has_key(v, key)),
        _ => false,
    }
}

fn url_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("url").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}
