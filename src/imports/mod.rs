//! Static import resolution.
//!
//! Scans project sources for import-like statements and maps each specifier
//! to a project file, an installed package name, a platform built-in, or an
//! unresolved entry. Static only: computed specifiers, runtime plugin loading
//! and string-built paths are invisible to this pass.

pub mod builtins;

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::config::ImportConfig;
use builtins::is_builtin;

/// Caveat attached to every usage signal in the report.
pub const STATIC_ONLY_NOTE: &str = "Usage is derived from static import scanning only; \
dynamic imports with computed specifiers, runtime plugin loading and string-built paths are not detected.";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnresolvedImport {
    pub file: String,
    pub specifier: String,
}

/// File-level import graph for one project (or a merged workspace).
#[derive(Debug, Clone, Default)]
pub struct ImportGraph {
    /// Every scanned file -> project files it imports.
    pub files: BTreeMap<String, BTreeSet<String>>,
    /// File -> package name -> number of specifiers reducing to it.
    pub packages: BTreeMap<String, BTreeMap<String, usize>>,
    /// File -> built-in modules it imports, excluded from package usage.
    pub builtins: BTreeMap<String, BTreeSet<String>>,
    pub unresolved: Vec<UnresolvedImport>,
}

impl ImportGraph {
    /// Package name -> files importing it.
    pub fn importers_by_package(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut out: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (file, packages) in &self.packages {
            for package in packages.keys() {
                out.entry(package.clone()).or_default().insert(file.clone());
            }
        }
        out
    }

    /// Re-key every file identity under `prefix/`.
    pub fn prefixed(self, prefix: &str) -> ImportGraph {
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() || prefix == "." {
            return self;
        }
        let p = |s: &str| format!("{}/{}", prefix, s);
        ImportGraph {
            files: self
                .files
                .into_iter()
                .map(|(k, targets)| (p(k.as_str()), targets.iter().map(|t| p(t.as_str())).collect()))
                .collect(),
            packages: self.packages.into_iter().map(|(k, v)| (p(k.as_str()), v)).collect(),
            builtins: self.builtins.into_iter().map(|(k, v)| (p(k.as_str()), v)).collect(),
            unresolved: self
                .unresolved
                .into_iter()
                .map(|u| UnresolvedImport {
                    file: p(u.file.as_str()),
                    specifier: u.specifier,
                })
                .collect(),
        }
    }

    pub fn merge(&mut self, other: ImportGraph) {
        for (file, targets) in other.files {
            self.files.entry(file).or_default().extend(targets);
        }
        for (file, packages) in other.packages {
            let entry = self.packages.entry(file).or_default();
            for (package, count) in packages {
                *entry.entry(package).or_insert(0) += count;
            }
        }
        for (file, names) in other.builtins {
            self.builtins.entry(file).or_default().extend(names);
        }
        self.unresolved.extend(other.unresolved);
        self.unresolved.sort();
        self.unresolved.dedup();
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Resolution {
    File(String),
    Package(String),
    Builtin(String),
    Unresolved,
}

pub struct ImportResolver<'c> {
    root: PathBuf,
    config: &'c ImportConfig,
    patterns: Vec<Regex>,
}

impl<'c> ImportResolver<'c> {
    pub fn new(root: &Path, config: &'c ImportConfig) -> Result<Self> {
        let patterns = [
            // import x from '..', import { a } from "..", import '..', import type ...
            r#"\bimport\s+(?:type\s+)?(?:[\w$*{}\s,]+?\s+from\s+)?["']([^"'\n]+)["']"#,
            // export * from '..', export { a } from '..'
            r#"\bexport\s+(?:type\s+)?(?:\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s+from\s+["']([^"'\n]+)["']"#,
            // import('..')
            r#"\bimport\s*\(\s*["']([^"'\n]+)["']\s*\)"#,
            // require('..')
            r#"\brequire\s*\(\s*["']([^"'\n]+)["']\s*\)"#,
        ]
        .iter()
        .map(|p| Regex::new(p))
        .collect::<Result<Vec<_>, _>>()?;

        Ok(ImportResolver {
            root: root.to_path_buf(),
            config,
            patterns,
        })
    }

    /// Scan every source file and build the import graph.
    pub fn scan(&self) -> Result<ImportGraph> {
        let mut graph = ImportGraph::default();
        let files = self.source_files();
        info!(root = %self.root.display(), files = files.len(), "scanning imports");

        for file in files {
            let content = match std::fs::read_to_string(&file) {
                Ok(c) => c,
                Err(e) => {
                    debug!(file = %file.display(), error = %e, "skipping unreadable source");
                    continue;
                }
            };
            let key = relative_key(&self.root, &file);
            graph.files.entry(key.clone()).or_default();

            for specifier in self.extract_specifiers(&content) {
                match self.classify(&file, &specifier) {
                    Resolution::File(target) => {
                        graph.files.entry(key.clone()).or_default().insert(target);
                    }
                    Resolution::Package(name) => {
                        *graph
                            .packages
                            .entry(key.clone())
                            .or_default()
                            .entry(name)
                            .or_insert(0) += 1;
                    }
                    Resolution::Builtin(name) => {
                        graph.builtins.entry(key.clone()).or_default().insert(name);
                    }
                    Resolution::Unresolved => {
                        debug!(file = %key, specifier = %specifier, "unresolved import");
                        graph.unresolved.push(UnresolvedImport {
                            file: key.clone(),
                            specifier,
                        });
                    }
                }
            }
        }

        graph.unresolved.sort();
        Ok(graph)
    }

    fn source_root(&self) -> PathBuf {
        let src = self.root.join(&self.config.source_dir);
        if !self.config.source_dir.is_empty() && src.is_dir() {
            src
        } else {
            self.root.clone()
        }
    }

    fn source_files(&self) -> Vec<PathBuf> {
        let ignore = &self.config.ignore_dirs;
        let skip = |entry: &DirEntry| {
            let name = entry.file_name().to_string_lossy();
            entry.depth() > 0 && (name.starts_with('.') || ignore.iter().any(|d| d.as_str() == &*name))
        };

        let mut files: Vec<PathBuf> = WalkDir::new(self.source_root())
            .into_iter()
            .filter_entry(|e| !skip(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| self.has_source_extension(p))
            .collect();
        files.sort();
        files
    }

    fn has_source_extension(&self, path: &Path) -> bool {
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        if name.ends_with(".d.ts") {
            return false;
        }
        path.extension()
            .map(|ext| {
                let ext = ext.to_string_lossy();
                self.config.extensions.iter().any(|e| e.as_str() == &*ext)
            })
            .unwrap_or(false)
    }

    /// Import-like specifiers in `source`, deduplicated.
    pub fn extract_specifiers(&self, source: &str) -> BTreeSet<String> {
        self.patterns
            .iter()
            .flat_map(|re| re.captures_iter(source))
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect()
    }

    fn classify(&self, importer: &Path, specifier: &str) -> Resolution {
        if is_relative(specifier) {
            let dir = importer.parent().unwrap_or(self.root.as_path());
            return match self.resolve_file(&dir.join(specifier)) {
                Some(path) => Resolution::File(relative_key(&self.root, &path)),
                None => Resolution::Unresolved,
            };
        }
        if is_builtin(specifier) {
            return Resolution::Builtin(specifier.trim_start_matches("node:").to_string());
        }
        match package_name(specifier) {
            Some(name) => Resolution::Package(name),
            None => Resolution::Unresolved,
        }
    }

    /// Exact path, then each extension appended, then `index.<ext>` inside a directory.
    fn resolve_file(&self, base: &Path) -> Option<PathBuf> {
        let base = normalize(base);
        if base.is_file() {
            return Some(base);
        }
        for ext in &self.config.extensions {
            let mut candidate: OsString = base.clone().into_os_string();
            candidate.push(".");
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        if base.is_dir() {
            for ext in &self.config.extensions {
                let candidate = base.join(format!("index.{}", ext));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
}

/// `@scope/name/sub` -> `@scope/name`, `name/sub` -> `name`.
/// Subpath imports (`#x`) and protocol specifiers (`virtual:x`) have no package.
pub fn package_name(specifier: &str) -> Option<String> {
    if specifier.starts_with('#') || specifier.contains(':') {
        return None;
    }
    let mut parts = specifier.split('/');
    let first = parts.next().filter(|s| !s.is_empty())?;
    if first.starts_with('@') {
        let second = parts.next().filter(|s| !s.is_empty())?;
        Some(format!("{}/{}", first, second))
    } else {
        Some(first.to_string())
    }
}

/// Lexically resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Project-relative, `/`-separated identity of a file.
fn relative_key(root: &Path, path: &Path) -> String {
    let root = normalize(root);
    let path = normalize(path);
    let rel = path.strip_prefix(&root).unwrap_or(&path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn scan(root: &Path) -> ImportGraph {
        let config = ImportConfig::default();
        ImportResolver::new(root, &config).unwrap().scan().unwrap()
    }

    #[test]
    fn test_extract_specifier_forms() {
        let config = ImportConfig::default();
        let resolver = ImportResolver::new(Path::new("."), &config).unwrap();
        let source = r#"
import React, { useState } from 'react';
import * as path from "node:path";
import type { Foo } from '@scope/types/sub';
import './styles.css';
import {
  a,
  b as c,
} from "multi-line";
export * from './reexport';
export { x } from 'reexported-pkg';
const lazy = import('./lazy');
const fs = require("fs");
const again = require('react');
"#;
        let specs = resolver.extract_specifiers(source);
        let expected: BTreeSet<String> = [
            "react",
            "node:path",
            "@scope/types/sub",
            "./styles.css",
            "multi-line",
            "./reexport",
            "reexported-pkg",
            "./lazy",
            "fs",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(specs, expected);
    }

    #[test]
    fn test_package_name_reduction() {
        assert_eq!(package_name("lodash/fp"), Some("lodash".to_string()));
        assert_eq!(package_name("@scope/name/deep/path"), Some("@scope/name".to_string()));
        assert_eq!(package_name("@scope"), None);
        assert_eq!(package_name("#internal"), None);
        assert_eq!(package_name("virtual:module"), None);
    }

    #[test]
    fn test_relative_resolution_order() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(
            root,
            "src/index.ts",
            "import x from './util';\nimport y from './missing';\nimport z from './lib';\nimport d from './data.json';\n",
        );
        write(root, "src/util.ts", "export default 1;\n");
        write(root, "src/lib/index.js", "module.exports = 1;\n");
        write(root, "src/data.json", "{}");

        let graph = scan(root);
        let targets = &graph.files["src/index.ts"];
        assert!(targets.contains("src/util.ts"));
        assert!(targets.contains("src/lib/index.js"));
        assert!(targets.contains("src/data.json"));
        assert_eq!(
            graph.unresolved,
            vec![UnresolvedImport {
                file: "src/index.ts".to_string(),
                specifier: "./missing".to_string(),
            }]
        );
    }

    #[test]
    fn test_parent_directory_resolution() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "src/a/b.ts", "import { h } from '../helpers';\n");
        write(root, "src/helpers.ts", "export const h = 1;\n");
        let graph = scan(root);
        assert!(graph.files["src/a/b.ts"].contains("src/helpers.ts"));
    }

    #[test]
    fn test_builtins_never_count_as_packages() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(
            root,
            "src/main.js",
            "const fs = require('fs');\nimport p from 'node:path';\nimport l from 'lodash/fp';\nimport m from 'lodash';\n",
        );
        let graph = scan(root);
        let packages = &graph.packages["src/main.js"];
        assert_eq!(packages.len(), 1);
        assert_eq!(packages["lodash"], 2);
        assert!(graph.builtins["src/main.js"].contains("fs"));
        assert!(graph.builtins["src/main.js"].contains("path"));
    }

    #[test]
    fn test_ignored_and_hidden_dirs_are_skipped() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "index.js", "require('a');\n");
        write(root, "node_modules/a/index.js", "require('b');\n");
        write(root, "dist/bundle.js", "require('c');\n");
        write(root, ".cache/x.js", "require('d');\n");
        write(root, "types.d.ts", "import 'e';\n");
        let graph = scan(root);
        assert_eq!(graph.files.keys().collect::<Vec<_>>(), vec!["index.js"]);
    }

    #[test]
    fn test_prefixed_keys_do_not_collide() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        write(a.path(), "src/index.ts", "import 'react';\n");
        write(b.path(), "src/index.ts", "import 'vue';\n");

        let mut merged = ImportGraph::default();
        merged.merge(scan(a.path()).prefixed("pkgA"));
        merged.merge(scan(b.path()).prefixed("pkgB"));

        assert!(merged.files.contains_key("pkgA/src/index.ts"));
        assert!(merged.files.contains_key("pkgB/src/index.ts"));
        let importers = merged.importers_by_package();
        assert_eq!(
            importers["react"].iter().collect::<Vec<_>>(),
            vec!["pkgA/src/index.ts"]
        );
    }
}
