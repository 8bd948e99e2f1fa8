//! Installed-package graph keyed by `name@version`.
//!
//! - [`DependencyGraph`]: arena of [`PackageNode`]s built from a raw
//!   installed tree (or a flat manifest when no tree is available).
//! - [`root_cause`]: upward walk to the direct dependencies that pull a node in.
//! - [`runtime`]: memoized, cycle-safe runtime-class propagation.

pub mod root_cause;
pub mod runtime;

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use serde_json::{json, Value};
use tracing::debug;

use crate::manifest::{DeclaredSets, Manifest};

/// Version used for synthetic workspace nodes so they never collide with real packages.
pub const WORKSPACE_VERSION: &str = "workspace";

pub fn identity(name: &str, version: &str) -> String {
    format!("{}@{}", name, version)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackageNode {
    pub id: String,
    pub name: String,
    pub version: String,
    /// Shallowest occurrence; top-level dependencies sit at 1.
    pub depth: usize,
    pub parents: BTreeSet<String>,
    pub children: BTreeSet<String>,
    /// `dev` flag reported by the tree tool; true only if every occurrence was dev.
    pub dev: Option<bool>,
    pub optional: Option<bool>,
    pub peer: Option<bool>,
}

impl PackageNode {
    fn new(name: &str, version: &str, depth: usize) -> Self {
        PackageNode {
            id: identity(name, version),
            name: name.to_string(),
            version: version.to_string(),
            depth,
            parents: BTreeSet::new(),
            children: BTreeSet::new(),
            dev: None,
            optional: None,
            peer: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub nodes: BTreeMap<String, PackageNode>,
    /// Synthetic per-sub-package nodes of a merged workspace tree.
    pub anchors: BTreeSet<String>,
}

impl DependencyGraph {
    /// Build from an installed tree whose root is the project itself.
    pub fn from_tree(tree: &Value) -> Self {
        let mut graph = DependencyGraph::default();
        let mut walker = TreeWalker {
            graph: &mut graph,
            stack: HashSet::new(),
        };
        for (key, child) in child_entries(tree) {
            walker.visit(key, child, None, 1);
        }
        graph.relax_depths();
        graph
    }

    /// Build from a combined workspace tree: every top-level entry is a
    /// sub-package anchor at depth 0 and its dependencies start at depth 1.
    pub fn from_workspace_tree(tree: &Value) -> Self {
        let mut graph = DependencyGraph::default();
        let mut anchors = BTreeSet::new();
        {
            let mut walker = TreeWalker {
                graph: &mut graph,
                stack: HashSet::new(),
            };
            for (key, child) in child_entries(tree) {
                if let Some(id) = walker.visit(key, child, None, 0) {
                    anchors.insert(id);
                }
            }
        }
        graph.anchors = anchors;
        graph.relax_depths();
        graph
    }

    /// Fallback when no installed tree exists: every declared name at depth 1,
    /// versioned by its declared range.
    pub fn from_manifest(manifest: &Manifest) -> Self {
        DependencyGraph::from_tree(&manifest_as_tree(manifest))
    }

    /// Push shallower depths found on a later revisit down to descendants
    /// recorded through a deeper path. npm prints children only at a
    /// package's first occurrence, so a shallower "deduped" leaf has none.
    fn relax_depths(&mut self) {
        let mut queue: VecDeque<String> = self.nodes.keys().cloned().collect();
        while let Some(id) = queue.pop_front() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            let depth = node.depth + 1;
            let children: Vec<String> = node.children.iter().cloned().collect();
            for child in children {
                if let Some(c) = self.nodes.get_mut(&child) {
                    if c.depth > depth {
                        c.depth = depth;
                        queue.push_back(child);
                    }
                }
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&PackageNode> {
        self.nodes.get(id)
    }

    /// Real packages, in identity order.
    pub fn packages(&self) -> impl Iterator<Item = &PackageNode> {
        self.nodes.values().filter(|n| !self.anchors.contains(&n.id))
    }

    /// Number of distinct installed versions per package name.
    pub fn versions_per_name(&self) -> BTreeMap<&str, usize> {
        let mut out = BTreeMap::new();
        for node in self.packages() {
            *out.entry(node.name.as_str()).or_insert(0) += 1;
        }
        out
    }

    /// Every package name reachable from the tree (anchors excluded).
    pub fn names(&self) -> BTreeSet<String> {
        self.packages().map(|n| n.name.clone()).collect()
    }
}

/// A flat installed-tree payload built from declared ranges only.
pub fn manifest_as_tree(manifest: &Manifest) -> Value {
    let declared = DeclaredSets::from_manifest(manifest);
    let dependencies: serde_json::Map<String, Value> = manifest
        .declared_ranges()
        .into_iter()
        .map(|(name, range)| {
            (
                name.to_string(),
                json!({ "version": range, "dev": declared.dev.contains(name) }),
            )
        })
        .collect();
    json!({
        "name": manifest.display_name(),
        "version": manifest.display_version(),
        "dependencies": dependencies,
    })
}

/// Children of a raw tree node: npm's name-keyed object, or a plain array.
fn child_entries(raw: &Value) -> Vec<(Option<&str>, &Value)> {
    match raw.get("dependencies") {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (Some(k.as_str()), v)).collect(),
        Some(Value::Array(list)) => list.iter().map(|v| (None, v)).collect(),
        _ => Vec::new(),
    }
}

fn merge_flag(current: Option<bool>, raw: &Value, key: &str) -> Option<bool> {
    match (current, raw.get(key).and_then(Value::as_bool)) {
        (Some(a), Some(b)) => Some(a && b),
        (None, Some(b)) => Some(b),
        (a, None) => a,
    }
}

struct TreeWalker<'g> {
    graph: &'g mut DependencyGraph,
    /// Identities on the current descent path.
    stack: HashSet<String>,
}

impl TreeWalker<'_> {
    fn visit(
        &mut self,
        key: Option<&str>,
        raw: &Value,
        parent: Option<&str>,
        depth: usize,
    ) -> Option<String> {
        if !raw.is_object() || raw.get("missing").and_then(Value::as_bool) == Some(true) {
            return None;
        }

        let name = raw
            .get("name")
            .and_then(Value::as_str)
            .or(key)
            .unwrap_or("unknown");
        let version = raw
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let id = identity(name, version);

        let node = self
            .graph
            .nodes
            .entry(id.clone())
            .or_insert_with(|| PackageNode::new(name, version, depth));
        node.depth = node.depth.min(depth);
        node.dev = merge_flag(node.dev, raw, "dev");
        node.optional = merge_flag(node.optional, raw, "optional");
        node.peer = merge_flag(node.peer, raw, "peer");

        if let Some(parent) = parent.filter(|p| *p != id) {
            node.parents.insert(parent.to_string());
            if let Some(p) = self.graph.nodes.get_mut(parent) {
                p.children.insert(id.clone());
            }
        }

        if !self.stack.insert(id.clone()) {
            debug!(package = %id, "cyclic reference in installed tree, not descending");
            return Some(id);
        }
        for (child_key, child) in child_entries(raw) {
            self.visit(child_key, child, Some(&id), depth + 1);
        }
        self.stack.remove(&id);

        Some(id)
    }
}
