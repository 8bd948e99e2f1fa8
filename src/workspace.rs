//! Monorepo merge: one [`ProjectScan`] per sub-package stitched into a single
//! [`AggregateInput`].
//!
//! File identities are prefixed with the sub-package directory, audit counts
//! are summed per package name, and the installed trees are combined under one
//! synthetic anchor node per sub-package.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde_json::{json, Map, Value};
use tracing::info;

use crate::aggregate::{index_audit, record_error, AggregateInput, ProjectScan};
use crate::audit::VulnIndex;
use crate::graph::{manifest_as_tree, DependencyGraph, WORKSPACE_VERSION};
use crate::imports::ImportGraph;
use crate::manifest::{DeclaredSets, Manifest};
use crate::models::ProjectInfo;

#[derive(Debug)]
pub struct SubPackageScan {
    /// Sub-package directory relative to the workspace root, `/`-separated.
    pub key: String,
    pub scan: ProjectScan,
}

pub fn merge(
    root: &Path,
    root_manifest: &Manifest,
    subs: Vec<SubPackageScan>,
    mut errors: BTreeMap<String, String>,
) -> AggregateInput {
    info!(packages = subs.len(), "merging workspace sub-packages");

    let mut declared = DeclaredSets::from_manifest(root_manifest);
    let mut vulns = VulnIndex::unknown();
    let mut imports: Option<ImportGraph> = None;
    let mut usage: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut combined = Map::new();
    let mut insight_roots = Vec::new();

    for SubPackageScan { key, scan } in subs {
        for err in &scan.errors {
            record_error(&mut errors, err, Some(&key));
        }
        declared.add(&scan.manifest);
        insight_roots.push(scan.dir.clone());

        let index = index_audit(scan.audit.as_ref(), &mut errors, Some(&key));
        vulns.merge(&index);

        if let Some(graph) = scan.imports {
            imports
                .get_or_insert_with(ImportGraph::default)
                .merge(graph.prefixed(&key));
        }

        let tree = match scan.tree {
            Some(tree) => tree,
            None => manifest_as_tree(&scan.manifest),
        };
        let dependencies = tree.get("dependencies").cloned().unwrap_or_else(|| json!({}));

        let sub_graph = DependencyGraph::from_tree(&tree);
        let required = sub_graph
            .names()
            .into_iter()
            .chain(DeclaredSets::from_manifest(&scan.manifest).all_names());
        for name in required {
            usage.entry(name).or_default().insert(key.clone());
        }

        combined.insert(
            key.clone(),
            json!({
                "name": key,
                "version": WORKSPACE_VERSION,
                "dependencies": dependencies,
            }),
        );
    }
    insight_roots.push(root.to_path_buf());

    let tree = json!({
        "name": root_manifest.display_name(),
        "version": root_manifest.display_version(),
        "dependencies": Value::Object(combined),
    });

    AggregateInput {
        project: ProjectInfo {
            name: root_manifest.display_name().to_string(),
            version: root_manifest.display_version().to_string(),
            root: root.display().to_string(),
            workspace: true,
        },
        graph: DependencyGraph::from_workspace_tree(&tree),
        declared,
        vulns,
        imports,
        workspace_usage: usage,
        insight_roots,
        errors,
    }
}
