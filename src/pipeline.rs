//! Runs the collaborators for one project or every workspace sub-package and
//! hands the joined results to the aggregator.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::aggregate::{aggregate, AggregateInput, ProjectScan};
use crate::collect::{collect, CollectOptions};
use crate::config::{Config, ImportConfig};
use crate::detector::workspace_key;
use crate::error::CollectError;
use crate::imports::{ImportGraph, ImportResolver};
use crate::manifest::Manifest;
use crate::models::Report;
use crate::workspace::{merge, SubPackageScan};

pub const IMPORTS: &str = "imports";

/// Collect payloads and scan imports for one directory. Import scanning runs on
/// the blocking pool alongside the external tools.
pub async fn scan_project(
    dir: PathBuf,
    manifest: Manifest,
    import_config: &ImportConfig,
    opts: &CollectOptions,
    scan_imports: bool,
) -> ProjectScan {
    let import_dir = dir.clone();
    let import_config = import_config.clone();
    let imports = async move {
        if !scan_imports {
            return None;
        }
        let joined = tokio::task::spawn_blocking(move || -> anyhow::Result<ImportGraph> {
            ImportResolver::new(&import_dir, &import_config)?.scan()
        })
        .await;
        Some(match joined {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        })
    };

    let (payloads, imports) = tokio::join!(collect(&dir, opts), imports);

    let mut errors = payloads.errors;
    let imports = match imports {
        Some(Ok(graph)) => Some(graph),
        Some(Err(reason)) => {
            warn!(dir = %dir.display(), error = %reason, "import scan failed");
            errors.push(CollectError::Scan {
                tool: IMPORTS,
                reason,
            });
            None
        }
        None => None,
    };

    ProjectScan {
        dir,
        manifest,
        tree: payloads.tree,
        audit: payloads.audit,
        imports,
        errors,
    }
}

pub async fn run_single(
    root: &Path,
    manifest: Manifest,
    config: &Config,
    opts: &CollectOptions,
    scan_imports: bool,
) -> Report {
    info!(root = %root.display(), "scanning project");
    let scan = scan_project(root.to_path_buf(), manifest, &config.imports, opts, scan_imports).await;
    aggregate(AggregateInput::from_scan(scan), config)
}

/// Scan every sub-package concurrently, wait for all of them, then merge.
/// A sub-package whose own manifest is unreadable is reported and skipped.
pub async fn run_workspace(
    root: &Path,
    root_manifest: &Manifest,
    members: &[PathBuf],
    config: &Config,
    opts: &CollectOptions,
    scan_imports: bool,
    quiet: bool,
) -> Report {
    info!(root = %root.display(), members = members.len(), "scanning workspace");

    let pb = if quiet {
        None
    } else {
        let pb = ProgressBar::new(members.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        Some(pb)
    };

    let scans = members.iter().map(|rel| {
        let pb = pb.clone();
        async move {
            let key = workspace_key(rel);
            let dir = root.join(rel);
            let outcome = match Manifest::load(&dir) {
                Ok(manifest) => Ok(SubPackageScan {
                    scan: scan_project(dir, manifest, &config.imports, opts, scan_imports).await,
                    key,
                }),
                Err(e) => Err((key, format!("{:#}", e))),
            };
            if let Some(pb) = &pb {
                pb.inc(1);
            }
            outcome
        }
    });
    let results = join_all(scans).await;

    if let Some(pb) = pb {
        pb.finish_with_message("Done");
    }

    let mut subs = Vec::new();
    let mut errors = BTreeMap::new();
    for result in results {
        match result {
            Ok(sub) => subs.push(sub),
            Err((key, message)) => {
                warn!(package = %key, error = %message, "skipping sub-package");
                errors.insert(format!("manifest:{}", key), message);
            }
        }
    }

    aggregate(merge(root, root_manifest, subs, errors), config)
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

    fn offline() -> CollectOptions {
        CollectOptions {
            npm: "depscope-no-such-binary".to_string(),
            audit: false,
            tree_file: None,
            audit_file: None,
        }
    }

    #[tokio::test]
    async fn test_single_project_survives_every_collaborator_failing() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "package.json", r#"{ "name": "app", "dependencies": { "lodash": "^4" } }"#);
        write(dir.path(), "src/index.js", "const _ = require('lodash');\nimport x from './missing';\n");

        let manifest = Manifest::load(dir.path()).unwrap();
        let report = run_single(dir.path(), manifest, &Config::default(), &offline(), true).await;

        assert_eq!(report.summary.total, 1);
        assert!(report.summary.errors.contains_key("tree"));
        assert_eq!(report.summary.hotness["lodash"], 1);
        assert_eq!(report.summary.unresolved_imports.len(), 1);
        assert_eq!(report.summary.unresolved_imports[0].specifier, "./missing");
        let lodash = &report.records["lodash@^4"];
        assert_eq!(lodash.usage.import_count, 1);
    }

    #[tokio::test]
    async fn test_workspace_run_prefixes_and_skips_broken_members() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "package.json", r#"{ "name": "mono", "workspaces": ["packages/*"] }"#);
        write(root, "packages/a/package.json", r#"{ "name": "a", "dependencies": { "react": "^18" } }"#);
        write(root, "packages/a/src/index.ts", "import React from 'react';\n");
        write(root, "packages/b/package.json", r#"{ "name": "b", "dependencies": { "vue": "^3" } }"#);
        write(root, "packages/b/src/index.ts", "import { h } from 'vue';\n");
        write(root, "packages/c/package.json", "{ broken");

        let manifest = Manifest::load(root).unwrap();
        let members = crate::detector::detect_workspaces(root, &manifest);
        assert_eq!(members.len(), 3);

        let report = run_workspace(root, &manifest, &members, &Config::default(), &offline(), true, true).await;

        assert!(report.project.workspace);
        assert!(report.summary.errors.contains_key("manifest:packages/c"));
        assert!(report.summary.errors.contains_key("tree:packages/a"));
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.records["react@^18"].usage.sample_files, vec!["packages/a/src/index.ts"]);
        assert_eq!(report.records["vue@^3"].usage.sample_files, vec!["packages/b/src/index.ts"]);
    }
}
