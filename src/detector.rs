use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::manifest::Manifest;

/// Expand the root manifest's `workspaces` patterns into sub-package
/// directories (relative to `root`) that contain a `package.json`.
///
/// Supports literal directories, a trailing `/*` (one level) and a trailing
/// `/**` (any depth). Hidden directories and `node_modules` are never matched
/// or descended into.
pub fn detect_workspaces(root: &Path, manifest: &Manifest) -> Vec<PathBuf> {
    let mut found: BTreeSet<PathBuf> = BTreeSet::new();

    for pattern in manifest.workspace_patterns() {
        let pattern = pattern.trim().trim_start_matches("./").trim_end_matches('/');
        if pattern.is_empty() || pattern.starts_with('!') {
            continue;
        }

        let (parent, max_depth) = match pattern.strip_suffix("/**") {
            Some(parent) => (parent, usize::MAX),
            None => match pattern.strip_suffix("/*") {
                Some(parent) => (parent, 1),
                None => {
                    if root.join(pattern).join("package.json").is_file() {
                        found.insert(PathBuf::from(pattern));
                    }
                    continue;
                }
            },
        };

        let base = root.join(parent);
        let dirs = WalkDir::new(&base)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                let name = e.file_name().to_string_lossy();
                e.file_type().is_dir() && !name.starts_with('.') && name != "node_modules"
            })
            .filter_map(|e| e.ok());
        for entry in dirs {
            if !entry.path().join("package.json").is_file() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(root) {
                found.insert(rel.to_path_buf());
            }
        }
    }

    found.into_iter().collect()
}

/// `/`-separated form of a relative sub-package path, used as identity prefix.
pub fn workspace_key(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
