//! Thin wrappers around the external tools that produce raw payloads.
//!
//! Every outcome is captured: a failing tool yields a [`CollectError`] and an
//! absent payload, never an aborted run.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::ToolsConfig;
use crate::error::CollectError;

pub const TREE: &str = "tree";
pub const AUDIT: &str = "audit";

#[derive(Debug, Clone, Default)]
pub struct CollectOptions {
    pub npm: String,
    pub audit: bool,
    /// Pre-fetched `npm ls --json` output used instead of running npm.
    pub tree_file: Option<PathBuf>,
    /// Pre-fetched `npm audit --json` output used instead of running npm.
    pub audit_file: Option<PathBuf>,
}

impl CollectOptions {
    pub fn from_tools(tools: &ToolsConfig) -> Self {
        CollectOptions {
            npm: tools.npm.clone(),
            audit: tools.audit,
            tree_file: None,
            audit_file: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Payloads {
    pub tree: Option<Value>,
    pub audit: Option<Value>,
    pub errors: Vec<CollectError>,
}

/// Produce the tree and audit payloads for `dir`, concurrently.
pub async fn collect(dir: &Path, opts: &CollectOptions) -> Payloads {
    let tree = async {
        match &opts.tree_file {
            Some(path) => load_payload(TREE, path).await,
            None => run_npm(TREE, &opts.npm, &["ls", "--all", "--json", "--long"], dir).await,
        }
    };
    let audit = async {
        if let Some(path) = &opts.audit_file {
            return Some(load_payload(AUDIT, path).await);
        }
        if !opts.audit {
            return None;
        }
        Some(run_npm(AUDIT, &opts.npm, &["audit", "--json"], dir).await)
    };

    let (tree, audit) = tokio::join!(tree, audit);

    let mut payloads = Payloads::default();
    match tree {
        Ok(value) => payloads.tree = Some(value),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "installed tree unavailable");
            payloads.errors.push(e);
        }
    }
    match audit {
        Some(Ok(value)) => payloads.audit = Some(value),
        Some(Err(e)) => {
            warn!(dir = %dir.display(), error = %e, "audit unavailable");
            payloads.errors.push(e);
        }
        None => info!(dir = %dir.display(), "audit skipped"),
    }
    payloads
}

/// Run npm and parse stdout as JSON. npm exits non-zero when it has findings
/// to report, so the exit status alone is not a failure.
async fn run_npm(
    tool: &'static str,
    npm: &str,
    args: &[&str],
    dir: &Path,
) -> Result<Value, CollectError> {
    let command = format!("{} {}", npm, args.join(" "));
    info!(dir = %dir.display(), command = %command, "running collaborator");

    let output = Command::new(npm)
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .map_err(|source| CollectError::Spawn {
            tool,
            command: command.clone(),
            source,
        })?;

    match serde_json::from_slice::<Value>(&output.stdout) {
        Ok(value) if value.is_object() || value.is_array() => Ok(value),
        parsed => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .find(|l| !l.trim().is_empty())
                .map(str::to_string)
                .or_else(|| parsed.err().map(|e| e.to_string()))
                .unwrap_or_else(|| "no JSON output".to_string());
            Err(CollectError::Output {
                tool,
                status: output.status.to_string(),
                reason,
            })
        }
    }
}

async fn load_payload(tool: &'static str, path: &Path) -> Result<Value, CollectError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CollectError::PayloadFile {
            tool,
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    serde_json::from_str(&content).map_err(|e| CollectError::PayloadFile {
        tool,
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[tokio::test]
    async fn test_payload_files_replace_tools() {
        let mut tree = NamedTempFile::new().unwrap();
        write!(tree, r#"{{ "name": "app", "dependencies": {{}} }}"#).unwrap();
        let mut audit = NamedTempFile::new().unwrap();
        write!(audit, r#"{{ "vulnerabilities": {{}} }}"#).unwrap();

        let opts = CollectOptions {
            npm: "definitely-not-npm".to_string(),
            audit: true,
            tree_file: Some(tree.path().to_path_buf()),
            audit_file: Some(audit.path().to_path_buf()),
        };
        let dir = TempDir::new().unwrap();
        let payloads = collect(dir.path(), &opts).await;
        assert!(payloads.errors.is_empty());
        assert!(payloads.tree.is_some());
        assert!(payloads.audit.is_some());
    }

    #[tokio::test]
    async fn test_missing_tool_is_captured() {
        let opts = CollectOptions {
            npm: "depscope-no-such-binary".to_string(),
            audit: false,
            tree_file: None,
            audit_file: None,
        };
        let dir = TempDir::new().unwrap();
        let payloads = collect(dir.path(), &opts).await;
        assert!(payloads.tree.is_none());
        assert!(payloads.audit.is_none());
        assert_eq!(payloads.errors.len(), 1);
        assert_eq!(payloads.errors[0].collaborator(), TREE);
    }

    #[tokio::test]
    async fn test_bad_payload_file() {
        let mut bad = NamedTempFile::new().unwrap();
        write!(bad, "not json").unwrap();
        let err = load_payload(AUDIT, bad.path()).await.unwrap_err();
        assert_eq!(err.collaborator(), AUDIT);
    }
}
