//! Report renderers.
//!
//! - [`terminal`]: colored summary box plus a table of risky packages; respects `--verbose` / `--quiet`.
//! - [`write_json`]: the full [`Report`] as pretty JSON, to stdout or a file.

pub mod terminal;

use std::path::Path;

use anyhow::{Context, Result};

use crate::models::Report;

pub fn write_json(report: &Report, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    match output {
        Some(path) => std::fs::write(path, json + "\n")
            .with_context(|| format!("Failed to write report to {}", path.display())),
        None => {
            println!("{}", json);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, AggregateInput, ProjectScan};
    use crate::config::Config;
    use crate::graph::tests::diamond_tree;
    use tempfile::TempDir;

    #[test]
    fn test_json_file_has_records_and_summary() {
        let dir = TempDir::new().unwrap();
        let scan = ProjectScan {
            dir: dir.path().to_path_buf(),
            manifest: serde_json::from_str(r#"{ "name": "app", "dependencies": { "a": "1" } }"#).unwrap(),
            tree: Some(diamond_tree()),
            audit: None,
            imports: None,
            errors: Vec::new(),
        };
        let report = aggregate(AggregateInput::from_scan(scan), &Config::default());

        let out = dir.path().join("report.json");
        write_json(&report, Some(&out)).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(value["project"]["name"], "app");
        assert_eq!(value["records"]["b@2.0.0"]["root_causes"][0], "a");
        assert_eq!(value["records"]["b@2.0.0"]["runtime_class"], "runtime");
        assert_eq!(value["summary"]["total"], 4);
    }
}
