use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::LicenseRisk;

/// Root configuration, deserialized from `.depscope/config.toml`.
///
/// Every section and field has a default so partial files are valid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub imports: ImportConfig,
    pub report: ReportConfig,
    pub heuristics: HeuristicsConfig,
    pub tools: ToolsConfig,
    /// License id -> risk tier, checked before the built-in table.
    pub licenses: HashMap<String, LicenseRisk>,
}

/// Source scanning for the static import resolver.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Recognized source extensions, in resolution order, without the dot.
    pub extensions: Vec<String>,
    /// Directory names never descended into.
    pub ignore_dirs: Vec<String>,
    /// Source root relative to the project; the project root is used if absent.
    pub source_dir: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            extensions: ["js", "jsx", "ts", "tsx", "mjs", "cjs", "mts", "cts"]
                .into_iter()
                .map(String::from)
                .collect(),
            ignore_dirs: [
                "node_modules",
                "dist",
                "build",
                "out",
                "coverage",
                ".next",
                ".nuxt",
                ".turbo",
                ".cache",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            source_dir: "src".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Upper bound on root causes kept per record.
    pub max_root_causes: usize,
    /// Upper bound on importing file paths kept per record.
    pub sample_files: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            max_root_causes: 10,
            sample_files: 5,
        }
    }
}

/// Name prefixes for the introduction-reason heuristic.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    pub testing: Vec<String>,
    pub tooling: Vec<String>,
    pub framework: Vec<String>,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        let list = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        HeuristicsConfig {
            testing: list(&[
                "jest",
                "mocha",
                "vitest",
                "chai",
                "sinon",
                "ava",
                "tap",
                "cypress",
                "playwright",
                "@playwright/",
                "@testing-library/",
                "@jest/",
                "nyc",
                "supertest",
            ]),
            tooling: list(&[
                "typescript",
                "eslint",
                "@typescript-eslint/",
                "prettier",
                "webpack",
                "rollup",
                "vite",
                "esbuild",
                "@babel/",
                "babel-",
                "@types/",
                "ts-node",
                "tsx",
                "nodemon",
                "husky",
                "lint-staged",
                "@swc/",
                "turbo",
            ]),
            framework: list(&[
                "react",
                "react-dom",
                "next",
                "vue",
                "nuxt",
                "@angular/",
                "svelte",
                "@sveltejs/",
                "express",
                "koa",
                "fastify",
                "@nestjs/",
                "hapi",
                "@remix-run/",
                "solid-js",
            ]),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// npm executable used for `ls` and `audit`.
    pub npm: String,
    pub audit: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        ToolsConfig {
            npm: "npm".to_string(),
            audit: true,
        }
    }
}

/// Load the configuration, searching in order:
///
/// 1. `config_override`: path passed via `--config`
/// 2. `<project_path>/.depscope/config.toml`
/// 3. `~/.config/depscope/config.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(project_path: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        return read_config(path);
    }

    let project_config = project_path.join(".depscope").join("config.toml");
    if project_config.exists() {
        return read_config(&project_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".config").join("depscope").join("config.toml");
        if home_config.exists() {
            return read_config(&home_config);
        }
    }

    Ok(Config::default())
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("invalid config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_defaults_without_files() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_config(dir.path(), Some(&missing)).is_err());

        let cfg = Config::default();
        assert_eq!(cfg.report.max_root_causes, 10);
        assert!(cfg.imports.extensions.iter().any(|e| e == "ts"));
        assert!(cfg.tools.audit);
    }

    #[test]
    fn test_partial_override_file() {
        let toml = r#"
[report]
sample_files = 2

[tools]
audit = false

[licenses]
"WTFPL" = "unknown"
"#;
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "{}", toml).unwrap();
        let cfg = load_config(Path::new("/nonexistent"), Some(f.path())).unwrap();
        assert_eq!(cfg.report.sample_files, 2);
        assert_eq!(cfg.report.max_root_causes, 10);
        assert!(!cfg.tools.audit);
        assert_eq!(cfg.tools.npm, "npm");
        assert_eq!(cfg.licenses.get("WTFPL"), Some(&LicenseRisk::Unknown));
    }

    #[test]
    fn test_project_config_is_found() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(".depscope")).unwrap();
        std::fs::write(
            dir.path().join(".depscope").join("config.toml"),
            "[imports]\nsource_dir = \"lib\"\n",
        )
        .unwrap();
        let cfg = load_config(dir.path(), None).unwrap();
        assert_eq!(cfg.imports.source_dir, "lib");
    }
}
