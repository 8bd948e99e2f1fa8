use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "depscope",
    about = "Aggregate a Node project's installed dependencies into a per-package risk report",
    version
)]
pub struct Cli {
    /// Project path to scan
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Config file [default: ./.depscope/config.toml, fallback ~/.config/depscope/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Report format
    #[arg(long, default_value = "terminal", value_name = "FORMAT")]
    pub report: ReportFormat,

    /// Write the JSON report to a file instead of stdout
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Use a saved `npm ls --all --json --long` payload instead of running npm
    #[arg(long, value_name = "FILE")]
    pub tree_json: Option<PathBuf>,

    /// Use a saved `npm audit --json` payload instead of running npm
    #[arg(long, value_name = "FILE")]
    pub audit_json: Option<PathBuf>,

    /// Skip the vulnerability audit
    #[arg(long)]
    pub no_audit: bool,

    /// Skip the source import scan
    #[arg(long)]
    pub no_imports: bool,

    /// Treat a workspace root as a single project
    #[arg(long)]
    pub no_workspaces: bool,

    /// Show every package in the table; repeat for more log output (-vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print the summary line
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}

impl Cli {
    /// Saved payload files describe one project, so they force single-project mode.
    pub fn uses_payload_files(&self) -> bool {
        self.tree_json.is_some() || self.audit_json.is_some()
    }
}
