//! `depscope`: aggregate a Node project's installed dependency tree into one
//! enriched record per package.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]) and initialise logging.
//! 2. Load config ([`config::load_config`]) and the root manifest ([`manifest`]).
//! 3. Detect workspace sub-packages ([`detector::detect_workspaces`]).
//! 4. Collect tree, audit and import data per directory ([`pipeline`], [`collect`], [`imports`]).
//! 5. Merge sub-packages when in workspace mode ([`workspace`]).
//! 6. Build the graph and classify every package ([`graph`], [`audit`], [`insight`], [`aggregate`]).
//! 7. Render the requested report ([`report`]).
//! 8. Exit `0`, or `1` when setup fails (no readable `package.json`, bad `--config`).

mod aggregate;
mod audit;
mod cli;
mod collect;
mod config;
mod detector;
mod error;
mod graph;
mod imports;
mod insight;
mod license;
mod manifest;
mod models;
mod pipeline;
mod report;
mod workspace;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{Cli, ReportFormat};
use collect::CollectOptions;
use config::load_config;
use detector::detect_workspaces;
use manifest::Manifest;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    // Resolve project path
    let path = cli
        .path
        .canonicalize()
        .unwrap_or_else(|_| cli.path.clone());

    let config = load_config(&path, cli.config.as_deref())?;
    let manifest = Manifest::load(&path)?;

    let mut opts = CollectOptions::from_tools(&config.tools);
    if cli.no_audit {
        opts.audit = false;
    }
    opts.tree_file = cli.tree_json.clone();
    opts.audit_file = cli.audit_json.clone();
    let scan_imports = !cli.no_imports;

    let members = if cli.no_workspaces || cli.uses_payload_files() {
        Vec::new()
    } else {
        detect_workspaces(&path, &manifest)
    };

    let report = if members.is_empty() {
        if !cli.quiet {
            eprintln!("  {} scanning {}", "→".cyan(), manifest.display_name());
        }
        pipeline::run_single(&path, manifest, &config, &opts, scan_imports).await
    } else {
        if !cli.quiet {
            eprintln!(
                "  {} workspace {} with {} packages",
                "→".cyan(),
                manifest.display_name(),
                members.len()
            );
        }
        pipeline::run_workspace(
            &path,
            &manifest,
            &members,
            &config,
            &opts,
            scan_imports,
            cli.quiet,
        )
        .await
    };
    info!(
        records = report.records.len(),
        errors = report.summary.errors.len(),
        "aggregation finished"
    );

    match cli.report {
        ReportFormat::Terminal => {
            report::terminal::render(&report, cli.verbose > 0, cli.quiet);
            if let Some(output) = &cli.output {
                report::write_json(&report, Some(output))?;
            }
        }
        ReportFormat::Json => report::write_json(&report, cli.output.as_deref())?,
    }

    Ok(())
}
