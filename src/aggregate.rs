//! Composes graph, audit, import and insight data into [`Report`] records.
//!
//! All per-run state (runtime-class memo, insight cache) lives in values
//! created inside [`aggregate`] and dropped when it returns.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde_json::Value;
use tracing::{info, warn};

use crate::audit::VulnIndex;
use crate::config::{Config, HeuristicsConfig};
use crate::error::CollectError;
use crate::graph::root_cause::trace_root_causes;
use crate::graph::runtime::RuntimeClassifier;
use crate::graph::{DependencyGraph, PackageNode};
use crate::imports::{ImportGraph, STATIC_ONLY_NOTE};
use crate::insight::{InsightGatherer, PackageInsight};
use crate::license::classifier::classify;
use crate::manifest::{DeclaredSets, Manifest};
use crate::models::{
    ClassCounts, DataStatus, DependencyRecord, IntroReason, LicenseRisk, ProjectInfo, Report,
    RiskTier, RuntimeClass, Scope, Summary, UsageInfo,
};

/// Raw inputs gathered for one project directory.
#[derive(Debug)]
pub struct ProjectScan {
    pub dir: PathBuf,
    pub manifest: Manifest,
    pub tree: Option<Value>,
    pub audit: Option<Value>,
    /// `None` when import scanning was disabled or failed.
    pub imports: Option<ImportGraph>,
    pub errors: Vec<CollectError>,
}

/// Normalized inputs ready for aggregation.
#[derive(Debug)]
pub struct AggregateInput {
    pub project: ProjectInfo,
    pub graph: DependencyGraph,
    pub declared: DeclaredSets,
    pub vulns: VulnIndex,
    pub imports: Option<ImportGraph>,
    /// Package name -> sub-packages that declare or transitively require it.
    pub workspace_usage: BTreeMap<String, BTreeSet<String>>,
    /// Directories whose `node_modules` are searched for installed packages.
    pub insight_roots: Vec<PathBuf>,
    pub errors: BTreeMap<String, String>,
}

impl AggregateInput {
    /// Single-project normalization. A missing tree falls back to the manifest.
    pub fn from_scan(scan: ProjectScan) -> Self {
        let mut errors = BTreeMap::new();
        for err in &scan.errors {
            record_error(&mut errors, err, None);
        }

        let graph = match &scan.tree {
            Some(tree) => DependencyGraph::from_tree(tree),
            None => {
                warn!("no installed tree, falling back to declared dependencies");
                DependencyGraph::from_manifest(&scan.manifest)
            }
        };
        let vulns = index_audit(scan.audit.as_ref(), &mut errors, None);

        AggregateInput {
            project: ProjectInfo {
                name: scan.manifest.display_name().to_string(),
                version: scan.manifest.display_version().to_string(),
                root: scan.dir.display().to_string(),
                workspace: false,
            },
            declared: DeclaredSets::from_manifest(&scan.manifest),
            graph,
            vulns,
            imports: scan.imports,
            workspace_usage: BTreeMap::new(),
            insight_roots: vec![scan.dir],
            errors,
        }
    }
}

/// Key collaborator errors by tool name, suffixed with the sub-package in workspace mode.
pub fn record_error(errors: &mut BTreeMap<String, String>, err: &CollectError, scope: Option<&str>) {
    let key = match scope {
        Some(scope) => format!("{}:{}", err.collaborator(), scope),
        None => err.collaborator().to_string(),
    };
    errors.insert(key, err.to_string());
}

/// Audit payload -> index; an unusable payload is recorded and treated as unknown.
pub fn index_audit(
    audit: Option<&Value>,
    errors: &mut BTreeMap<String, String>,
    scope: Option<&str>,
) -> VulnIndex {
    match audit.map(VulnIndex::from_payload) {
        Some(Ok(index)) => index,
        Some(Err(e)) => {
            warn!(error = %e, "audit payload rejected");
            record_error(errors, &e, scope);
            VulnIndex::unknown()
        }
        None => VulnIndex::unknown(),
    }
}

pub fn aggregate(input: AggregateInput, config: &Config) -> Report {
    let AggregateInput {
        project,
        graph,
        declared,
        vulns,
        imports,
        workspace_usage,
        insight_roots,
        errors,
    } = input;

    info!(packages = graph.nodes.len(), "aggregating dependency records");

    let mut insights = InsightGatherer::new(insight_roots);
    let mut classifier = RuntimeClassifier::new(&graph, &declared);
    let versions = graph.versions_per_name();
    let importers = imports.as_ref().map(ImportGraph::importers_by_package);
    let declared_names = declared.all_names();

    let mut records = BTreeMap::new();
    for node in graph.packages() {
        let direct = declared.is_direct(&node.name);
        let all_causes = trace_root_causes(node, &graph, &declared.direct);
        let root_cause_count = all_causes.len();
        let runtime_class = classifier.classify(&node.id);
        let scope = scope_of(node, &declared, direct, runtime_class);

        let insight = insights.inspect(&node.name);
        let license_risk = match &insight.license {
            Some(license) => classify(license, &config.licenses),
            None => LicenseRisk::Unknown,
        };
        let duplicated = versions.get(node.name.as_str()).copied().unwrap_or(0) > 1;

        let usage = match &importers {
            None => UsageInfo::unknown(),
            Some(importers) => {
                let files = importers.get(&node.name);
                let import_count = files.map(BTreeSet::len).unwrap_or(0);
                UsageInfo {
                    status: DataStatus::Resolved,
                    import_count,
                    sample_files: files
                        .map(|f| f.iter().take(config.report.sample_files).cloned().collect())
                        .unwrap_or_default(),
                    undeclared: import_count > 0 && !declared_names.contains(&node.name),
                    unused: direct
                        && scope == Scope::Runtime
                        && import_count == 0
                        && !node.name.starts_with("@types/"),
                    static_only: true,
                }
            }
        };

        let record = DependencyRecord {
            id: node.id.clone(),
            name: node.name.clone(),
            version: node.version.clone(),
            direct,
            scope,
            runtime_class,
            reason: introduction_reason(&node.name, direct, root_cause_count, &config.heuristics),
            depth: node.depth,
            root_causes: all_causes
                .into_iter()
                .take(config.report.max_root_causes.max(1))
                .collect(),
            root_cause_count,
            fan_in: node.parents.len(),
            fan_out: node.children.len(),
            workspaces: workspace_usage
                .get(&node.name)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default(),
            license: insight.license.clone(),
            license_risk,
            vulnerabilities: vulns.info_for(&node.name),
            build_risk: insight.build_risk(),
            upgrade_risk: upgrade_risk(&insight, duplicated),
            insight,
            usage,
        };
        records.insert(record.id.clone(), record);
    }

    let summary = summarize(&records, &graph, imports.as_ref(), &workspace_usage, errors);
    Report {
        project,
        records,
        summary,
    }
}

/// Direct packages take their declared scope; transitive ones use the tree
/// tool's flags, then the runtime class.
fn scope_of(node: &PackageNode, declared: &DeclaredSets, direct: bool, class: RuntimeClass) -> Scope {
    if direct {
        if let Some(scope) = declared.scope_of(&node.name) {
            return scope;
        }
    }
    if node.peer == Some(true) {
        Scope::Peer
    } else if node.optional == Some(true) {
        Scope::Optional
    } else if node.dev == Some(true) || (node.dev.is_none() && class == RuntimeClass::DevOnly) {
        Scope::Dev
    } else {
        Scope::Runtime
    }
}

fn matches_any(name: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| {
        if p.ends_with('/') || p.ends_with('-') {
            name.starts_with(p.as_str())
        } else {
            name == p
        }
    })
}

/// Name-based guess at why a package is present. Heuristic only.
fn introduction_reason(
    name: &str,
    direct: bool,
    root_causes: usize,
    heuristics: &HeuristicsConfig,
) -> IntroReason {
    if direct {
        if matches_any(name, &heuristics.testing) {
            IntroReason::Testing
        } else if matches_any(name, &heuristics.tooling) {
            IntroReason::Tooling
        } else if matches_any(name, &heuristics.framework) {
            IntroReason::Framework
        } else {
            IntroReason::Direct
        }
    } else if root_causes > 0 {
        IntroReason::Transitive
    } else {
        IntroReason::Unknown
    }
}

fn upgrade_risk(insight: &PackageInsight, duplicated: bool) -> RiskTier {
    let resolved = insight.status == DataStatus::Resolved;
    if resolved && (insight.deprecated.is_some() || insight.is_native()) {
        RiskTier::High
    } else if duplicated || insight.dependency_counts.peer > 0 {
        RiskTier::Medium
    } else if resolved {
        RiskTier::Low
    } else {
        RiskTier::Unknown
    }
}

fn summarize(
    records: &BTreeMap<String, DependencyRecord>,
    graph: &DependencyGraph,
    imports: Option<&ImportGraph>,
    workspace_usage: &BTreeMap<String, BTreeSet<String>>,
    errors: BTreeMap<String, String>,
) -> Summary {
    let direct = records.values().filter(|r| r.direct).count();

    let mut classes = ClassCounts::default();
    for record in records.values() {
        match record.runtime_class {
            RuntimeClass::Runtime => classes.runtime += 1,
            RuntimeClass::BuildTime => classes.build_time += 1,
            RuntimeClass::DevOnly => classes.dev_only += 1,
        }
    }

    let hotness: BTreeMap<String, usize> = imports
        .map(|g| {
            g.importers_by_package()
                .into_iter()
                .map(|(name, files)| (name, files.len()))
                .collect()
        })
        .unwrap_or_default();
    let installed = graph.names();
    let missing_imports = hotness
        .keys()
        .filter(|name| !installed.contains(*name))
        .cloned()
        .collect();

    Summary {
        total: records.len(),
        direct,
        transitive: records.len() - direct,
        runtime_classes: classes,
        vulnerable: records
            .values()
            .filter(|r| r.vulnerabilities.counts.total() > 0)
            .count(),
        unresolved_imports: imports.map(|g| g.unresolved.clone()).unwrap_or_default(),
        hotness,
        missing_imports,
        workspace_usage: workspace_usage
            .iter()
            .map(|(name, subs)| (name.clone(), subs.iter().cloned().collect()))
            .collect(),
        errors,
        usage_note: STATIC_ONLY_NOTE.to_string(),
    }
}
