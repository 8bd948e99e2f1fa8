use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::imports::UnresolvedImport;
use crate::insight::PackageInsight;

/// One enriched entry per installed `name@version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub id: String,
    pub name: String,
    pub version: String,
    pub direct: bool,
    pub scope: Scope,
    pub runtime_class: RuntimeClass,
    /// Heuristic, derived from package names only.
    pub reason: IntroReason,
    pub depth: usize,
    pub root_causes: Vec<String>,
    /// Size of the full root-cause set before truncation to `root_causes`.
    pub root_cause_count: usize,
    pub fan_in: usize,
    pub fan_out: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub workspaces: Vec<String>,
    pub license: Option<String>,
    pub license_risk: LicenseRisk,
    pub vulnerabilities: VulnerabilityInfo,
    pub build_risk: RiskTier,
    pub upgrade_risk: RiskTier,
    pub insight: PackageInsight,
    pub usage: UsageInfo,
}

impl DependencyRecord {
    /// Any risk tier at `medium` or above, or a license that restricts redistribution.
    pub fn is_risky(&self) -> bool {
        [self.vulnerabilities.risk, self.build_risk, self.upgrade_risk]
            .iter()
            .any(|r| matches!(r, RiskTier::Medium | RiskTier::High))
            || matches!(
                self.license_risk,
                LicenseRisk::StrongCopyleft | LicenseRisk::Proprietary
            )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Runtime,
    Dev,
    Optional,
    Peer,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Runtime => write!(f, "runtime"),
            Scope::Dev => write!(f, "dev"),
            Scope::Optional => write!(f, "optional"),
            Scope::Peer => write!(f, "peer"),
        }
    }
}

/// How a package's code reaches the running system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeClass {
    Runtime,
    BuildTime,
    DevOnly,
}

impl std::fmt::Display for RuntimeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeClass::Runtime => write!(f, "runtime"),
            RuntimeClass::BuildTime => write!(f, "build-time"),
            RuntimeClass::DevOnly => write!(f, "dev-only"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntroReason {
    Direct,
    Tooling,
    Framework,
    Testing,
    Transitive,
    Unknown,
}

impl std::fmt::Display for IntroReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntroReason::Direct => write!(f, "direct"),
            IntroReason::Tooling => write!(f, "tooling"),
            IntroReason::Framework => write!(f, "framework"),
            IntroReason::Testing => write!(f, "testing"),
            IntroReason::Transitive => write!(f, "transitive"),
            IntroReason::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LicenseRisk {
    Permissive,
    WeakCopyleft,
    StrongCopyleft,
    Proprietary,
    Unknown,
}

impl std::fmt::Display for LicenseRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LicenseRisk::Permissive => write!(f, "Permissive"),
            LicenseRisk::WeakCopyleft => write!(f, "Weak Copyleft"),
            LicenseRisk::StrongCopyleft => write!(f, "Strong Copyleft"),
            LicenseRisk::Proprietary => write!(f, "Proprietary"),
            LicenseRisk::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Advisory severity, ordered `none < low < moderate < high < critical`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    None,
    Low,
    Moderate,
    High,
    Critical,
}

impl Severity {
    /// Unknown or missing severities count as `low`.
    pub fn parse_lossy(raw: Option<&str>) -> Severity {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("critical") => Severity::Critical,
            Some("high") => Severity::High,
            Some("moderate") | Some("medium") => Severity::Moderate,
            Some("none") => Severity::None,
            _ => Severity::Low,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::None => write!(f, "none"),
            Severity::Low => write!(f, "low"),
            Severity::Moderate => write!(f, "moderate"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    None,
    Low,
    Medium,
    High,
    Unknown,
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskTier::None => write!(f, "none"),
            RiskTier::Low => write!(f, "low"),
            RiskTier::Medium => write!(f, "medium"),
            RiskTier::High => write!(f, "high"),
            RiskTier::Unknown => write!(f, "unknown"),
        }
    }
}

/// Whether a field group was computed from real data or degraded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataStatus {
    Resolved,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: u32,
    pub high: u32,
    pub moderate: u32,
    pub low: u32,
}

impl SeverityCounts {
    pub fn add(&mut self, severity: Severity, n: u32) {
        match severity {
            Severity::Critical => self.critical += n,
            Severity::High => self.high += n,
            Severity::Moderate => self.moderate += n,
            Severity::Low => self.low += n,
            Severity::None => {}
        }
    }

    pub fn merge(&mut self, other: &SeverityCounts) {
        self.critical += other.critical;
        self.high += other.high;
        self.moderate += other.moderate;
        self.low += other.low;
    }

    pub fn total(&self) -> u32 {
        self.critical + self.high + self.moderate + self.low
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VulnerabilityInfo {
    pub status: DataStatus,
    pub counts: SeverityCounts,
    pub highest: Severity,
    pub risk: RiskTier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageInfo {
    pub status: DataStatus,
    /// Number of project source files statically importing this package.
    pub import_count: usize,
    pub sample_files: Vec<String>,
    /// Imported by project sources without being declared in the manifest.
    pub undeclared: bool,
    /// Declared directly but never imported by any scanned source file.
    pub unused: bool,
    /// Usage comes from static import scanning only.
    pub static_only: bool,
}

impl UsageInfo {
    pub fn unknown() -> Self {
        UsageInfo {
            status: DataStatus::Unknown,
            import_count: 0,
            sample_files: Vec::new(),
            undeclared: false,
            unused: false,
            static_only: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub version: String,
    pub root: String,
    pub workspace: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassCounts {
    pub runtime: usize,
    pub build_time: usize,
    pub dev_only: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub direct: usize,
    pub transitive: usize,
    pub runtime_classes: ClassCounts,
    pub vulnerable: usize,
    pub unresolved_imports: Vec<UnresolvedImport>,
    /// Package name -> number of importing source files.
    pub hotness: BTreeMap<String, usize>,
    /// Imported package names that are not installed at all.
    pub missing_imports: Vec<String>,
    /// Package name -> sub-packages that declare or transitively require it.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub workspace_usage: BTreeMap<String, Vec<String>>,
    /// Collaborator name -> failure message.
    pub errors: BTreeMap<String, String>,
    pub usage_note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub project: ProjectInfo,
    pub records: BTreeMap<String, DependencyRecord>,
    pub summary: Summary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Moderate);
        assert!(Severity::Moderate > Severity::Low);
        assert!(Severity::Low > Severity::None);
    }

    #[test]
    fn test_severity_defaults_to_low() {
        assert_eq!(Severity::parse_lossy(None), Severity::Low);
        assert_eq!(Severity::parse_lossy(Some("info")), Severity::Low);
        assert_eq!(Severity::parse_lossy(Some("CRITICAL")), Severity::Critical);
        assert_eq!(Severity::parse_lossy(Some("medium")), Severity::Moderate);
    }

    #[test]
    fn test_runtime_class_serializes_kebab() {
        let json = serde_json::to_string(&RuntimeClass::BuildTime).unwrap();
        assert_eq!(json, "\"build-time\"");
    }
}
