//! Vulnerability audit normalization.
//!
//! Two historical payload shapes are accepted and resolved once into
//! [`VulnIndex`]:
//! - current: `{ "vulnerabilities": { "<name>": finding | [finding, ...] } }`
//!   where each finding may carry nested `via` advisories (not counted again);
//! - legacy: `{ "advisories": { "<id>": advisory } }`, `{ "advisories": [...] }`
//!   or a bare advisory array.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::CollectError;
use crate::models::{DataStatus, RiskTier, Severity, SeverityCounts, VulnerabilityInfo};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AuditPayload {
    Current {
        vulnerabilities: BTreeMap<String, FindingGroup>,
    },
    Legacy {
        advisories: LegacyAdvisories,
    },
    Flat(Vec<Advisory>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FindingGroup {
    Many(Vec<Finding>),
    One(Finding),
}

#[derive(Debug, Deserialize)]
struct Finding {
    #[serde(default)]
    severity: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LegacyAdvisories {
    List(Vec<Advisory>),
    Map(BTreeMap<String, Advisory>),
}

#[derive(Debug, Deserialize)]
struct Advisory {
    #[serde(default)]
    module_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    severity: Option<String>,
}

/// Severity counts for one package name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VulnSummary {
    pub counts: SeverityCounts,
    pub highest: Severity,
}

impl VulnSummary {
    fn record(&mut self, severity: Severity) {
        self.counts.add(severity, 1);
        self.highest = self.highest.max(severity);
    }

    /// Counts sum, highest is the max of both.
    pub fn merge(&mut self, other: &VulnSummary) {
        self.counts.merge(&other.counts);
        self.highest = self.highest.max(other.highest);
    }
}

/// Per-package-name vulnerability summaries plus whether the audit ran at all.
#[derive(Debug, Clone, Default)]
pub struct VulnIndex {
    pub status: DataStatus,
    pub packages: BTreeMap<String, VulnSummary>,
}

impl VulnIndex {
    /// No audit data: every lookup reports `unknown`.
    pub fn unknown() -> Self {
        VulnIndex::default()
    }

    pub fn from_payload(payload: &Value) -> Result<Self, CollectError> {
        let parsed: AuditPayload =
            serde_json::from_value(payload.clone()).map_err(|e| CollectError::Shape {
                tool: "audit",
                reason: e.to_string(),
            })?;

        let mut packages: BTreeMap<String, VulnSummary> = BTreeMap::new();
        match parsed {
            AuditPayload::Current { vulnerabilities } => {
                for (name, group) in vulnerabilities {
                    let summary = packages.entry(name).or_default();
                    match group {
                        FindingGroup::One(finding) => {
                            summary.record(Severity::parse_lossy(finding.severity.as_deref()))
                        }
                        FindingGroup::Many(findings) => {
                            for finding in findings {
                                summary.record(Severity::parse_lossy(finding.severity.as_deref()));
                            }
                        }
                    }
                }
            }
            AuditPayload::Legacy { advisories } => {
                let list: Vec<Advisory> = match advisories {
                    LegacyAdvisories::List(list) => list,
                    LegacyAdvisories::Map(map) => map.into_values().collect(),
                };
                index_advisories(&mut packages, list);
            }
            AuditPayload::Flat(list) => index_advisories(&mut packages, list),
        }

        Ok(VulnIndex {
            status: DataStatus::Resolved,
            packages,
        })
    }

    /// Union another index into this one. Resolved if either side was.
    pub fn merge(&mut self, other: &VulnIndex) {
        if other.status == DataStatus::Resolved {
            self.status = DataStatus::Resolved;
        }
        for (name, summary) in &other.packages {
            self.packages.entry(name.clone()).or_default().merge(summary);
        }
    }

    pub fn info_for(&self, name: &str) -> VulnerabilityInfo {
        if self.status == DataStatus::Unknown {
            return VulnerabilityInfo {
                status: DataStatus::Unknown,
                counts: SeverityCounts::default(),
                highest: Severity::None,
                risk: RiskTier::Unknown,
            };
        }
        let summary = self.packages.get(name).cloned().unwrap_or_default();
        VulnerabilityInfo {
            status: DataStatus::Resolved,
            counts: summary.counts,
            highest: summary.highest,
            risk: severity_risk(summary.highest),
        }
    }
}

fn index_advisories(packages: &mut BTreeMap<String, VulnSummary>, list: Vec<Advisory>) {
    for advisory in list {
        let Some(name) = advisory.module_name.or(advisory.name) else {
            continue;
        };
        packages
            .entry(name)
            .or_default()
            .record(Severity::parse_lossy(advisory.severity.as_deref()));
    }
}

fn severity_risk(highest: Severity) -> RiskTier {
    match highest {
        Severity::Critical | Severity::High => RiskTier::High,
        Severity::Moderate => RiskTier::Medium,
        Severity::Low => RiskTier::Low,
        Severity::None => RiskTier::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_current_shape_groups() {
        let payload = json!({
            "auditReportVersion": 2,
            "vulnerabilities": {
                "x": [
                    { "name": "x", "severity": "critical", "via": [ { "source": 1, "severity": "critical" }, { "source": 2 } ] },
                    { "name": "x", "severity": "low", "via": [] },
                    { "name": "x", "severity": "low", "via": [] }
                ],
                "y": { "name": "y", "severity": "moderate", "via": ["x"] }
            }
        });
        let index = VulnIndex::from_payload(&payload).unwrap();
        let x = &index.packages["x"];
        assert_eq!(x.counts.critical, 1);
        assert_eq!(x.counts.low, 2);
        assert_eq!(x.counts.total(), 3);
        assert_eq!(x.highest, Severity::Critical);
        assert_eq!(index.packages["y"].counts.moderate, 1);
    }

    #[test]
    fn test_legacy_map_shape() {
        let payload = json!({
            "advisories": {
                "118": { "module_name": "minimist", "severity": "high" },
                "119": { "module_name": "minimist", "severity": "bogus" }
            }
        });
        let index = VulnIndex::from_payload(&payload).unwrap();
        let m = &index.packages["minimist"];
        assert_eq!(m.counts.high, 1);
        assert_eq!(m.counts.low, 1);
        assert_eq!(m.highest, Severity::High);
    }

    #[test]
    fn test_flat_list_shape() {
        let payload = json!([
            { "name": "x", "severity": "critical" },
            { "name": "x" },
            { "severity": "high" }
        ]);
        let index = VulnIndex::from_payload(&payload).unwrap();
        assert_eq!(index.packages.len(), 1);
        assert_eq!(index.packages["x"].counts.low, 1);
    }

    #[test]
    fn test_unrecognized_shape_is_error() {
        let err = VulnIndex::from_payload(&json!({ "foo": 1 })).unwrap_err();
        assert_eq!(err.collaborator(), "audit");
    }

    #[test]
    fn test_unknown_index_degrades() {
        let info = VulnIndex::unknown().info_for("x");
        assert_eq!(info.status, DataStatus::Unknown);
        assert_eq!(info.risk, RiskTier::Unknown);
    }

    #[test]
    fn test_merge_sums_counts() {
        let a = VulnIndex::from_payload(&json!({ "vulnerabilities": { "x": { "severity": "low" } } })).unwrap();
        let b = VulnIndex::from_payload(&json!({ "vulnerabilities": { "x": { "severity": "high" } } })).unwrap();
        let mut merged = VulnIndex::unknown();
        merged.merge(&a);
        merged.merge(&b);
        let info = merged.info_for("x");
        assert_eq!(info.counts.total(), 2);
        assert_eq!(info.highest, Severity::High);
        assert_eq!(info.risk, RiskTier::High);
        assert_eq!(merged.info_for("clean").risk, RiskTier::None);
    }
}
