use std::collections::BTreeMap;

use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::models::{DataStatus, DependencyRecord, LicenseRisk, Report, RiskTier, RuntimeClass};

/// Render a colored terminal report.
pub fn render(report: &Report, verbose: bool, quiet: bool) {
    let summary = &report.summary;
    let risky: Vec<&DependencyRecord> = report.records.values().filter(|r| r.is_risky()).collect();

    if quiet {
        println!(
            "Total: {}  Direct: {}  Vulnerable: {}  Risky: {}  Errors: {}",
            summary.total,
            summary.direct,
            summary.vulnerable.to_string().red(),
            risky.len().to_string().yellow(),
            summary.errors.len(),
        );
        return;
    }

    println!("\n {} v{}", "depscope".bold(), env!("CARGO_PKG_VERSION"));
    let kind = if report.project.workspace { "workspace" } else { "project" };
    println!(
        " Scanning {}: {}@{} ({})\n",
        kind, report.project.name, report.project.version, report.project.root
    );

    let classes = &summary.runtime_classes;
    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "SUMMARY".bold());
    println!(
        " │  {:<48} │",
        format!(
            "Packages           : {} ({} direct, {} transitive)",
            summary.total, summary.direct, summary.transitive
        )
    );
    println!(
        " │  {:<48} │",
        format!(
            "Runtime / build / dev : {} / {} / {}",
            classes.runtime, classes.build_time, classes.dev_only
        )
    );
    println!(
        " │  {:<48} │",
        format!("{}  Vulnerable      : {:>4}", "✗".red(), summary.vulnerable)
    );
    println!(
        " │  {:<48} │",
        format!("{}  Risky           : {:>4}", "⚠".yellow(), risky.len())
    );
    println!(
        " │  {:<48} │",
        format!(
            "Unresolved imports : {}   Missing: {}",
            summary.unresolved_imports.len(),
            summary.missing_imports.len()
        )
    );
    println!(" └────────────────────────────────────────────────────┘\n");

    if !summary.errors.is_empty() {
        println!(" {} Some data could not be collected:\n", "[WARN]".yellow().bold());
        for (tool, message) in &summary.errors {
            println!("   {} {}: {}", "→".cyan(), tool.bold(), message);
        }
        println!();
    }

    if verbose {
        if !report.records.is_empty() {
            println!(" {} All packages:\n", "[INFO]".cyan().bold());
            render_table(report.records.values());
            println!();
        }
    } else if !risky.is_empty() {
        println!(" {} Packages requiring attention:\n", "[RISK]".red().bold());
        render_table(risky.iter().copied());
        println!();
    }

    let hot = hottest(&summary.hotness, 5);
    if !hot.is_empty() {
        println!(" Most imported: {}", hot);
    }
    println!(" {}\n", summary.usage_note.dimmed());
}

fn render_table<'a>(records: impl Iterator<Item = &'a DependencyRecord>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Package").add_attribute(Attribute::Bold),
            Cell::new("Class").add_attribute(Attribute::Bold),
            Cell::new("Depth").add_attribute(Attribute::Bold),
            Cell::new("Pulled in by").add_attribute(Attribute::Bold),
            Cell::new("Vulns").add_attribute(Attribute::Bold),
            Cell::new("Build").add_attribute(Attribute::Bold),
            Cell::new("Upgrade").add_attribute(Attribute::Bold),
            Cell::new("License").add_attribute(Attribute::Bold),
        ]);

    for record in records {
        let class_color = match record.runtime_class {
            RuntimeClass::Runtime => Color::Cyan,
            RuntimeClass::BuildTime => Color::Yellow,
            RuntimeClass::DevOnly => Color::DarkGrey,
        };
        let license_color = match record.license_risk {
            LicenseRisk::Permissive => Color::Green,
            LicenseRisk::WeakCopyleft => Color::Yellow,
            LicenseRisk::StrongCopyleft => Color::Red,
            LicenseRisk::Proprietary => Color::Magenta,
            LicenseRisk::Unknown => Color::DarkGrey,
        };
        let vulns = match record.vulnerabilities.status {
            DataStatus::Unknown => "?".to_string(),
            DataStatus::Resolved => record.vulnerabilities.counts.total().to_string(),
        };

        table.add_row(vec![
            Cell::new(&record.id),
            Cell::new(record.runtime_class.to_string()).fg(class_color),
            Cell::new(record.depth).set_alignment(CellAlignment::Right),
            Cell::new(causes(record)),
            Cell::new(vulns)
                .fg(tier_color(record.vulnerabilities.risk))
                .set_alignment(CellAlignment::Center),
            Cell::new(record.build_risk.to_string()).fg(tier_color(record.build_risk)),
            Cell::new(record.upgrade_risk.to_string()).fg(tier_color(record.upgrade_risk)),
            Cell::new(record.license.as_deref().unwrap_or("unknown")).fg(license_color),
        ]);
    }

    println!("{}", table);
}

fn tier_color(tier: RiskTier) -> Color {
    match tier {
        RiskTier::None | RiskTier::Low => Color::Green,
        RiskTier::Medium => Color::Yellow,
        RiskTier::High => Color::Red,
        RiskTier::Unknown => Color::DarkGrey,
    }
}

fn causes(record: &DependencyRecord) -> String {
    if record.direct {
        return "(direct)".to_string();
    }
    let mut out = record.root_causes.iter().take(3).cloned().collect::<Vec<_>>().join(", ");
    if record.root_cause_count > 3 {
        out.push_str(&format!(" +{}", record.root_cause_count - 3));
    }
    out
}

fn hottest(hotness: &BTreeMap<String, usize>, n: usize) -> String {
    let mut pairs: Vec<(&String, &usize)> = hotness.iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    pairs
        .iter()
        .take(n)
        .map(|(name, count)| format!("{} ({})", name, count))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hottest_orders_by_count_then_name() {
        let hotness: BTreeMap<String, usize> = [("b", 2), ("a", 2), ("c", 5), ("d", 1)]
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        assert_eq!(hottest(&hotness, 3), "c (5), a (2), b (2)");
        assert_eq!(hottest(&BTreeMap::new(), 3), "");
    }
}
