use crate::core::{Dialect, Policy, ScanResult, Scope, TargetedPod, MAX_SCORE};
use anyhow::{Context, Result};
use std::{fs, io::Write, path::Path};

const MISSING_IP: &str = "N/A";

pub(crate) fn dialect_name(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Kubernetes => "Kubernetes",
        Dialect::Cilium => "Cilium",
    }
}

/// Renders a scan for a terminal.
pub(crate) fn print(result: &ScanResult, out: &mut impl Write) -> Result<()> {
    if result.all_pods_protected {
        writeln!(
            out,
            "All pods are protected by cluster wide {} policies.",
            dialect_name(result.dialect).to_lowercase()
        )?;
    } else if result.unprotected_pods.is_empty() {
        writeln!(out, "No unprotected pods found.")?;
    } else {
        writeln!(out, "Unprotected pods:")?;
        let rows = result
            .unprotected_pods
            .iter()
            .map(|p| [p.namespace.as_str(), p.name.as_str(), ip(&p.ip)])
            .collect::<Vec<_>>();
        table(out, ["NAMESPACE", "POD", "IP"], &rows)?;
    }

    for ns in &result.failed_namespaces {
        writeln!(out, "Namespace {ns} could not be scanned.")?;
    }
    for ns in &result.denied_namespaces {
        writeln!(out, "Skipped default deny-all policy for namespace {ns}.")?;
    }
    for target in &result.remediation_failures {
        writeln!(out, "Failed to apply default deny-all policy {target}.")?;
    }
    if result.policy_changes_made {
        writeln!(
            out,
            "Policies were applied; run the scan again to see their effect on the score."
        )?;
    }
    if result.cancelled {
        writeln!(out, "Scan cancelled; results are partial.")?;
    }

    writeln!(out, "\nNetfetch scan completed!")?;
    writeln!(
        out,
        "\nYour Netfetch security score is: {}/{MAX_SCORE}",
        result.score
    )?;
    Ok(())
}

pub(crate) fn print_targets(policy: &Policy, pods: &[TargetedPod], out: &mut impl Write) -> Result<()> {
    let location = match &policy.scope {
        Scope::Namespaced(ns) => format!("in namespace '{ns}'"),
        Scope::ClusterWide => "across the cluster".to_string(),
    };
    writeln!(out, "Found policy '{}' {location}.", policy.name)?;

    if pods.is_empty() {
        writeln!(out, "No pods targeted by policy '{}' {location}.", policy.name)?;
        return Ok(());
    }

    writeln!(out, "Pods targeted by policy '{}' {location}:", policy.name)?;
    let rows = pods
        .iter()
        .map(|p| [p.namespace.as_str(), p.name.as_str(), ip(&p.ip)])
        .collect::<Vec<_>>();
    table(out, ["NAMESPACE", "POD", "IP"], &rows)?;
    Ok(())
}

pub(crate) fn write_json(path: &Path, results: &[ScanResult]) -> Result<()> {
    let json = serde_json::to_vec_pretty(results)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

fn ip(ip: &Option<String>) -> &str {
    ip.as_deref().unwrap_or(MISSING_IP)
}

fn table<const N: usize>(out: &mut impl Write, header: [&str; N], rows: &[[&str; N]]) -> Result<()> {
    let mut widths = header.map(str::len);
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let line = |out: &mut dyn Write, cells: &[&str; N]| -> std::io::Result<()> {
        let cells = cells
            .iter()
            .zip(widths)
            .map(|(cell, w)| format!("{cell:<w$}"))
            .collect::<Vec<_>>();
        writeln!(out, "{}", cells.join("  ").trim_end())
    };

    line(out, &header)?;
    for row in rows {
        line(out, row)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Rule, Selector, UnprotectedPod};

    fn mk_result() -> ScanResult {
        ScanResult::new(Dialect::Kubernetes)
    }

    fn render(result: &ScanResult) -> String {
        let mut out = Vec::new();
        print(result, &mut out).expect("report must render");
        String::from_utf8(out).expect("report must be utf-8")
    }

    #[test]
    fn unprotected_pods_table() {
        let result = ScanResult {
            unprotected_pods: vec![
                UnprotectedPod {
                    namespace: "shop".to_string(),
                    name: "web-0".to_string(),
                    ip: Some("10.0.0.1".to_string()),
                },
                UnprotectedPod {
                    namespace: "payments".to_string(),
                    name: "db-0".to_string(),
                    ip: None,
                },
            ],
            score: 27,
            ..mk_result()
        };

        let report = render(&result);
        assert!(report.contains("NAMESPACE  POD    IP\n"), "{}", report);
        assert!(report.contains("shop       web-0  10.0.0.1\n"), "{}", report);
        assert!(report.contains("payments   db-0   N/A\n"), "{}", report);
        assert!(report.ends_with("Your Netfetch security score is: 27/100\n"));
    }

    #[test]
    fn all_pods_protected() {
        let result = ScanResult {
            dialect: Dialect::Cilium,
            all_pods_protected: true,
            ..mk_result()
        };
        let report = render(&result);
        assert!(report.starts_with("All pods are protected by cluster wide cilium policies."));
        assert!(report.ends_with("Your Netfetch security score is: 100/100\n"));
    }

    #[test]
    fn targeted_pods() {
        let policy = Policy {
            name: "allow-web".to_string(),
            dialect: Dialect::Cilium,
            scope: Scope::ClusterWide,
            selector: Selector::default(),
            pod_namespace: None,
            ingress: vec![Rule::Populated],
            egress: vec![],
        };

        let mut out = Vec::new();
        print_targets(&policy, &[], &mut out).expect("report must render");
        assert_eq!(
            String::from_utf8(out).expect("report must be utf-8"),
            "Found policy 'allow-web' across the cluster.\n\
             No pods targeted by policy 'allow-web' across the cluster.\n"
        );
    }
}
