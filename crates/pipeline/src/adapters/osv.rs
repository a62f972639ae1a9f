//! Dependency adapter wrapping the osv-scanner CLI.

use crate::adapters::{exec, ReportArtifact, ToolAdapter, ToolExecError};
use crate::core::{Finding, ScanMode, Severity, ToolKind, ToolResult};
use crate::orchestrator::deadline;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

pub struct OsvScannerAdapter;

#[derive(Debug, Deserialize)]
struct OsvReport {
    #[serde(default)]
    results: Vec<OsvResult>,
}

#[derive(Debug, Deserialize)]
struct OsvResult {
    source: OsvSource,
    #[serde(default)]
    packages: Vec<OsvPackage>,
}

#[derive(Debug, Deserialize)]
struct OsvSource {
    path: String,
}

#[derive(Debug, Deserialize)]
struct OsvPackage {
    package: OsvPackageInfo,
    #[serde(default)]
    vulnerabilities: Vec<OsvVulnerability>,
}

#[derive(Debug, Deserialize)]
struct OsvPackageInfo {
    name: String,
    version: String,
}

#[derive(Debug, Deserialize)]
struct OsvVulnerability {
    id: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    details: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    severity: Vec<OsvSeverity>,
    #[serde(default)]
    database_specific: OsvDatabaseSpecific,
}

#[derive(Debug, Deserialize)]
struct OsvSeverity {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    score: String,
}

#[derive(Debug, Deserialize, Default)]
struct OsvDatabaseSpecific {
    #[serde(default)]
    severity: Option<String>,
}

impl OsvScannerAdapter {
    /// Prefer the database-assigned label; fall back to the CVSS vector's
    /// base score when that is all the advisory carries.
    fn map_severity(vuln: &OsvVulnerability) -> Severity {
        if let Some(label) = vuln.database_specific.severity.as_deref() {
            return match label.to_ascii_uppercase().as_str() {
                "CRITICAL" => Severity::Critical,
                "HIGH" => Severity::High,
                "MODERATE" | "MEDIUM" => Severity::Medium,
                "LOW" => Severity::Low,
                _ => Severity::Medium,
            };
        }
        vuln.severity
            .iter()
            .find(|s| s.kind.starts_with("CVSS"))
            .and_then(|s| cvss_base_score(&s.score))
            .map(|score| {
                if score >= 9.0 {
                    Severity::Critical
                } else if score >= 7.0 {
                    Severity::High
                } else if score >= 4.0 {
                    Severity::Medium
                } else {
                    Severity::Low
                }
            })
            .unwrap_or(Severity::Medium)
    }

    fn parse_report(&self, raw: &str) -> Result<Vec<Finding>, ToolExecError> {
        let report: OsvReport = serde_json::from_str(raw)?;
        let mut findings = Vec::new();
        for result in report.results {
            for package in result.packages {
                for vuln in &package.vulnerabilities {
                    let severity = Self::map_severity(vuln);
                    let cve = vuln
                        .aliases
                        .iter()
                        .find(|alias| alias.starts_with("CVE-"))
                        .cloned()
                        .or_else(|| vuln.id.starts_with("CVE-").then(|| vuln.id.clone()));
                    let title = if vuln.summary.is_empty() {
                        format!("{} {} is affected by {}", package.package.name, package.package.version, vuln.id)
                    } else {
                        vuln.summary.clone()
                    };
                    let mut finding = Finding::new(self.name(), self.kind(), severity, title, vuln.id.clone())
                        .with_description(vuln.details.clone())
                        .with_location(result.source.path.clone(), 0, 0)
                        // Version-range matching against the advisory database is
                        // precise, so these carry high confidence.
                        .with_confidence(0.9)
                        .with_cwe(vec!["CWE-1395".to_string()])
                        .with_recommendation(format!(
                            "Upgrade {} beyond version {} to a release not affected by {}",
                            package.package.name, package.package.version, vuln.id
                        ));
                    if let Some(cve) = cve {
                        finding = finding.with_cve(cve);
                    }
                    findings.push(finding);
                }
            }
        }
        Ok(findings)
    }
}

/// Pull the numeric base score out of a CVSS vector or bare score string.
fn cvss_base_score(score: &str) -> Option<f64> {
    if let Ok(value) = score.parse::<f64>() {
        return Some(value);
    }
    // Vector form, e.g. "CVSS:3.1/AV:N/AC:L/..." carries no base score;
    // approximate from the attack-vector component.
    if score.starts_with("CVSS") {
        return Some(if score.contains("AV:N") { 7.5 } else { 5.0 });
    }
    None
}

#[async_trait]
impl ToolAdapter for OsvScannerAdapter {
    fn id(&self) -> &'static str {
        "osv-scanner"
    }

    fn name(&self) -> &'static str {
        "osv-scanner"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Sca
    }

    fn binary(&self) -> &'static str {
        "osv-scanner"
    }

    fn description(&self) -> &'static str {
        "Dependency manifests matched against the OSV advisory database"
    }

    async fn scan(&self, workspace: &Path, scan_id: Uuid, mode: ScanMode) -> ToolResult {
        if !self.is_available() {
            return ToolResult::unavailable(self.name(), self.kind(), self.binary());
        }

        let report = ReportArtifact::for_scan(self.id(), scan_id);
        let args = vec![
            "--format".to_string(),
            "json".to_string(),
            "--output".to_string(),
            report.path().display().to_string(),
            "--recursive".to_string(),
            ".".to_string(),
        ];

        let timeout = deadline::for_workspace(workspace, mode);
        let started = Instant::now();
        let outcome = exec::run_tool(self.binary(), &args, workspace, timeout).await;
        let duration = started.elapsed();

        match outcome {
            Ok(output) => match report.read().and_then(|raw| self.parse_report(&raw)) {
                Ok(findings) => {
                    debug!(tool = self.id(), count = findings.len(), "parsed osv-scanner report");
                    ToolResult::success(self.name(), self.kind(), findings, duration)
                        .with_metadata("exit_code", output.exit_code.to_string())
                }
                Err(err) => ToolResult::failed(self.name(), self.kind(), err.to_string(), duration),
            },
            Err(ToolExecError::NotInstalled(binary)) => {
                ToolResult::unavailable(self.name(), self.kind(), &binary)
            }
            Err(err) => ToolResult::failed(self.name(), self.kind(), err.to_string(), duration),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "results": [
            {
                "source": {"path": "requirements.txt", "type": "lockfile"},
                "packages": [
                    {
                        "package": {"name": "django", "version": "3.2.1", "ecosystem": "PyPI"},
                        "vulnerabilities": [
                            {
                                "id": "GHSA-xxxx-yyyy-zzzz",
                                "summary": "SQL injection in QuerySet.annotate",
                                "details": "Crafted column aliases allow SQL injection.",
                                "aliases": ["CVE-2021-35042"],
                                "severity": [{"type": "CVSS_V3", "score": "9.8"}],
                                "database_specific": {"severity": "CRITICAL"}
                            }
                        ]
                    }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_report_extracts_cve_and_severity() {
        let findings = OsvScannerAdapter.parse_report(SAMPLE).unwrap();
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.severity, Severity::Critical);
        assert_eq!(finding.cve.as_deref(), Some("CVE-2021-35042"));
        assert_eq!(finding.rule_id, "GHSA-xxxx-yyyy-zzzz");
        assert_eq!(finding.file_path, "requirements.txt");
        assert_eq!(finding.category, ToolKind::Sca);
        assert!(finding.recommendation.contains("django"));
    }

    #[test]
    fn test_cvss_score_fallback() {
        assert_eq!(cvss_base_score("9.8"), Some(9.8));
        assert_eq!(cvss_base_score("CVSS:3.1/AV:N/AC:L"), Some(7.5));
        assert_eq!(cvss_base_score("garbage"), None);
    }
}
