//! Container adapter wrapping the trivy CLI.
//!
//! Runs trivy in config mode over the workspace, which analyzes container
//! build files (Dockerfile, compose) without needing a built image. Both
//! misconfiguration and vulnerability result blocks are translated.

use crate::adapters::{exec, ReportArtifact, ToolAdapter, ToolExecError};
use crate::core::{Finding, ScanMode, Severity, ToolKind, ToolResult};
use crate::orchestrator::deadline;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

pub struct TrivyAdapter;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrivyReport {
    #[serde(default)]
    results: Vec<TrivyResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrivyResult {
    #[serde(default)]
    target: String,
    #[serde(default)]
    misconfigurations: Vec<TrivyMisconfiguration>,
    #[serde(default)]
    vulnerabilities: Vec<TrivyVulnerability>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrivyMisconfiguration {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    resolution: String,
    #[serde(default)]
    cause_metadata: TrivyCauseMetadata,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct TrivyCauseMetadata {
    #[serde(default)]
    start_line: u32,
    #[serde(default)]
    end_line: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrivyVulnerability {
    #[serde(rename = "VulnerabilityID", default)]
    vulnerability_id: String,
    #[serde(default)]
    pkg_name: String,
    #[serde(default)]
    installed_version: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    severity: String,
    #[serde(rename = "CweIDs", default)]
    cwe_ids: Vec<String>,
}

fn map_severity(native: &str) -> Severity {
    match native.to_ascii_uppercase().as_str() {
        "CRITICAL" => Severity::Critical,
        "HIGH" => Severity::High,
        "MEDIUM" => Severity::Medium,
        "LOW" => Severity::Low,
        _ => Severity::Info,
    }
}

impl TrivyAdapter {
    fn parse_report(&self, raw: &str) -> Result<Vec<Finding>, ToolExecError> {
        let report: TrivyReport = serde_json::from_str(raw)?;
        let mut findings = Vec::new();

        for result in report.results {
            for misconfig in result.misconfigurations {
                findings.push(
                    Finding::new(
                        self.name(),
                        self.kind(),
                        map_severity(&misconfig.severity),
                        misconfig.title.clone(),
                        misconfig.id.clone(),
                    )
                    .with_description(misconfig.description.clone())
                    .with_location(
                        result.target.clone(),
                        misconfig.cause_metadata.start_line,
                        misconfig.cause_metadata.end_line,
                    )
                    .with_confidence(0.8)
                    .with_cwe(vec!["CWE-1008".to_string()])
                    .with_recommendation(misconfig.resolution.clone()),
                );
            }
            for vuln in result.vulnerabilities {
                let title = if vuln.title.is_empty() {
                    format!("{} in {} {}", vuln.vulnerability_id, vuln.pkg_name, vuln.installed_version)
                } else {
                    vuln.title.clone()
                };
                let mut finding = Finding::new(
                    self.name(),
                    self.kind(),
                    map_severity(&vuln.severity),
                    title,
                    vuln.vulnerability_id.clone(),
                )
                .with_description(vuln.description.clone())
                .with_location(result.target.clone(), 0, 0)
                .with_confidence(0.85)
                .with_cwe(vuln.cwe_ids.clone())
                .with_recommendation(format!(
                    "Rebuild the image with {} upgraded past {}",
                    vuln.pkg_name, vuln.installed_version
                ));
                if vuln.vulnerability_id.starts_with("CVE-") {
                    finding = finding.with_cve(vuln.vulnerability_id.clone());
                }
                findings.push(finding);
            }
        }
        Ok(findings)
    }
}

#[async_trait]
impl ToolAdapter for TrivyAdapter {
    fn id(&self) -> &'static str {
        "trivy"
    }

    fn name(&self) -> &'static str {
        "trivy"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Container
    }

    fn binary(&self) -> &'static str {
        "trivy"
    }

    fn description(&self) -> &'static str {
        "Container build files analyzed for misconfigurations and known CVEs"
    }

    async fn scan(&self, workspace: &Path, scan_id: Uuid, mode: ScanMode) -> ToolResult {
        if !self.is_available() {
            return ToolResult::unavailable(self.name(), self.kind(), self.binary());
        }

        let report = ReportArtifact::for_scan(self.id(), scan_id);
        let args = vec![
            "config".to_string(),
            "--format".to_string(),
            "json".to_string(),
            "--output".to_string(),
            report.path().display().to_string(),
            "--exit-code".to_string(),
            "1".to_string(),
            ".".to_string(),
        ];

        let timeout = deadline::for_workspace(workspace, mode);
        let started = Instant::now();
        let outcome = exec::run_tool(self.binary(), &args, workspace, timeout).await;
        let duration = started.elapsed();

        match outcome {
            Ok(output) => match report.read().and_then(|raw| self.parse_report(&raw)) {
                Ok(findings) => {
                    debug!(tool = self.id(), count = findings.len(), "parsed trivy report");
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
