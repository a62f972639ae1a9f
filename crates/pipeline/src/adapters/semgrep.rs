//! Static-analysis adapter wrapping the semgrep CLI.

use crate::adapters::{exec, ReportArtifact, ToolAdapter, ToolExecError};
use crate::core::{Finding, ScanMode, Severity, ToolKind, ToolResult};
use crate::orchestrator::deadline;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

pub struct SemgrepAdapter;

#[derive(Debug, Deserialize)]
struct SemgrepReport {
    #[serde(default)]
    results: Vec<SemgrepResult>,
}

#[derive(Debug, Deserialize)]
struct SemgrepResult {
    check_id: String,
    path: String,
    start: SemgrepPosition,
    end: SemgrepPosition,
    extra: SemgrepExtra,
}

#[derive(Debug, Deserialize)]
struct SemgrepPosition {
    line: u32,
}

#[derive(Debug, Deserialize, Default)]
struct SemgrepExtra {
    #[serde(default)]
    message: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    metadata: SemgrepMetadata,
}

#[derive(Debug, Deserialize, Default)]
struct SemgrepMetadata {
    #[serde(default)]
    cwe: Vec<String>,
    #[serde(default)]
    confidence: Option<String>,
}

impl SemgrepAdapter {
    fn map_severity(native: &str) -> Severity {
        match native {
            "ERROR" => Severity::High,
            "WARNING" => Severity::Medium,
            _ => Severity::Info,
        }
    }

    fn map_confidence(native: Option<&str>) -> f64 {
        match native {
            Some("HIGH") => 0.9,
            Some("LOW") => 0.3,
            _ => 0.6,
        }
    }

    /// Semgrep metadata lists CWEs as "CWE-89: SQL Injection"; keep the
    /// identifier. When the rule carries none, infer from the rule id.
    fn extract_cwe(result: &SemgrepResult) -> Vec<String> {
        let listed: Vec<String> = result
            .extra
            .metadata
            .cwe
            .iter()
            .filter_map(|entry| entry.split(':').next())
            .map(|id| id.trim().to_string())
            .filter(|id| id.starts_with("CWE-"))
            .collect();
        if !listed.is_empty() {
            return listed;
        }
        infer_cwe_from_rule(&result.check_id)
            .map(|id| vec![id.to_string()])
            .unwrap_or_default()
    }

    fn parse_report(&self, raw: &str) -> Result<Vec<Finding>, ToolExecError> {
        let report: SemgrepReport = serde_json::from_str(raw)?;
        let findings = report
            .results
            .into_iter()
            .map(|result| {
                let severity = Self::map_severity(&result.extra.severity);
                let confidence = Self::map_confidence(result.extra.metadata.confidence.as_deref());
                let cwe = Self::extract_cwe(&result);
                let title = result
                    .extra
                    .message
                    .lines()
                    .next()
                    .unwrap_or(&result.check_id)
                    .to_string();
                Finding::new(self.name(), self.kind(), severity, title, result.check_id.clone())
                    .with_description(result.extra.message.clone())
                    .with_location(result.path.clone(), result.start.line, result.end.line)
                    .with_confidence(confidence)
                    .with_cwe(cwe)
                    .with_recommendation(format!(
                        "Review the flagged code and apply the fix suggested by rule {}",
                        result.check_id
                    ))
            })
            .collect();
        Ok(findings)
    }
}

fn infer_cwe_from_rule(rule_id: &str) -> Option<&'static str> {
    let rule = rule_id.to_lowercase();
    if rule.contains("sql") {
        Some("CWE-89")
    } else if rule.contains("xss") {
        Some("CWE-79")
    } else if rule.contains("command") || rule.contains("exec") {
        Some("CWE-78")
    } else if rule.contains("path-traversal") || rule.contains("pathtraversal") {
        Some("CWE-22")
    } else if rule.contains("deserial") {
        Some("CWE-502")
    } else if rule.contains("crypto") || rule.contains("hash") {
        Some("CWE-327")
    } else if rule.contains("ssrf") {
        Some("CWE-918")
    } else {
        None
    }
}

#[async_trait]
impl ToolAdapter for SemgrepAdapter {
    fn id(&self) -> &'static str {
        "semgrep"
    }

    fn name(&self) -> &'static str {
        "semgrep"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Sast
    }

    fn binary(&self) -> &'static str {
        "semgrep"
    }

    fn description(&self) -> &'static str {
        "Static analysis over source code via semgrep rulesets"
    }

    async fn scan(&self, workspace: &Path, scan_id: Uuid, mode: ScanMode) -> ToolResult {
        if !self.is_available() {
            return ToolResult::unavailable(self.name(), self.kind(), self.binary());
        }

        let report = ReportArtifact::for_scan(self.id(), scan_id);
        let ruleset = match mode {
            ScanMode::Quick => "p/ci",
            ScanMode::Full => "p/security-audit",
        };
        let args = vec![
            "scan".to_string(),
            "--config".to_string(),
            ruleset.to_string(),
            "--json".to_string(),
            "--output".to_string(),
            report.path().display().to_string(),
            "--quiet".to_string(),
            ".".to_string(),
        ];

        let timeout = deadline::for_workspace(workspace, mode);
        let started = Instant::now();
        let outcome = exec::run_tool(self.binary(), &args, workspace, timeout).await;
        let duration = started.elapsed();

        match outcome {
            Ok(output) => match report.read().and_then(|raw| self.parse_report(&raw)) {
                Ok(findings) => {
                    debug!(tool = self.id(), count = findings.len(), "parsed semgrep report");
                    ToolResult::success(self.name(), self.kind(), findings, duration)
                        .with_metadata("ruleset", ruleset)
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
