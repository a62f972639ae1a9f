//! Infrastructure-as-code adapter wrapping the checkov CLI.
//!
//! Checkov writes its JSON to stdout; depending on how many frameworks ran
//! it emits either one report object or an array of them, so parsing
//! handles both shapes.

use crate::adapters::{exec, ToolAdapter, ToolExecError};
use crate::core::{Finding, ScanMode, Severity, ToolKind, ToolResult};
use crate::orchestrator::deadline;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

pub struct CheckovAdapter;

#[derive(Debug, Deserialize)]
struct CheckovReport {
    #[serde(default)]
    check_type: String,
    #[serde(default)]
    results: CheckovResults,
}

#[derive(Debug, Deserialize, Default)]
struct CheckovResults {
    #[serde(default)]
    failed_checks: Vec<CheckovCheck>,
}

#[derive(Debug, Deserialize)]
struct CheckovCheck {
    check_id: String,
    #[serde(default)]
    check_name: String,
    #[serde(default)]
    file_path: String,
    #[serde(default)]
    file_line_range: Vec<u32>,
    #[serde(default)]
    resource: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    guideline: Option<String>,
}

impl CheckovAdapter {
    fn map_severity(check: &CheckovCheck) -> Severity {
        match check.severity.as_deref().map(str::to_ascii_uppercase).as_deref() {
            Some("CRITICAL") => Severity::Critical,
            Some("HIGH") => Severity::High,
            Some("MEDIUM") => Severity::Medium,
            Some("LOW") => Severity::Low,
            Some("INFO") => Severity::Info,
            // The open-source ruleset ships most checks without a severity
            // label; treat those as medium misconfigurations.
            _ => Severity::Medium,
        }
    }

    fn infer_cwe(check: &CheckovCheck) -> &'static str {
        let name = check.check_name.to_lowercase();
        if name.contains("encrypt") || name.contains("kms") {
            "CWE-311"
        } else if name.contains("public") || name.contains("0.0.0.0") {
            "CWE-284"
        } else if name.contains("logging") || name.contains("log") {
            "CWE-778"
        } else if name.contains("password") || name.contains("secret") {
            "CWE-798"
        } else {
            "CWE-16"
        }
    }

    fn parse_report(&self, raw: &str) -> Result<Vec<Finding>, ToolExecError> {
        let value: Value = serde_json::from_str(raw)?;
        let reports: Vec<CheckovReport> = match value {
            Value::Array(items) => items
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<_, _>>()?,
            other => vec![serde_json::from_value(other)?],
        };

        let mut findings = Vec::new();
        for report in reports {
            for check in report.results.failed_checks {
                let severity = Self::map_severity(&check);
                let cwe = Self::infer_cwe(&check);
                let line_start = check.file_line_range.first().copied().unwrap_or(0);
                let line_end = check.file_line_range.get(1).copied().unwrap_or(line_start);
                let file_path = check.file_path.trim_start_matches('/').to_string();
                let recommendation = check
                    .guideline
                    .clone()
                    .unwrap_or_else(|| format!("Remediate per the {} policy", check.check_id));
                findings.push(
                    Finding::new(self.name(), self.kind(), severity, check.check_name.clone(), check.check_id.clone())
                        .with_description(format!(
                            "{} failed for resource '{}' ({})",
                            check.check_id, check.resource, report.check_type
                        ))
                        .with_location(file_path, line_start, line_end)
                        .with_confidence(0.8)
                        .with_cwe(vec![cwe.to_string()])
                        .with_recommendation(recommendation),
                );
            }
        }
        Ok(findings)
    }
}

#[async_trait]
impl ToolAdapter for CheckovAdapter {
    fn id(&self) -> &'static str {
        "checkov"
    }

    fn name(&self) -> &'static str {
        "checkov"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Iac
    }

    fn binary(&self) -> &'static str {
        "checkov"
    }

    fn description(&self) -> &'static str {
        "Infrastructure-as-code misconfiguration checks"
    }

    async fn scan(&self, workspace: &Path, _scan_id: Uuid, mode: ScanMode) -> ToolResult {
        if !self.is_available() {
            return ToolResult::unavailable(self.name(), self.kind(), self.binary());
        }

        let args = vec![
            "--directory".to_string(),
            ".".to_string(),
            "--output".to_string(),
            "json".to_string(),
            "--quiet".to_string(),
            "--compact".to_string(),
        ];

        let timeout = deadline::for_workspace(workspace, mode);
        let started = Instant::now();
        let outcome = exec::run_tool(self.binary(), &args, workspace, timeout).await;
        let duration = started.elapsed();

        match outcome {
            Ok(output) => match self.parse_report(&output.stdout) {
                Ok(findings) => {
                    debug!(tool = self.id(), count = findings.len(), "parsed checkov report");
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
        "check_type": "terraform",
        "results": {
            "failed_checks": [
                {
                    "check_id": "CKV_AWS_20",
                    "check_name": "S3 Bucket has an ACL defined which allows public READ access",
                    "file_path": "/main.tf",
                    "file_line_range": [12, 24],
                    "resource": "aws_s3_bucket.data",
                    "severity": null,
                    "guideline": "https://docs.example.com/CKV_AWS_20"
                },
                {
                    "check_id": "CKV_AWS_19",
                    "check_name": "Ensure S3 bucket has server-side encryption enabled",
                    "file_path": "/main.tf",
                    "file_line_range": [12, 24],
                    "resource": "aws_s3_bucket.data",
                    "severity": "HIGH",
                    "guideline": null
                }
            ]
        }
    }"#;

    #[test]
    fn test_parse_single_report_object() {
        let findings = CheckovAdapter.parse_report(SAMPLE).unwrap();
        assert_eq!(findings.len(), 2);

        let public = &findings[0];
        assert_eq!(public.severity, Severity::Medium);
        assert_eq!(public.cwe, vec!["CWE-284".to_string()]);
        assert_eq!(public.file_path, "main.tf");
        assert_eq!(public.line_start, 12);
        assert_eq!(public.line_end, 24);

        let encryption = &findings[1];
        assert_eq!(encryption.severity, Severity::High);
        assert_eq!(encryption.cwe, vec!["CWE-311".to_string()]);
        assert!(encryption.recommendation.contains("CKV_AWS_19"));
    }

    #[test]
    fn test_parse_report_array() {
        let wrapped = format!("[{SAMPLE}, {SAMPLE}]");
        let findings = CheckovAdapter.parse_report(&wrapped).unwrap();
        assert_eq!(findings.len(), 4);
    }
}
