use crate::core::{Finding, ToolKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Warning,
    Fatal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDiagnostic {
    pub message: String,
    pub severity: DiagnosticSeverity,
}

impl ToolDiagnostic {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: DiagnosticSeverity::Warning,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: DiagnosticSeverity::Fatal,
        }
    }
}

/// Outcome of one adapter invocation.
///
/// Owned by the orchestrator during a run, then folded into the aggregate
/// report. A failed result still participates in aggregation; failure of
/// one tool never removes another tool's result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,
    pub kind: ToolKind,
    pub success: bool,
    pub findings: Vec<Finding>,
    pub errors: Vec<ToolDiagnostic>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub metadata: HashMap<String, String>,
}

impl ToolResult {
    pub fn success(
        tool_name: impl Into<String>,
        kind: ToolKind,
        findings: Vec<Finding>,
        duration: Duration,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            kind,
            success: true,
            findings,
            errors: Vec::new(),
            duration_ms: duration.as_millis() as u64,
            metadata: HashMap::new(),
        }
    }

    /// Tool binary missing from the environment. Warning-level: the scan
    /// continues with that tool contributing zero findings.
    pub fn unavailable(tool_name: impl Into<String>, kind: ToolKind, binary: &str) -> Self {
        Self {
            tool_name: tool_name.into(),
            kind,
            success: false,
            findings: Vec::new(),
            errors: vec![ToolDiagnostic::warning(format!(
                "tool binary '{binary}' not found on PATH, skipping"
            ))],
            duration_ms: 0,
            metadata: HashMap::new(),
        }
    }

    /// Execution failure (timeout, unexpected exit, unparsable report).
    /// Fatal to this adapter only.
    pub fn failed(
        tool_name: impl Into<String>,
        kind: ToolKind,
        message: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            kind,
            success: false,
            findings: Vec::new(),
            errors: vec![ToolDiagnostic::fatal(message)],
            duration_ms: duration.as_millis() as u64,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
