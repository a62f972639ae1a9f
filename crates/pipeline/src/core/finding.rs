use crate::core::{Severity, ToolKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One normalized vulnerability record, tool-agnostic.
///
/// Immutable after creation. The `id` is minted here, never taken from the
/// external tool, so records stay unique across tools and re-scans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: Uuid,

    pub tool_name: String,

    pub category: ToolKind,

    pub severity: Severity,

    pub title: String,

    pub description: String,

    pub file_path: String,

    pub line_start: u32,

    pub line_end: u32,

    pub rule_id: String,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub cwe: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cve: Option<String>,

    pub confidence: f64,

    pub recommendation: String,

    pub detected_at: DateTime<Utc>,
}

impl Finding {
    pub fn new(
        tool_name: impl Into<String>,
        category: ToolKind,
        severity: Severity,
        title: impl Into<String>,
        rule_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tool_name: tool_name.into(),
            category,
            severity,
            title: title.into(),
            description: String::new(),
            file_path: String::new(),
            line_start: 0,
            line_end: 0,
            rule_id: rule_id.into(),
            cwe: Vec::new(),
            cve: None,
            confidence: 0.5,
            recommendation: String::new(),
            detected_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_location(mut self, file_path: impl Into<String>, line_start: u32, line_end: u32) -> Self {
        self.file_path = file_path.into();
        self.line_start = line_start;
        self.line_end = line_end.max(line_start);
        self
    }

    pub fn with_cwe(mut self, cwe: impl IntoIterator<Item = String>) -> Self {
        self.cwe = cwe.into_iter().collect();
        self
    }

    pub fn with_cve(mut self, cve: impl Into<String>) -> Self {
        self.cve = Some(cve.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = recommendation.into();
        self
    }

    /// Copy for attachment to a different scan: fresh identity and
    /// timestamp, every other field preserved.
    pub fn recloned(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            detected_at: Utc::now(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Finding {
        Finding::new("semgrep", ToolKind::Sast, Severity::High, "SQL injection", "python.sqli")
            .with_location("app/db.py", 42, 44)
            .with_confidence(0.9)
            .with_cwe(vec!["CWE-89".to_string()])
    }

    #[test]
    fn test_confidence_is_clamped() {
        let f = sample().with_confidence(1.7);
        assert_eq!(f.confidence, 1.0);
        let f = sample().with_confidence(-0.2);
        assert_eq!(f.confidence, 0.0);
    }

    #[test]
    fn test_line_end_never_precedes_line_start() {
        let f = sample().with_location("a.py", 10, 3);
        assert_eq!(f.line_start, 10);
        assert_eq!(f.line_end, 10);
    }

    #[test]
    fn test_reclone_preserves_content_fields() {
        let original = sample();
        let clone = original.recloned();
        assert_ne!(clone.id, original.id);
        assert_eq!(clone.tool_name, original.tool_name);
        assert_eq!(clone.rule_id, original.rule_id);
        assert_eq!(clone.file_path, original.file_path);
        assert_eq!(clone.line_start, original.line_start);
        assert_eq!(clone.confidence, original.confidence);
        assert_eq!(clone.cwe, original.cwe);
    }
}
