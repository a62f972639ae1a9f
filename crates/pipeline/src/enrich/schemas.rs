//! Enrichment result types and defensive parsing of provider output.
//!
//! Model output is untrusted, partially-structured input. Every field is
//! validated independently and backfilled from the rule-based result, so
//! one missing key never discards an otherwise good response.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::P0 => write!(f, "P0"),
            Self::P1 => write!(f, "P1"),
            Self::P2 => write!(f, "P2"),
            Self::P3 => write!(f, "P3"),
        }
    }
}

impl Priority {
    fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_uppercase().as_str() {
            "P0" => Some(Self::P0),
            "P1" => Some(Self::P1),
            "P2" => Some(Self::P2),
            "P3" => Some(Self::P3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnrichmentSource {
    Ai,
    RuleBased,
}

/// Always produced for a finding selected for enrichment; never null, never
/// partially null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub explanation: String,
    pub business_impact: String,
    pub remediation: String,
    pub suggested_patch: Option<String>,
    pub risk_score: u8,
    pub priority: Priority,
    pub false_positive_score: f64,
    pub confidence: f64,
    pub source: EnrichmentSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedTitle {
    pub title: String,
    pub source: EnrichmentSource,
}

/// Raw provider response: everything optional, nothing trusted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEnrichment {
    pub explanation: Option<String>,
    pub business_impact: Option<String>,
    pub remediation: Option<String>,
    pub suggested_patch: Option<String>,
    pub risk_score: Option<f64>,
    pub priority: Option<String>,
    pub false_positive_score: Option<f64>,
    pub confidence: Option<f64>,
}

/// Find and parse the first JSON object in free-form model output. Models
/// wrap JSON in code fences or prose often enough that strict parsing
/// alone throws away usable responses.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, &byte) in bytes[start..].iter().enumerate() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escape_next = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn parse_enrichment(text: &str) -> Option<RawEnrichment> {
    let json = extract_json_object(text)?;
    serde_json::from_str(json).ok()
}

fn usable_text(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Field-by-field merge of the provider response over the rule-based
/// result. Invalid values lose to the fallback, not to null.
pub fn merge(raw: RawEnrichment, fallback: &EnrichmentResult) -> EnrichmentResult {
    EnrichmentResult {
        explanation: usable_text(raw.explanation).unwrap_or_else(|| fallback.explanation.clone()),
        business_impact: usable_text(raw.business_impact)
            .unwrap_or_else(|| fallback.business_impact.clone()),
        remediation: usable_text(raw.remediation).unwrap_or_else(|| fallback.remediation.clone()),
        suggested_patch: usable_text(raw.suggested_patch).or_else(|| fallback.suggested_patch.clone()),
        risk_score: raw
            .risk_score
            .filter(|score| (0.0..=100.0).contains(score))
            .map(|score| score.round() as u8)
            .unwrap_or(fallback.risk_score),
        priority: raw
            .priority
            .as_deref()
            .and_then(Priority::parse)
            .unwrap_or(fallback.priority),
        false_positive_score: raw
            .false_positive_score
            .filter(|score| (0.0..=1.0).contains(score))
            .unwrap_or(fallback.false_positive_score),
        confidence: raw
            .confidence
            .filter(|score| (0.0..=1.0).contains(score))
            .unwrap_or(fallback.confidence),
        source: EnrichmentSource::Ai,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fallback() -> EnrichmentResult {
        EnrichmentResult {
            explanation: "rule explanation".to_string(),
            business_impact: "rule impact".to_string(),
            remediation: "rule remediation".to_string(),
            suggested_patch: None,
            risk_score: 70,
            priority: Priority::P1,
            false_positive_score: 0.2,
            confidence: 0.5,
            source: EnrichmentSource::RuleBased,
        }
    }

    #[test]
    fn test_extract_json_from_code_fence() {
        let text = "Here you go:\n```json\n{\"explanation\": \"x\"}\n```";
        assert_eq!(extract_json_object(text), Some("{\"explanation\": \"x\"}"));
    }

    #[test]
    fn test_extract_json_handles_nested_braces_and_strings() {
        let text = r#"prefix {"a": {"b": "} not the end"}, "c": 1} suffix"#;
        let json = extract_json_object(text).unwrap();
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(value["c"], 1);
    }

    #[test]
    fn test_merge_backfills_missing_fields() {
        let raw = RawEnrichment {
            explanation: Some("ai explanation".to_string()),
            risk_score: Some(88.0),
            ..Default::default()
        };
        let merged = merge(raw, &fallback());
        assert_eq!(merged.explanation, "ai explanation");
        assert_eq!(merged.risk_score, 88);
        assert_eq!(merged.business_impact, "rule impact");
        assert_eq!(merged.remediation, "rule remediation");
        assert_eq!(merged.priority, Priority::P1);
        assert_eq!(merged.source, EnrichmentSource::Ai);
    }

    #[test]
    fn test_merge_rejects_out_of_range_values() {
        let raw = RawEnrichment {
            risk_score: Some(250.0),
            false_positive_score: Some(3.5),
            confidence: Some(-0.1),
            priority: Some("urgent".to_string()),
            explanation: Some("   ".to_string()),
            ..Default::default()
        };
        let merged = merge(raw, &fallback());
        assert_eq!(merged.risk_score, 70);
        assert_eq!(merged.false_positive_score, 0.2);
        assert_eq!(merged.confidence, 0.5);
        assert_eq!(merged.priority, Priority::P1);
        assert_eq!(merged.explanation, "rule explanation");
    }

    #[test]
    fn test_parse_enrichment_rejects_non_json() {
        assert!(parse_enrichment("I could not analyze this finding.").is_none());
    }
}
