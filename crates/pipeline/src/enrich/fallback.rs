//! Deterministic rule-based enrichment.
//!
//! The floor the client can always fall back to: correct, if less
//! informative than a model-written explanation. Output depends only on
//! the finding's category, severity, and confidence.

use crate::core::{Finding, Severity, ToolKind};
use crate::enrich::schemas::{EnrichmentResult, EnrichmentSource, GeneratedTitle, Priority};

fn category_explanation(kind: ToolKind) -> &'static str {
    match kind {
        ToolKind::Sast => {
            "A static-analysis rule matched a code pattern associated with exploitable behavior. \
             The flagged code path can likely be driven by attacker-controlled input."
        }
        ToolKind::Sca => {
            "A dependency in this project matches a published security advisory. \
             The vulnerable code ships with every build that pins this version."
        }
        ToolKind::Secret => {
            "A credential-shaped value is committed to the repository. \
             Anyone with read access to the history can extract and use it."
        }
        ToolKind::Iac => {
            "An infrastructure definition deviates from a hardening baseline. \
             The misconfiguration applies to every environment provisioned from it."
        }
        ToolKind::Container => {
            "A container build definition includes a known-vulnerable component or risky directive. \
             Images built from it inherit the exposure."
        }
    }
}

fn category_remediation(kind: ToolKind) -> &'static str {
    match kind {
        ToolKind::Sast => "Sanitize or validate the input reaching the flagged code and re-run the scan.",
        ToolKind::Sca => "Upgrade the affected dependency to a patched release.",
        ToolKind::Secret => "Revoke and rotate the credential, then move it to a secret manager.",
        ToolKind::Iac => "Align the resource definition with the failed policy and re-apply.",
        ToolKind::Container => "Rebuild the image from an updated base and re-scan.",
    }
}

fn business_impact(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "Directly exploitable; assume compromise is practical without mitigation.",
        Severity::High => "Exploitable under common conditions; prioritize within the current cycle.",
        Severity::Medium => "Exploitable in combination with other weaknesses; schedule remediation.",
        Severity::Low => "Limited standalone impact; bundle with routine maintenance.",
        Severity::Info => "No direct impact; informational signal for hardening work.",
    }
}

fn priority_for(severity: Severity) -> Priority {
    match severity {
        Severity::Critical => Priority::P0,
        Severity::High => Priority::P1,
        Severity::Medium => Priority::P2,
        Severity::Low | Severity::Info => Priority::P3,
    }
}

fn risk_score(severity: Severity, confidence: f64) -> u8 {
    // Severity sets the band, confidence positions inside it.
    let base = severity.base_score() as f64;
    (base * (0.7 + 0.3 * confidence.clamp(0.0, 1.0))).round().min(100.0) as u8
}

pub fn generate(finding: &Finding) -> EnrichmentResult {
    let remediation = if finding.recommendation.is_empty() {
        category_remediation(finding.category).to_string()
    } else {
        finding.recommendation.clone()
    };

    EnrichmentResult {
        explanation: format!(
            "{} Rule {} reported this at {}:{}.",
            category_explanation(finding.category),
            finding.rule_id,
            finding.file_path,
            finding.line_start
        ),
        business_impact: business_impact(finding.severity).to_string(),
        remediation,
        suggested_patch: None,
        risk_score: risk_score(finding.severity, finding.confidence),
        priority: priority_for(finding.severity),
        // Tool confidence bounds how much of the score could be noise.
        false_positive_score: ((1.0 - finding.confidence) * 0.5 * 100.0).round() / 100.0,
        confidence: finding.confidence,
        source: EnrichmentSource::RuleBased,
    }
}

pub fn generate_title(rule_id: &str, category: ToolKind, severity: Severity) -> GeneratedTitle {
    GeneratedTitle {
        title: format!("{severity} {category} issue ({rule_id})"),
        source: EnrichmentSource::RuleBased,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity, confidence: f64) -> Finding {
        Finding::new("semgrep", ToolKind::Sast, severity, "t", "R1")
            .with_location("a.py", 10, 12)
            .with_confidence(confidence)
    }

    #[test]
    fn test_generate_is_deterministic() {
        let f = finding(Severity::High, 0.9);
        let a = generate(&f);
        let b = generate(&f);
        assert_eq!(a.explanation, b.explanation);
        assert_eq!(a.risk_score, b.risk_score);
        assert_eq!(a.priority, b.priority);
    }

    #[test]
    fn test_risk_score_stays_in_band() {
        for severity in [Severity::Critical, Severity::High, Severity::Medium, Severity::Low, Severity::Info] {
            for confidence in [0.0, 0.5, 1.0] {
                let result = generate(&finding(severity, confidence));
                assert!(result.risk_score <= 100);
            }
        }
        assert!(generate(&finding(Severity::Critical, 1.0)).risk_score > generate(&finding(Severity::Low, 1.0)).risk_score);
    }

    #[test]
    fn test_priority_tracks_severity() {
        assert_eq!(generate(&finding(Severity::Critical, 0.5)).priority, Priority::P0);
        assert_eq!(generate(&finding(Severity::High, 0.5)).priority, Priority::P1);
        assert_eq!(generate(&finding(Severity::Info, 0.5)).priority, Priority::P3);
    }

    #[test]
    fn test_finding_recommendation_wins_over_template() {
        let f = finding(Severity::High, 0.5).with_recommendation("Upgrade to 2.0");
        assert_eq!(generate(&f).remediation, "Upgrade to 2.0");
    }

    #[test]
    fn test_fallback_source_is_rule_based() {
        assert_eq!(generate(&finding(Severity::High, 0.5)).source, EnrichmentSource::RuleBased);
        let title = generate_title("R1", ToolKind::Secret, Severity::Critical);
        assert_eq!(title.source, EnrichmentSource::RuleBased);
        assert!(title.title.contains("R1"));
    }
}
