//! Prompt construction for enrichment requests.

use crate::core::{Finding, Severity, ToolKind};

const ENRICHMENT_SCHEMA: &str = r#"{
  "explanation": "<2-4 sentences on why this finding matters>",
  "business_impact": "<1-2 sentences for a non-technical owner>",
  "remediation": "<concrete fix steps>",
  "suggested_patch": "<code diff or null>",
  "risk_score": <0-100>,
  "priority": "<P0|P1|P2|P3>",
  "false_positive_score": <0.0-1.0>,
  "confidence": <0.0-1.0>
}"#;

pub fn enrichment_prompt(finding: &Finding) -> String {
    format!(
        "Analyze this security finding and respond with a JSON object matching the schema.\n\n\
         Finding:\n\
         - tool: {tool} ({category})\n\
         - rule: {rule}\n\
         - severity: {severity}\n\
         - title: {title}\n\
         - location: {file}:{line_start}-{line_end}\n\
         - description: {description}\n\n\
         Schema:\n{schema}",
        tool = finding.tool_name,
        category = finding.category,
        rule = finding.rule_id,
        severity = finding.severity,
        title = finding.title,
        file = finding.file_path,
        line_start = finding.line_start,
        line_end = finding.line_end,
        description = finding.description,
        schema = ENRICHMENT_SCHEMA,
    )
}

pub fn title_prompt(rule_id: &str, category: ToolKind, severity: Severity, description: &str) -> String {
    format!(
        "Write a short, specific title (at most 10 words) for this security finding. \
         Respond with a JSON object: {{\"title\": \"...\"}}.\n\n\
         rule: {rule_id}\ncategory: {category}\nseverity: {severity}\ndescription: {description}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrichment_prompt_includes_finding_facts() {
        let finding = Finding::new("semgrep", ToolKind::Sast, Severity::High, "SQLi", "python.sqli")
            .with_location("app/db.py", 42, 44)
            .with_description("tainted input reaches execute()");
        let prompt = enrichment_prompt(&finding);
        assert!(prompt.contains("python.sqli"));
        assert!(prompt.contains("app/db.py:42-44"));
        assert!(prompt.contains("risk_score"));
    }
}
