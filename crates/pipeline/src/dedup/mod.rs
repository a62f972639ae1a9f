//! Cross-tool deduplication.
//!
//! Multiple tools frequently report the same logical issue with slightly
//! different anchor lines. Findings are grouped by (file, rule, 10-line
//! bucket); each group keeps one representative. Findings in different
//! files or under different rule ids are never merged — a false merge
//! hides a real issue, a false duplicate only costs a second look.

use crate::core::{Finding, ToolKind};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

fn default_tool_priority() -> Vec<ToolKind> {
    vec![
        ToolKind::Sast,
        ToolKind::Sca,
        ToolKind::Secret,
        ToolKind::Iac,
        ToolKind::Container,
    ]
}

fn default_line_bucket() -> u32 {
    10
}

/// Tie-break policy between tools reporting the same issue at the same
/// confidence. The default order reflects observed precision; it is a
/// product judgment, kept as configuration rather than a constant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    #[serde(default = "default_tool_priority")]
    pub tool_priority: Vec<ToolKind>,

    #[serde(default = "default_line_bucket")]
    pub line_bucket: u32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            tool_priority: default_tool_priority(),
            line_bucket: default_line_bucket(),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DeduplicationStats {
    pub original_count: usize,
    pub deduped_count: usize,
    pub removed_count: usize,
}

impl DeduplicationStats {
    pub fn reduction_percentage(&self) -> f64 {
        if self.original_count == 0 {
            0.0
        } else {
            (self.removed_count as f64 / self.original_count as f64) * 100.0
        }
    }
}

pub struct Deduplicator {
    config: DedupConfig,
}

impl Deduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    fn group_key(&self, finding: &Finding) -> (String, String, u32) {
        let bucket = self.config.line_bucket.max(1);
        (
            finding.file_path.clone(),
            finding.rule_id.clone(),
            finding.line_start - finding.line_start % bucket,
        )
    }

    fn priority_rank(&self, kind: ToolKind) -> usize {
        self.config
            .tool_priority
            .iter()
            .position(|&k| k == kind)
            .unwrap_or(self.config.tool_priority.len())
    }

    /// Best-first ordering inside one group: higher confidence wins, then
    /// the configured tool priority, then stable lexicographic tie-breaks
    /// so the winner never depends on input order.
    fn compare(&self, a: &Finding, b: &Finding) -> Ordering {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| self.priority_rank(a.category).cmp(&self.priority_rank(b.category)))
            .then_with(|| a.tool_name.cmp(&b.tool_name))
            .then_with(|| a.id.cmp(&b.id))
    }

    pub fn deduplicate(&self, findings: Vec<Finding>) -> (Vec<Finding>, DeduplicationStats) {
        let original_count = findings.len();

        let mut groups: HashMap<(String, String, u32), Vec<Finding>> = HashMap::new();
        for finding in findings {
            groups.entry(self.group_key(&finding)).or_default().push(finding);
        }

        let mut kept: Vec<Finding> = groups
            .into_values()
            .filter_map(|mut group| {
                group.sort_by(|a, b| self.compare(a, b));
                group.into_iter().next()
            })
            .collect();

        kept.sort_by(|a, b| {
            a.file_path
                .cmp(&b.file_path)
                .then_with(|| a.line_start.cmp(&b.line_start))
                .then_with(|| a.rule_id.cmp(&b.rule_id))
        });

        let stats = DeduplicationStats {
            original_count,
            deduped_count: kept.len(),
            removed_count: original_count - kept.len(),
        };
        debug!(
            original = stats.original_count,
            kept = stats.deduped_count,
            removed = stats.removed_count,
            "deduplication complete"
        );
        (kept, stats)
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DedupConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Severity;

    fn finding(tool: &str, kind: ToolKind, file: &str, rule: &str, line: u32, confidence: f64) -> Finding {
        Finding::new(tool, kind, Severity::High, format!("{rule} at {line}"), rule)
            .with_location(file, line, line)
            .with_confidence(confidence)
    }

    #[test]
    fn test_nearby_lines_same_rule_collapse() {
        let input = vec![
            finding("semgrep", ToolKind::Sast, "a.py", "R1", 42, 0.8),
            finding("trivy", ToolKind::Container, "a.py", "R1", 44, 0.95),
        ];
        let (kept, stats) = Deduplicator::default().deduplicate(input);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.95);
        assert_eq!(stats.removed_count, 1);
    }

    #[test]
    fn test_bucket_boundary_keeps_both() {
        // Lines 49 and 51 land in different 10-line buckets.
        let input = vec![
            finding("semgrep", ToolKind::Sast, "a.py", "R1", 49, 0.8),
            finding("semgrep", ToolKind::Sast, "a.py", "R1", 51, 0.8),
        ];
        let (kept, _) = Deduplicator::default().deduplicate(input);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_different_files_never_merge() {
        let input = vec![
            finding("semgrep", ToolKind::Sast, "a.py", "R1", 42, 0.8),
            finding("semgrep", ToolKind::Sast, "b.py", "R1", 42, 0.8),
        ];
        let (kept, _) = Deduplicator::default().deduplicate(input);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_different_rules_never_merge() {
        let input = vec![
            finding("semgrep", ToolKind::Sast, "a.py", "R1", 42, 0.8),
            finding("semgrep", ToolKind::Sast, "a.py", "R2", 42, 0.8),
        ];
        let (kept, _) = Deduplicator::default().deduplicate(input);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_tool_priority_breaks_confidence_ties() {
        let input = vec![
            finding("trivy", ToolKind::Container, "a.py", "R1", 42, 0.8),
            finding("semgrep", ToolKind::Sast, "a.py", "R1", 43, 0.8),
        ];
        let (kept, _) = Deduplicator::default().deduplicate(input);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].category, ToolKind::Sast);
    }

    #[test]
    fn test_priority_is_configurable() {
        let config = DedupConfig {
            tool_priority: vec![
                ToolKind::Container,
                ToolKind::Iac,
                ToolKind::Secret,
                ToolKind::Sca,
                ToolKind::Sast,
            ],
            line_bucket: 10,
        };
        let input = vec![
            finding("trivy", ToolKind::Container, "a.py", "R1", 42, 0.8),
            finding("semgrep", ToolKind::Sast, "a.py", "R1", 43, 0.8),
        ];
        let (kept, _) = Deduplicator::new(config).deduplicate(input);
        assert_eq!(kept[0].category, ToolKind::Container);
    }

    #[test]
    fn test_order_independence() {
        let a = finding("semgrep", ToolKind::Sast, "a.py", "R1", 42, 0.8);
        let b = finding("gitleaks", ToolKind::Secret, "a.py", "R1", 44, 0.95);
        let c = finding("checkov", ToolKind::Iac, "b.tf", "R2", 7, 0.6);

        let forward = vec![a.clone(), b.clone(), c.clone()];
        let reverse = vec![c, b, a];

        let dedup = Deduplicator::default();
        let (kept_forward, _) = dedup.deduplicate(forward);
        let (kept_reverse, _) = dedup.deduplicate(reverse);

        let ids_forward: Vec<_> = kept_forward.iter().map(|f| f.id).collect();
        let ids_reverse: Vec<_> = kept_reverse.iter().map(|f| f.id).collect();
        assert_eq!(ids_forward, ids_reverse);
    }
}
