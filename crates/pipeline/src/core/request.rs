use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Category of scanning performed by an external tool.
///
/// One adapter exists per kind; a `Finding` also carries the kind of the
/// tool that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// Static application security testing over source code.
    Sast,
    /// Known-vulnerability matching against dependency manifests.
    Sca,
    /// Hardcoded credential and secret detection.
    Secret,
    /// Infrastructure-as-code misconfiguration checks.
    Iac,
    /// Container image and Dockerfile analysis.
    Container,
}

impl ToolKind {
    pub fn all() -> [ToolKind; 5] {
        [
            ToolKind::Sast,
            ToolKind::Sca,
            ToolKind::Secret,
            ToolKind::Iac,
            ToolKind::Container,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sast => "sast",
            Self::Sca => "sca",
            Self::Secret => "secret",
            Self::Iac => "iac",
            Self::Container => "container",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    #[default]
    Quick,
    Full,
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quick => write!(f, "quick"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// One unit of scanning work, immutable once the orchestrator starts.
///
/// The tool set is a `BTreeSet` so the request carries a canonical ordering
/// and two requests over the same tools always derive the same cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub repository_id: String,
    pub commit_hash: String,
    pub enabled_tools: BTreeSet<ToolKind>,
    pub scan_mode: ScanMode,
}

impl ScanRequest {
    pub fn new(repository_id: impl Into<String>, commit_hash: impl Into<String>) -> Self {
        Self {
            repository_id: repository_id.into(),
            commit_hash: commit_hash.into(),
            enabled_tools: ToolKind::all().into_iter().collect(),
            scan_mode: ScanMode::Quick,
        }
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = ToolKind>) -> Self {
        self.enabled_tools = tools.into_iter().collect();
        self
    }

    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.scan_mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_set_is_canonically_ordered() {
        let a = ScanRequest::new("repo", "abc")
            .with_tools([ToolKind::Container, ToolKind::Sast, ToolKind::Secret]);
        let b = ScanRequest::new("repo", "abc")
            .with_tools([ToolKind::Secret, ToolKind::Container, ToolKind::Sast]);
        assert_eq!(a.enabled_tools, b.enabled_tools);
        let ordered: Vec<_> = a.enabled_tools.iter().copied().collect();
        assert_eq!(ordered, vec![ToolKind::Sast, ToolKind::Secret, ToolKind::Container]);
    }
}
