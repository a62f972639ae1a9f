//! Per-adapter timeout policy.
//!
//! Deadlines scale with workspace size: file count times an empirical
//! per-file cost, clamped to a [2 min, 30 min] window. Full mode budgets
//! 2.5x the quick-mode cost. The orchestrator wraps each adapter in the
//! same deadline plus a fixed buffer, so the subprocess timeout always
//! fires first and the orchestrator kill is the backstop.

use crate::core::ScanMode;
use std::path::Path;
use std::time::Duration;
use walkdir::WalkDir;

pub const MIN_TOOL_TIMEOUT: Duration = Duration::from_secs(120);
pub const MAX_TOOL_TIMEOUT: Duration = Duration::from_secs(1800);

const QUICK_COST_MS_PER_FILE: u64 = 150;
const FULL_COST_MS_PER_FILE: u64 = 375;

/// Orchestrator backstop margin on top of the adapter's own timeout.
const BUFFER_PERCENT: u64 = 25;

/// Count regular files in the workspace, skipping VCS internals.
pub fn workspace_file_count(workspace: &Path) -> usize {
    WalkDir::new(workspace)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git")
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .count()
}

pub fn for_file_count(file_count: usize, mode: ScanMode) -> Duration {
    let per_file = match mode {
        ScanMode::Quick => QUICK_COST_MS_PER_FILE,
        ScanMode::Full => FULL_COST_MS_PER_FILE,
    };
    let budget = Duration::from_millis(file_count as u64 * per_file);
    budget.clamp(MIN_TOOL_TIMEOUT, MAX_TOOL_TIMEOUT)
}

pub fn for_workspace(workspace: &Path, mode: ScanMode) -> Duration {
    for_file_count(workspace_file_count(workspace), mode)
}

pub fn with_buffer(deadline: Duration) -> Duration {
    deadline + deadline * BUFFER_PERCENT as u32 / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_workspace_gets_floor() {
        assert_eq!(for_file_count(3, ScanMode::Quick), MIN_TOOL_TIMEOUT);
        assert_eq!(for_file_count(0, ScanMode::Full), MIN_TOOL_TIMEOUT);
    }

    #[test]
    fn test_huge_workspace_gets_ceiling() {
        assert_eq!(for_file_count(1_000_000, ScanMode::Quick), MAX_TOOL_TIMEOUT);
    }

    #[test]
    fn test_full_mode_costs_two_and_a_half_times_quick() {
        // 2000 files: quick = 300s, full = 750s, both inside the clamp window.
        let quick = for_file_count(2000, ScanMode::Quick);
        let full = for_file_count(2000, ScanMode::Full);
        assert_eq!(quick, Duration::from_secs(300));
        assert_eq!(full, Duration::from_secs(750));
    }

    #[test]
    fn test_buffer_adds_quarter() {
        assert_eq!(with_buffer(Duration::from_secs(400)), Duration::from_secs(500));
    }

    #[test]
    fn test_file_count_skips_git_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "x = 1").unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/config"), "[core]").unwrap();
        assert_eq!(workspace_file_count(dir.path()), 1);
    }
}
