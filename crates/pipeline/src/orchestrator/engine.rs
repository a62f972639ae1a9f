//! Concurrent scan orchestration.
//!
//! All enabled adapters run as independent tokio tasks over the same
//! read-only workspace; no shared mutable state exists between them, and
//! their results are only merged after every task settles. One adapter's
//! failure — missing tool, bad exit, timeout, even a panic in the task —
//! lands in that adapter's `ToolResult` and nothing else.
//!
//! Completion order is nondeterministic, so results are sorted by tool
//! name before aggregation: identical adapter outputs always produce an
//! identical report. Dropping the `run_all` future aborts the task set,
//! and adapter subprocesses are spawned kill-on-drop, so cancellation
//! tears the whole scan down without orphaned processes.

use crate::adapters::ToolAdapter;
use crate::core::{Finding, ScanMode, ToolKind, ToolResult};
use crate::orchestrator::{deadline, AdapterRegistry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolPhase {
    Started,
    Completed,
}

/// External progress reporting only. The orchestrator behaves identically
/// whether or not a hook is installed.
pub type ProgressHook = Arc<dyn Fn(&str, ToolPhase) + Send + Sync>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetrics {
    pub tool_name: String,
    pub duration_ms: u64,
    pub findings_found: usize,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub tool_results: Vec<ToolResult>,
    pub total_findings: usize,
    pub total_duration_ms: u64,
}

impl ScanReport {
    pub fn empty() -> Self {
        Self {
            tool_results: Vec::new(),
            total_findings: 0,
            total_duration_ms: 0,
        }
    }

    fn from_results(mut results: Vec<ToolResult>, wall_clock: Duration) -> Self {
        results.sort_by(|a, b| a.tool_name.cmp(&b.tool_name));
        let total_findings = results.iter().map(|r| r.findings.len()).sum();
        Self {
            tool_results: results,
            total_findings,
            total_duration_ms: wall_clock.as_millis() as u64,
        }
    }

    pub fn metrics(&self) -> Vec<ToolMetrics> {
        self.tool_results
            .iter()
            .map(|result| ToolMetrics {
                tool_name: result.tool_name.clone(),
                duration_ms: result.duration_ms,
                findings_found: result.findings.len(),
                success: result.success,
            })
            .collect()
    }

    pub fn findings(&self) -> Vec<Finding> {
        self.tool_results
            .iter()
            .flat_map(|result| result.findings.iter().cloned())
            .collect()
    }

    pub fn result_for(&self, tool_name: &str) -> Option<&ToolResult> {
        self.tool_results.iter().find(|r| r.tool_name == tool_name)
    }
}

pub struct ScanOrchestrator {
    registry: AdapterRegistry,
    progress: Option<ProgressHook>,
}

impl ScanOrchestrator {
    pub fn new(registry: AdapterRegistry) -> Self {
        Self {
            registry,
            progress: None,
        }
    }

    pub fn with_progress(mut self, hook: ProgressHook) -> Self {
        self.progress = Some(hook);
        self
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub async fn run_all(
        &self,
        workspace: &Path,
        scan_id: Uuid,
        enabled_tools: &BTreeSet<ToolKind>,
        mode: ScanMode,
    ) -> ScanReport {
        let adapters = self.registry.for_kinds(enabled_tools);
        if adapters.is_empty() {
            info!(%scan_id, "no tools enabled, returning empty report");
            return ScanReport::empty();
        }

        let started = Instant::now();
        let budget = deadline::with_buffer(deadline::for_workspace(workspace, mode));
        info!(
            %scan_id,
            tools = adapters.len(),
            budget_secs = budget.as_secs(),
            %mode,
            "starting concurrent scan"
        );

        let mut tasks = JoinSet::new();
        let mut task_meta: HashMap<tokio::task::Id, (String, ToolKind)> = HashMap::new();

        for adapter in adapters {
            let workspace = workspace.to_path_buf();
            let progress = self.progress.clone();
            let meta = (adapter.name().to_string(), adapter.kind());
            let handle = tasks.spawn(run_one(adapter, workspace, scan_id, mode, budget, progress));
            task_meta.insert(handle.id(), meta);
        }

        let mut results = Vec::with_capacity(task_meta.len());
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_id, result)) => results.push(result),
                // A panicking adapter task loses its result but must not
                // take the scan down with it.
                Err(err) => {
                    let (name, kind) = task_meta
                        .get(&err.id())
                        .cloned()
                        .unwrap_or_else(|| ("unknown".to_string(), ToolKind::Sast));
                    warn!(tool = %name, %err, "scan task aborted");
                    results.push(ToolResult::failed(
                        name,
                        kind,
                        format!("scan task aborted: {err}"),
                        Duration::ZERO,
                    ));
                }
            }
        }

        let report = ScanReport::from_results(results, started.elapsed());
        info!(
            %scan_id,
            total_findings = report.total_findings,
            elapsed_ms = report.total_duration_ms,
            "scan complete"
        );
        report
    }
}

async fn run_one(
    adapter: Arc<dyn ToolAdapter>,
    workspace: std::path::PathBuf,
    scan_id: Uuid,
    mode: ScanMode,
    budget: Duration,
    progress: Option<ProgressHook>,
) -> ToolResult {
    if let Some(hook) = &progress {
        hook(adapter.name(), ToolPhase::Started);
    }

    let started = Instant::now();
    let result = match tokio::time::timeout(budget, adapter.scan(&workspace, scan_id, mode)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(tool = adapter.name(), budget_secs = budget.as_secs(), "adapter exceeded orchestrator deadline");
            ToolResult::failed(
                adapter.name(),
                adapter.kind(),
                format!("exceeded orchestrator deadline of {}s", budget.as_secs()),
                started.elapsed(),
            )
        }
    };

    if let Some(hook) = &progress {
        hook(adapter.name(), ToolPhase::Completed);
    }
    result
}
