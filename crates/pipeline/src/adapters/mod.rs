//! Tool adapters wrapping external scanning CLIs.
//!
//! ## Design Philosophy: One Contract, Opaque Tools
//!
//! The pipeline never looks inside a scanning tool. Each adapter owns the
//! full translation for one binary: invocation flags, report location,
//! exit-code interpretation, and the mapping from the tool's native report
//! shape into the common `Finding` record. Everything downstream of
//! `ToolAdapter::scan` is tool-agnostic.
//!
//! Adapters are infallible at the trait boundary. A missing binary, a
//! crashed subprocess, or an unparsable report all fold into a failed
//! `ToolResult` so the orchestrator can keep the other tools running.

pub mod checkov;
pub mod exec;
pub mod gitleaks;
pub mod osv;
pub mod semgrep;
pub mod trivy;

use crate::core::{ScanMode, ToolKind, ToolResult};
use async_trait::async_trait;
use std::path::Path;
use uuid::Uuid;

pub use checkov::CheckovAdapter;
pub use exec::{find_binary, ReportArtifact, ToolExecError, ToolOutput};
pub use gitleaks::GitleaksAdapter;
pub use osv::OsvScannerAdapter;
pub use semgrep::SemgrepAdapter;
pub use trivy::TrivyAdapter;

#[async_trait]
pub trait ToolAdapter: Send + Sync {
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn kind(&self) -> ToolKind;

    /// Binary the adapter shells out to.
    fn binary(&self) -> &'static str;

    fn description(&self) -> &'static str {
        "No description provided"
    }

    fn is_available(&self) -> bool {
        exec::find_binary(self.binary()).is_some()
    }

    /// Run the tool against a read-only workspace snapshot.
    ///
    /// Never returns an error: every failure mode is a `ToolResult` with
    /// `success = false` and a diagnostic.
    async fn scan(&self, workspace: &Path, scan_id: Uuid, mode: ScanMode) -> ToolResult;
}

/// All five built-in adapters, one per `ToolKind`.
pub fn builtin_adapters() -> Vec<std::sync::Arc<dyn ToolAdapter>> {
    vec![
        std::sync::Arc::new(SemgrepAdapter),
        std::sync::Arc::new(OsvScannerAdapter),
        std::sync::Arc::new(GitleaksAdapter),
        std::sync::Arc::new(CheckovAdapter),
        std::sync::Arc::new(TrivyAdapter),
    ]
}
