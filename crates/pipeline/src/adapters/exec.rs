//! Shared subprocess layer for tool adapters.
//!
//! Every external tool runs through here: PATH resolution, a wall-clock
//! timeout that kills the subprocess on expiry, and the common exit-code
//! contract (0 = clean, 1 = findings present, anything above = tool
//! failure). Report files are placed at a path unique to the scan id so
//! concurrent scans never collide, and removed again whichever way the
//! adapter exits.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ToolExecError {
    #[error("tool binary '{0}' not found on PATH")]
    NotInstalled(String),

    #[error("tool timed out after {0} seconds")]
    Timeout(u64),

    #[error("tool exited with status {code}: {stderr}")]
    ExitFailure { code: i32, stderr: String },

    #[error("failed to run tool: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse tool report: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Locate `binary` on PATH. No shelling out to `which`.
pub fn find_binary(binary: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(binary);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Temporary report file scoped to one adapter invocation.
///
/// The file is deleted on drop so parse failures and timeouts clean up the
/// same way the success path does.
pub struct ReportArtifact {
    path: PathBuf,
}

impl ReportArtifact {
    pub fn for_scan(tool: &str, scan_id: Uuid) -> Self {
        let path = std::env::temp_dir().join(format!("{tool}-{scan_id}.json"));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<String, ToolExecError> {
        Ok(std::fs::read_to_string(&self.path)?)
    }
}

impl Drop for ReportArtifact {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(err) = std::fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), %err, "failed to remove report artifact");
            }
        }
    }
}

#[derive(Debug)]
pub struct ToolOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ToolOutput {
    /// Exit-code contract shared by the wrapped tools: 0 means a clean run,
    /// 1 means the tool ran and reported findings. Both are successes.
    pub fn is_success(&self) -> bool {
        matches!(self.exit_code, 0 | 1)
    }
}

/// Run one tool invocation as an isolated, time-bounded subprocess.
///
/// The child is spawned with `kill_on_drop`, so cancelling the surrounding
/// future (orchestrator teardown, outer deadline) reaps it instead of
/// leaving it running against the workspace.
pub async fn run_tool(
    binary: &str,
    args: &[String],
    cwd: &Path,
    timeout: Duration,
) -> Result<ToolOutput, ToolExecError> {
    let program = find_binary(binary).ok_or_else(|| ToolExecError::NotInstalled(binary.to_string()))?;

    debug!(tool = binary, ?args, timeout_secs = timeout.as_secs(), "spawning tool subprocess");

    let started = Instant::now();
    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, command.output()).await {
        Ok(result) => result?,
        Err(_) => {
            warn!(tool = binary, timeout_secs = timeout.as_secs(), "tool exceeded deadline, killed");
            return Err(ToolExecError::Timeout(timeout.as_secs()));
        }
    };

    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let duration = started.elapsed();

    debug!(tool = binary, exit_code, elapsed_ms = duration.as_millis() as u64, "tool finished");

    let result = ToolOutput {
        exit_code,
        stdout,
        stderr,
        duration,
    };

    if result.is_success() {
        Ok(result)
    } else {
        Err(ToolExecError::ExitFailure {
            code: result.exit_code,
            stderr: truncate(&result.stderr, 2000),
        })
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_string()
    } else {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &text[..end])
    }
}
