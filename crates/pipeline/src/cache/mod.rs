//! Commit-hash based result cache.
//!
//! A completed scan over the same (repository, commit, tool set) is proof
//! that re-running the tools would produce the same findings, so a cache
//! hit clones the prior scan's findings into the new scan instead of
//! spending tool time. The relational datastore behind this is an external
//! collaborator reached through the `ScanStore` trait; the cache only
//! assumes atomic per-category inserts.

use crate::core::{Finding, ToolKind};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Deterministic identity of (repository, commit, tool set).
///
/// Two `ScanRequest`s with equal keys are equivalent for caching. The tool
/// set arrives as a `BTreeSet`, so the digest input is already canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(repository_id: &str, commit_hash: &str, enabled_tools: &BTreeSet<ToolKind>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(repository_id.as_bytes());
        hasher.update(b"\0");
        hasher.update(commit_hash.as_bytes());
        for tool in enabled_tools {
            hasher.update(b"\0");
            hasher.update(tool.as_str().as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredScan {
    pub scan_id: Uuid,
    pub cache_key: CacheKey,
    pub status: ScanStatus,
    pub created_at: DateTime<Utc>,
}

/// Relational query surface supplied by the surrounding product.
#[async_trait]
pub trait ScanStore: Send + Sync {
    async fn record_scan(&self, scan: StoredScan) -> Result<()>;

    async fn mark_completed(&self, scan_id: Uuid) -> Result<()>;

    /// Most recently created completed scan with this key, if any.
    async fn find_completed_scan(&self, key: &CacheKey) -> Result<Option<StoredScan>>;

    async fn findings_for_scan(&self, scan_id: Uuid) -> Result<Vec<Finding>>;

    /// Atomic insert of one category's findings for a scan.
    async fn insert_findings(
        &self,
        scan_id: Uuid,
        category: ToolKind,
        findings: &[Finding],
    ) -> Result<usize>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDecision {
    pub cached: bool,
    pub source_scan_id: Option<Uuid>,
}

impl CacheDecision {
    fn miss() -> Self {
        Self {
            cached: false,
            source_scan_id: None,
        }
    }
}

pub struct ResultCache {
    store: Arc<dyn ScanStore>,
}

impl ResultCache {
    pub fn new(store: Arc<dyn ScanStore>) -> Self {
        Self { store }
    }

    /// Commit identities that cannot anchor a cache entry.
    fn is_uncacheable_commit(commit_hash: &str) -> bool {
        commit_hash.is_empty() || commit_hash.eq_ignore_ascii_case("unknown")
    }

    pub async fn check(
        &self,
        repository_id: &str,
        commit_hash: &str,
        enabled_tools: &BTreeSet<ToolKind>,
    ) -> Result<CacheDecision> {
        if Self::is_uncacheable_commit(commit_hash) {
            debug!(repository_id, "commit hash missing, cache bypassed");
            return Ok(CacheDecision::miss());
        }

        let key = CacheKey::new(repository_id, commit_hash, enabled_tools);
        match self.store.find_completed_scan(&key).await? {
            Some(scan) => {
                info!(repository_id, commit_hash, source = %scan.scan_id, "cache hit");
                Ok(CacheDecision {
                    cached: true,
                    source_scan_id: Some(scan.scan_id),
                })
            }
            None => Ok(CacheDecision::miss()),
        }
    }

    /// Clone every finding of `source_scan_id` into `new_scan_id`.
    ///
    /// Findings keep all content fields and get a fresh id and timestamp.
    /// Categories are inserted independently; a failing category is logged
    /// and skipped so a partial clone still serves the hit.
    pub async fn clone_results(&self, source_scan_id: Uuid, new_scan_id: Uuid) -> Result<usize> {
        let findings = self.store.findings_for_scan(source_scan_id).await?;

        let mut by_category: HashMap<ToolKind, Vec<Finding>> = HashMap::new();
        for finding in &findings {
            by_category
                .entry(finding.category)
                .or_default()
                .push(finding.recloned());
        }

        let mut cloned = 0;
        for category in ToolKind::all() {
            let Some(batch) = by_category.get(&category) else {
                continue;
            };
            match self.store.insert_findings(new_scan_id, category, batch).await {
                Ok(count) => cloned += count,
                Err(err) => {
                    warn!(%source_scan_id, %new_scan_id, %category, %err, "category clone failed, continuing");
                }
            }
        }

        info!(%source_scan_id, %new_scan_id, cloned, total = findings.len(), "cloned cached findings");
        Ok(cloned)
    }
}

/// In-memory store used by the CLI and the test suite.
#[derive(Default)]
pub struct MemoryScanStore {
    scans: RwLock<Vec<StoredScan>>,
    findings: RwLock<HashMap<Uuid, Vec<Finding>>>,
}

impl MemoryScanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScanStore for MemoryScanStore {
    async fn record_scan(&self, scan: StoredScan) -> Result<()> {
        self.scans.write().push(scan);
        Ok(())
    }

    async fn mark_completed(&self, scan_id: Uuid) -> Result<()> {
        let mut scans = self.scans.write();
        for scan in scans.iter_mut() {
            if scan.scan_id == scan_id {
                scan.status = ScanStatus::Completed;
            }
        }
        Ok(())
    }

    async fn find_completed_scan(&self, key: &CacheKey) -> Result<Option<StoredScan>> {
        let scans = self.scans.read();
        Ok(scans
            .iter()
            .filter(|scan| scan.status == ScanStatus::Completed && &scan.cache_key == key)
            .max_by_key(|scan| scan.created_at)
            .cloned())
    }

    async fn findings_for_scan(&self, scan_id: Uuid) -> Result<Vec<Finding>> {
        Ok(self.findings.read().get(&scan_id).cloned().unwrap_or_default())
    }

    async fn insert_findings(
        &self,
        scan_id: Uuid,
        _category: ToolKind,
        findings: &[Finding],
    ) -> Result<usize> {
        let mut store = self.findings.write();
        store.entry(scan_id).or_default().extend(findings.iter().cloned());
        Ok(findings.len())
    }
}
