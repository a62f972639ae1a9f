//! End-to-end scan execution.
//!
//! Data flow: cache check → (hit: clone prior findings) or (miss: run all
//! enabled adapters concurrently → deduplicate → selectively enrich) →
//! persist. A scan always completes with a result set; in the worst case
//! every tool is missing and enrichment is rule-based only.

use crate::cache::{CacheKey, ResultCache, ScanStatus, ScanStore, StoredScan};
use crate::core::{Finding, ScanRequest};
use crate::dedup::{DeduplicationStats, Deduplicator};
use crate::enrich::{EnrichmentClient, EnrichmentResult};
use crate::orchestrator::{ScanOrchestrator, ScanReport};
use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct ScanOutcome {
    pub scan_id: Uuid,
    pub from_cache: bool,
    /// Tool-level report; absent on a cache hit, where no tools ran.
    pub report: Option<ScanReport>,
    pub dedup_stats: Option<DeduplicationStats>,
    pub findings: Vec<Finding>,
    pub enrichments: HashMap<Uuid, EnrichmentResult>,
}

pub struct ScanPipeline {
    store: Arc<dyn ScanStore>,
    cache: ResultCache,
    orchestrator: ScanOrchestrator,
    deduplicator: Deduplicator,
    enrichment: EnrichmentClient,
}

impl ScanPipeline {
    pub fn new(
        store: Arc<dyn ScanStore>,
        orchestrator: ScanOrchestrator,
        deduplicator: Deduplicator,
        enrichment: EnrichmentClient,
    ) -> Self {
        Self {
            cache: ResultCache::new(store.clone()),
            store,
            orchestrator,
            deduplicator,
            enrichment,
        }
    }

    pub async fn execute(&self, request: &ScanRequest, workspace: &Path) -> Result<ScanOutcome> {
        let scan_id = Uuid::new_v4();
        let cache_key = CacheKey::new(
            &request.repository_id,
            &request.commit_hash,
            &request.enabled_tools,
        );

        self.store
            .record_scan(StoredScan {
                scan_id,
                cache_key,
                status: ScanStatus::Running,
                created_at: Utc::now(),
            })
            .await?;

        let decision = self
            .cache
            .check(&request.repository_id, &request.commit_hash, &request.enabled_tools)
            .await?;

        if let Some(source_scan_id) = decision.source_scan_id.filter(|_| decision.cached) {
            match self.cache.clone_results(source_scan_id, scan_id).await {
                Ok(cloned) => {
                    self.store.mark_completed(scan_id).await?;
                    let findings = self.store.findings_for_scan(scan_id).await?;
                    info!(%scan_id, %source_scan_id, cloned, "served scan from cache");
                    return Ok(ScanOutcome {
                        scan_id,
                        from_cache: true,
                        report: None,
                        dedup_stats: None,
                        findings,
                        enrichments: HashMap::new(),
                    });
                }
                // A hit that cannot be served degrades to a fresh scan, not
                // a failed request.
                Err(err) => {
                    warn!(%scan_id, %source_scan_id, %err, "cache clone failed, rescanning");
                }
            }
        }

        let report = self
            .orchestrator
            .run_all(workspace, scan_id, &request.enabled_tools, request.scan_mode)
            .await;

        let (findings, dedup_stats) = self.deduplicator.deduplicate(report.findings());

        let mut enrichments = HashMap::new();
        let min_severity = self.enrichment.config().min_severity;
        for finding in findings.iter().filter(|f| f.severity >= min_severity) {
            let result = self.enrichment.enrich(finding).await;
            enrichments.insert(finding.id, result);
        }

        let mut by_category: HashMap<crate::core::ToolKind, Vec<Finding>> = HashMap::new();
        for finding in &findings {
            by_category.entry(finding.category).or_default().push(finding.clone());
        }
        for (category, batch) in by_category {
            if let Err(err) = self.store.insert_findings(scan_id, category, &batch).await {
                warn!(%scan_id, %category, %err, "failed to persist findings for category");
            }
        }
        self.store.mark_completed(scan_id).await?;

        info!(
            %scan_id,
            findings = findings.len(),
            enriched = enrichments.len(),
            "scan pipeline complete"
        );
        Ok(ScanOutcome {
            scan_id,
            from_cache: false,
            report: Some(report),
            dedup_stats: Some(dedup_stats),
            findings,
            enrichments,
        })
    }
}
