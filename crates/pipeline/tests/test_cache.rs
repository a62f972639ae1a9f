//! Cache equivalence: a served hit is indistinguishable from a fresh
//! identical scan, modulo identity and timestamp.

use chrono::Utc;
use repoguard_pipeline::cache::{MemoryScanStore, ResultCache, ScanStatus, ScanStore, StoredScan};
use repoguard_pipeline::core::{Finding, Severity, ToolKind};
use repoguard_pipeline::CacheKey;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

fn sample_findings() -> Vec<Finding> {
    vec![
        Finding::new("semgrep", ToolKind::Sast, Severity::High, "SQLi", "python.sqli")
            .with_location("app/db.py", 42, 44)
            .with_confidence(0.9)
            .with_cwe(vec!["CWE-89".to_string()]),
        Finding::new("gitleaks", ToolKind::Secret, Severity::Critical, "AWS key", "aws-access-key-id")
            .with_location("config/settings.py", 12, 12)
            .with_confidence(0.75),
        Finding::new("osv-scanner", ToolKind::Sca, Severity::Medium, "Dep vuln", "GHSA-1234")
            .with_location("requirements.txt", 0, 0)
            .with_cve("CVE-2021-0001")
            .with_confidence(0.9),
    ]
}

/// Projection that ignores id, scan ownership, and detected_at.
fn content_key(finding: &Finding) -> (String, String, String, u32, u32, String, f64) {
    (
        finding.tool_name.clone(),
        finding.rule_id.clone(),
        finding.file_path.clone(),
        finding.line_start,
        finding.line_end,
        format!("{:?}{:?}", finding.cwe, finding.cve),
        finding.confidence,
    )
}

async fn seed_completed_scan(store: &Arc<MemoryScanStore>, key: &CacheKey) -> Uuid {
    let scan_id = Uuid::new_v4();
    store
        .record_scan(StoredScan {
            scan_id,
            cache_key: key.clone(),
            status: ScanStatus::Completed,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    for finding in sample_findings() {
        store
            .insert_findings(scan_id, finding.category, &[finding])
            .await
            .unwrap();
    }
    scan_id
}

#[tokio::test]
async fn test_clone_preserves_content_and_refreshes_identity() {
    let store = Arc::new(MemoryScanStore::new());
    let tools: BTreeSet<ToolKind> = [ToolKind::Sast, ToolKind::Secret, ToolKind::Sca]
        .into_iter()
        .collect();
    let key = CacheKey::new("repo-1", "deadbeef", &tools);
    let source_id = seed_completed_scan(&store, &key).await;

    let cache = ResultCache::new(store.clone());
    let new_id = Uuid::new_v4();
    let cloned = cache.clone_results(source_id, new_id).await.unwrap();
    assert_eq!(cloned, 3);

    let source = store.findings_for_scan(source_id).await.unwrap();
    let clones = store.findings_for_scan(new_id).await.unwrap();
    assert_eq!(clones.len(), source.len());

    let mut source_keys: Vec<_> = source.iter().map(content_key).collect();
    let mut clone_keys: Vec<_> = clones.iter().map(content_key).collect();
    source_keys.sort_by(|a, b| a.partial_cmp(b).unwrap());
    clone_keys.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(source_keys, clone_keys);

    // Identity fields must differ.
    let source_ids: BTreeSet<_> = source.iter().map(|f| f.id).collect();
    for clone in &clones {
        assert!(!source_ids.contains(&clone.id));
    }
}

#[tokio::test]
async fn test_check_hits_only_on_equal_key() {
    let store = Arc::new(MemoryScanStore::new());
    let tools: BTreeSet<ToolKind> = [ToolKind::Sast].into_iter().collect();
    let key = CacheKey::new("repo-1", "deadbeef", &tools);
    seed_completed_scan(&store, &key).await;

    let cache = ResultCache::new(store);

    let hit = cache.check("repo-1", "deadbeef", &tools).await.unwrap();
    assert!(hit.cached);

    let other_commit = cache.check("repo-1", "cafebabe", &tools).await.unwrap();
    assert!(!other_commit.cached);

    let wider: BTreeSet<ToolKind> = [ToolKind::Sast, ToolKind::Secret].into_iter().collect();
    let other_tools = cache.check("repo-1", "deadbeef", &wider).await.unwrap();
    assert!(!other_tools.cached);
}

#[tokio::test]
async fn test_running_scans_never_serve_hits() {
    let store = Arc::new(MemoryScanStore::new());
    let tools: BTreeSet<ToolKind> = [ToolKind::Sast].into_iter().collect();
    let key = CacheKey::new("repo-1", "deadbeef", &tools);
    store
        .record_scan(StoredScan {
            scan_id: Uuid::new_v4(),
            cache_key: key,
            status: ScanStatus::Running,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    let cache = ResultCache::new(store);
    let decision = cache.check("repo-1", "deadbeef", &tools).await.unwrap();
    assert!(!decision.cached);
}
