//! repoguard pipeline - Scan Orchestration & Enrichment
//!
//! This crate runs several independent external analysis tools against a
//! repository workspace, normalizes and deduplicates their findings,
//! optionally enriches high-value findings with generated explanations,
//! and caches completed results by commit so identical scans are never
//! repeated.

pub mod adapters;
pub mod cache;
pub mod config;
pub mod core;
pub mod dedup;
pub mod enrich;
pub mod orchestrator;
pub mod pipeline;

pub use crate::core::{Finding, ScanMode, ScanRequest, Severity, ToolKind, ToolResult};

pub use adapters::ToolAdapter;
pub use cache::{CacheDecision, CacheKey, MemoryScanStore, ResultCache, ScanStore};
pub use config::PipelineConfig;
pub use dedup::{DedupConfig, DeduplicationStats, Deduplicator};
pub use enrich::{EnrichmentClient, EnrichmentResult, EnrichmentSource};
pub use orchestrator::{AdapterRegistry, ScanOrchestrator, ScanReport, ToolPhase};
pub use pipeline::{ScanOutcome, ScanPipeline};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
