//! Command implementations for the repoguard CLI.
//!
//! `scan` runs the full pipeline (cache, orchestration, deduplication,
//! optional enrichment) against a local workspace; `tools` reports which
//! external scanners are installed and would participate in a run.

pub mod scan;
pub mod tools;
