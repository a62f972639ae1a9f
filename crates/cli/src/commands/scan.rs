//! Workspace scanning command.

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use colored::Colorize;
use repoguard_pipeline::core::{ScanMode, ScanRequest, Severity, ToolKind};
use repoguard_pipeline::dedup::Deduplicator;
use repoguard_pipeline::enrich::EnrichmentClient;
use repoguard_pipeline::orchestrator::{AdapterRegistry, ScanOrchestrator, ToolPhase};
use repoguard_pipeline::{MemoryScanStore, PipelineConfig, ScanOutcome, ScanPipeline};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Subcommand, Clone)]
pub enum ScanCommand {
    Run {
        /// Workspace to scan
        #[arg(short, long)]
        path: PathBuf,

        /// Repository identifier used for result caching
        #[arg(long, default_value = "local")]
        repo: String,

        /// Commit hash used for result caching; "unknown" disables caching
        #[arg(long, default_value = "unknown")]
        commit: String,

        /// Tools to run; defaults to all five
        #[arg(long, value_enum, value_delimiter = ',')]
        tools: Vec<ToolArg>,

        #[arg(long, value_enum, default_value_t = ModeArg::Quick)]
        mode: ModeArg,

        #[arg(long, value_enum, default_value_t = FormatArg::Console)]
        format: FormatArg,

        /// Enrich high-severity findings via the configured provider
        #[arg(long)]
        enrich: bool,

        /// Pipeline configuration file (YAML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ToolArg {
    Sast,
    Sca,
    Secret,
    Iac,
    Container,
}

impl From<ToolArg> for ToolKind {
    fn from(arg: ToolArg) -> Self {
        match arg {
            ToolArg::Sast => ToolKind::Sast,
            ToolArg::Sca => ToolKind::Sca,
            ToolArg::Secret => ToolKind::Secret,
            ToolArg::Iac => ToolKind::Iac,
            ToolArg::Container => ToolKind::Container,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ModeArg {
    Quick,
    Full,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum FormatArg {
    Console,
    Json,
}

pub async fn execute(command: ScanCommand) -> Result<()> {
    let ScanCommand::Run {
        path,
        repo,
        commit,
        tools,
        mode,
        format,
        enrich,
        config,
    } = command;

    let workspace = path
        .canonicalize()
        .with_context(|| format!("workspace path {} not found", path.display()))?;

    let config = match config {
        Some(path) => PipelineConfig::from_yaml_file(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => PipelineConfig::from_env(),
    };

    let enabled: Vec<ToolKind> = if tools.is_empty() {
        ToolKind::all().to_vec()
    } else {
        tools.into_iter().map(ToolKind::from).collect()
    };

    let request = ScanRequest::new(repo, commit)
        .with_tools(enabled)
        .with_mode(match mode {
            ModeArg::Quick => ScanMode::Quick,
            ModeArg::Full => ScanMode::Full,
        });

    let orchestrator = ScanOrchestrator::new(AdapterRegistry::with_builtin()).with_progress(
        Arc::new(|tool: &str, phase: ToolPhase| match phase {
            ToolPhase::Started => eprintln!("  {} {}", "▶".cyan(), tool),
            ToolPhase::Completed => eprintln!("  {} {}", "✔".green(), tool),
        }),
    );

    let enrichment = if enrich {
        EnrichmentClient::from_config(config.enrichment.clone())
    } else {
        EnrichmentClient::new(None, config.enrichment.clone())
    };

    let pipeline = ScanPipeline::new(
        Arc::new(MemoryScanStore::new()),
        orchestrator,
        Deduplicator::new(config.dedup.clone()),
        enrichment,
    );

    let outcome = pipeline.execute(&request, &workspace).await?;

    match format {
        FormatArg::Console => print_console(&outcome),
        FormatArg::Json => print_json(&outcome)?,
    }
    Ok(())
}

fn severity_label(severity: Severity) -> colored::ColoredString {
    match severity {
        Severity::Critical => "CRITICAL".red().bold(),
        Severity::High => "HIGH".bright_red(),
        Severity::Medium => "MEDIUM".yellow(),
        Severity::Low => "LOW".bright_yellow(),
        Severity::Info => "INFO".blue(),
    }
}

fn print_console(outcome: &ScanOutcome) {
    println!();
    println!("{}", format!("Scan {}", outcome.scan_id).bold());

    if outcome.from_cache {
        println!("{}", "Served from cache — identical commit already scanned".dimmed());
    } else if let Some(report) = &outcome.report {
        println!(
            "{} tools, {} raw findings, {} ms",
            report.tool_results.len(),
            report.total_findings,
            report.total_duration_ms
        );
        for metrics in report.metrics() {
            let status = if metrics.success {
                "ok".green()
            } else {
                "failed".red()
            };
            println!(
                "  {:<12} {:>6} ms  {:>3} findings  {}",
                metrics.tool_name, metrics.duration_ms, metrics.findings_found, status
            );
        }
        if let Some(stats) = &outcome.dedup_stats {
            if stats.removed_count > 0 {
                println!(
                    "{}",
                    format!(
                        "Deduplication removed {} of {} findings ({:.0}%)",
                        stats.removed_count,
                        stats.original_count,
                        stats.reduction_percentage()
                    )
                    .dimmed()
                );
            }
        }
    }

    println!();
    if outcome.findings.is_empty() {
        println!("{}", "No findings.".green());
        return;
    }

    for finding in &outcome.findings {
        println!(
            "{} [{}] {} {}",
            severity_label(finding.severity),
            finding.tool_name,
            finding.title,
            format!("({}:{})", finding.file_path, finding.line_start).dimmed()
        );
        if let Some(enrichment) = outcome.enrichments.get(&finding.id) {
            println!(
                "    {} risk {} · {} · {:?}",
                "↳".dimmed(),
                enrichment.risk_score,
                enrichment.priority,
                enrichment.source
            );
            println!("    {}", enrichment.explanation.dimmed());
        }
    }

    println!();
    println!("{} findings total", outcome.findings.len().to_string().bold());
}

fn print_json(outcome: &ScanOutcome) -> Result<()> {
    let enrichments: serde_json::Map<String, serde_json::Value> = outcome
        .enrichments
        .iter()
        .map(|(id, e)| Ok((id.to_string(), serde_json::to_value(e)?)))
        .collect::<Result<_>>()?;

    let value = serde_json::json!({
        "scan_id": outcome.scan_id,
        "from_cache": outcome.from_cache,
        "report": &outcome.report,
        "dedup_stats": &outcome.dedup_stats,
        "findings": &outcome.findings,
        "enrichments": enrichments,
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
