//! Adapter availability listing.

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use repoguard_pipeline::adapters::ToolAdapter;
use repoguard_pipeline::orchestrator::AdapterRegistry;

#[derive(Subcommand, Clone)]
pub enum ToolsCommand {
    /// Show each adapter and whether its binary is installed
    List,
}

pub fn execute(command: ToolsCommand) -> Result<()> {
    let ToolsCommand::List = command;

    let registry = AdapterRegistry::with_builtin();
    println!("{}", "Available tool adapters".bold());
    for adapter in registry.all() {
        let status = if adapter.is_available() {
            "installed".green()
        } else {
            "missing".red()
        };
        println!(
            "  {:<12} {:<10} {:<10} {}",
            adapter.name(),
            adapter.kind().to_string().dimmed(),
            status,
            adapter.description().dimmed()
        );
    }
    println!();
    println!(
        "{}",
        "Missing tools are skipped at scan time; they never fail the scan.".dimmed()
    );
    Ok(())
}
