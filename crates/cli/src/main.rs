use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
use commands::{scan::ScanCommand, tools::ToolsCommand};

#[derive(Parser)]
#[command(name = "repoguard")]
#[command(about = "Repository security scanning with multi-tool orchestration")]
#[command(version = repoguard_pipeline::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scan pipeline against a workspace
    Scan {
        #[command(subcommand)]
        subcommand: ScanCommand,
    },

    /// Inspect the available tool adapters
    Tools {
        #[command(subcommand)]
        subcommand: ToolsCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Scan { subcommand } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::scan::execute(subcommand))
        }
        Commands::Tools { subcommand } => commands::tools::execute(subcommand),
    }
}
