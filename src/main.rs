//! Clonar - query understanding and retrieval orchestration CLI
//!
#![doc = "Clonar - query understanding and retrieval orchestration CLI"]
#![doc = "Main entry point for the Clonar command-line tool."]

use anyhow::Result;

use clonar::cli::{Cli, Commands};
use clonar::commands;
use clonar::config::Config;
use clonar::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    init_logging(&config.logging)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Repair { query, domain } => {
            tracing::info!("Repairing query");
            commands::repair::run_repair(config, query, domain).await?;
            Ok(())
        }
        Commands::Plan {
            query,
            mode,
            history,
            no_repair,
            json,
        } => {
            tracing::info!("Planning query");
            if let Some(m) = &mode {
                tracing::debug!("Using mode override: {}", m);
            }
            commands::plan::run_plan(config, query, mode, history, no_repair, json).await?;
            Ok(())
        }
        Commands::Novelty { candidates, recent } => {
            commands::novelty::run_novelty(candidates, recent)?;
            Ok(())
        }
        Commands::Shop {
            queries,
            hotels,
            json,
        } => {
            tracing::info!("Running catalog search");
            commands::shop::run_shop(config, queries, hotels, json).await?;
            Ok(())
        }
    }
}
