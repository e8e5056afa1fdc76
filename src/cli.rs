//! Command-line interface definition for Clonar
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to exercise each stage of the retrieval pipeline.

use clap::{Parser, Subcommand};

/// Clonar - query understanding and retrieval orchestration
///
/// Repair, plan and search multi-vertical assistant queries from the
/// command line.
#[derive(Parser, Debug, Clone)]
#[command(name = "clonar")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Clonar
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Repair typos and split words in a query
    Repair {
        /// Raw query text
        query: String,

        /// Domain hint for the repair prompt (movies, shopping, hotels, ...)
        #[arg(short, long, default_value = "general")]
        domain: String,
    },

    /// Build a retrieval plan for a query
    Plan {
        /// Raw query text
        query: String,

        /// Planning mode: quick (keyword rules) or deep (LLM)
        #[arg(short, long)]
        mode: Option<String>,

        /// Earlier user turns, oldest first
        #[arg(long)]
        history: Vec<String>,

        /// Skip the repair step
        #[arg(long)]
        no_repair: bool,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score candidate follow-up prompts for novelty
    Novelty {
        /// Candidate follow-ups
        #[arg(required = true)]
        candidates: Vec<String>,

        /// Follow-ups already shown to the user
        #[arg(short, long)]
        recent: Vec<String>,
    },

    /// Run the catalog search action for one or more sub-queries
    Shop {
        /// Sub-queries (at most 3)
        #[arg(required = true)]
        queries: Vec<String>,

        /// Search hotels instead of products
        #[arg(long)]
        hotels: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
