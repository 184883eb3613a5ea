//! CLI argument definitions using clap
//!
//! Commands:
//! - vectorpipe run <table.json> [--order-by ..] [--project ..] [--limit N] [--offset M]
//! - vectorpipe explain [--order-by ..] [--project ..] [--limit N] [--offset M]

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// vectorpipe - columnar query pipeline runner
#[derive(Parser, Debug)]
#[command(name = "vectorpipe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a query over a JSON table and print the rows as JSON lines
    Run {
        /// Table file: {"columns":[{"name":..,"type":..}],"rows":[[..]]}
        input: PathBuf,

        #[command(flatten)]
        plan: PlanArgs,

        /// Path to engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the executor descriptions for a query
    Explain {
        #[command(flatten)]
        plan: PlanArgs,

        /// Path to engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Query clauses shared by `run` and `explain`
#[derive(Args, Debug, Clone, Default)]
pub struct PlanArgs {
    /// Sort keys, e.g. name:asc,age:desc
    #[arg(long = "order-by")]
    pub order_by: Option<String>,

    /// Columns to keep, e.g. name,age
    #[arg(long)]
    pub project: Option<String>,

    /// Maximum number of rows
    #[arg(long)]
    pub limit: Option<u64>,

    /// Rows to skip
    #[arg(long)]
    pub offset: Option<u64>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
