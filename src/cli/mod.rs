//! CLI module for vectorpipe
//!
//! Provides command-line interface for:
//! - run: Execute a query over a JSON table file
//! - explain: Print executor descriptions for a query

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, PlanArgs};
pub use commands::{
    build_plans, explain, load_config, parse_order_by, run, run_command, run_query, run_query_into,
};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{block_to_json, parse_table, read_table, write_block};
