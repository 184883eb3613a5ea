//! CLI command implementations

use std::io::{self, Write};
use std::path::Path;

use crate::config::EngineConfig;
use crate::errors::ExecError;
use crate::executor::{build_pipeline, executor_for, ExecutorContext};
use crate::observability::{LogTarget, Logger};
use crate::planner::{OrderPlan, PlanNode, SortDirection};
use crate::transforms::DataSourceTransform;

use super::args::{Command, PlanArgs};
use super::errors::{CliError, CliResult};
use super::io::{read_table, write_block};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Run {
            input,
            plan,
            config,
        } => run_query(&input, &plan, config.as_deref()),
        Command::Explain { plan, config } => explain(&plan, config.as_deref()),
    }
}

/// Loads the engine configuration and applies its log level.
///
/// Log events move to stderr; stdout carries command output only.
pub fn load_config(path: Option<&Path>) -> CliResult<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    Logger::set_min_severity(config.severity()?);
    Logger::set_target(LogTarget::Stderr);
    Ok(config)
}

/// Parses `name:asc,age:desc`. A key without a direction sorts ascending.
pub fn parse_order_by(spec: &str) -> CliResult<Vec<OrderPlan>> {
    spec.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| {
            let (field, direction) = match key.split_once(':') {
                Some((field, dir)) => {
                    let direction = SortDirection::parse(dir.trim()).ok_or_else(|| {
                        CliError::invalid_argument(format!("unknown sort direction '{}'", dir))
                    })?;
                    (field.trim(), direction)
                }
                None => (key, SortDirection::Asc),
            };
            if field.is_empty() {
                return Err(CliError::invalid_argument(format!(
                    "missing column in sort key '{}'",
                    key
                )));
            }
            Ok(OrderPlan::new(PlanNode::variable(field), direction))
        })
        .collect()
}

/// Turns the query clauses into plan nodes: sort, then limit, then projection
pub fn build_plans(args: &PlanArgs) -> CliResult<Vec<PlanNode>> {
    let mut plans = Vec::new();

    if let Some(spec) = &args.order_by {
        let orders = parse_order_by(spec)?;
        if orders.is_empty() {
            return Err(CliError::invalid_argument("--order-by names no columns"));
        }
        plans.push(PlanNode::order_by(orders));
    }

    if args.limit.is_some() || args.offset.is_some() {
        plans.push(PlanNode::limit(
            args.offset.unwrap_or(0),
            args.limit.unwrap_or(u64::MAX),
        ));
    }

    if let Some(columns) = &args.project {
        let columns: Vec<&str> = columns
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();
        if columns.is_empty() {
            return Err(CliError::invalid_argument("--project names no columns"));
        }
        plans.push(PlanNode::projection(columns));
    }

    Ok(plans)
}

/// Runs a query over a table file, printing result rows as JSON lines
pub fn run_query(input: &Path, args: &PlanArgs, config_path: Option<&Path>) -> CliResult<()> {
    run_query_into(input, args, config_path, &mut io::stdout())
}

/// Runs a query over a table file, writing result rows to `out`
pub fn run_query_into<W: Write>(
    input: &Path,
    args: &PlanArgs,
    config_path: Option<&Path>,
    out: &mut W,
) -> CliResult<()> {
    let config = load_config(config_path)?;
    let plans = build_plans(args)?;
    let blocks = read_table(input, config.max_block_rows)?;

    let ctx = ExecutorContext::new(config);
    let source = DataSourceTransform::from_blocks(blocks).with_name("TableSource");
    let mut compiled = build_pipeline(&ctx, Box::new(source), &plans)?;

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::io_error(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        let token = ctx.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        });

        compiled.pipeline.run()?;
        compiled
            .pipeline
            .wait(|block| {
                write_block(&mut *out, block).map_err(|e| ExecError::execution(e.to_string()))
            })
            .await
    })?;

    Ok(())
}

/// Prints the executor description of every plan node
pub fn explain(args: &PlanArgs, config_path: Option<&Path>) -> CliResult<()> {
    let config = load_config(config_path)?;
    let plans = build_plans(args)?;
    if plans.is_empty() {
        return Err(CliError::invalid_argument("nothing to explain"));
    }

    let ctx = ExecutorContext::new(config);
    for plan in &plans {
        println!("{}", executor_for(&ctx, plan)?);
    }
    Ok(())
}
