//! vectorpipe - a columnar, pipelined query execution core
//!
//! Data flows as immutable `DataBlock`s through a DAG of transforms, each
//! running as its own task and joined by bounded ports. Executors compile
//! logical plan nodes (ORDER BY, LIMIT, projection) into wired transforms.

pub mod cli;
pub mod config;
pub mod datablocks;
pub mod datatypes;
pub mod errors;
pub mod executor;
pub mod observability;
pub mod pipeline;
pub mod planner;
pub mod transforms;
