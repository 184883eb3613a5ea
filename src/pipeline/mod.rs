//! Pipeline execution
//!
//! A pipeline is a DAG of transforms joined by bounded ports. Each transform
//! runs as its own tokio task; there is no lockstep barrier between them.
//!
//! # Cancellation
//!
//! One `CancellationToken` per pipeline, optionally a child of a caller's
//! token. It is cancelled by the first failure, by `Pipeline::cancel`, or by
//! the parent. Cancellation is irreversible.
//!
//! # Failure
//!
//! The first non-cancellation error wins and is returned from `wait` once
//! every task has returned. Later errors are discarded.

mod pipeline;
mod worker;

pub use pipeline::{Pipeline, TransformState};
