//! Per-transform driver loop

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::datablocks::BlockRef;
use crate::errors::{ExecError, ExecResult};
use crate::observability::{Event, Logger, MetricsRegistry};
use crate::transforms::{FanIn, OutputPort, Transform};

/// Drives one transform to completion on its own task
pub(crate) struct Worker {
    transform: Box<dyn Transform>,
    inputs: FanIn,
    output: OutputPort,
    cancel: CancellationToken,
    metrics: Arc<MetricsRegistry>,
}

impl Worker {
    pub(crate) fn new(
        mut transform: Box<dyn Transform>,
        cancel: CancellationToken,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let ports = transform.ports_mut().take();
        Self {
            transform,
            inputs: FanIn::new(ports.inputs),
            output: ports.output,
            cancel,
            metrics,
        }
    }

    /// Runs the consume phase, then the drain phase.
    ///
    /// Returns Ok early when every downstream consumer has hung up.
    pub(crate) async fn run(mut self) -> ExecResult<()> {
        while !self.transform.is_exhausted() {
            let Some(block) = self.inputs.pull(&self.cancel).await? else {
                break;
            };
            self.metrics.increment_blocks_in();
            for out in self.transform.consume(block)? {
                if !self.emit(out).await? {
                    return Ok(());
                }
            }
        }
        self.inputs.close();

        loop {
            if self.cancel.is_cancelled() {
                return Err(ExecError::Cancelled);
            }
            let next = if self.transform.blocking_drain() {
                let mut transform = self.transform;
                let job = tokio::task::spawn_blocking(move || {
                    let next = transform.drain();
                    (transform, next)
                });
                // on cancellation the job finishes alone and drops the transform
                let (transform, next) = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(ExecError::Cancelled),
                    joined = job => joined.map_err(|e| {
                        ExecError::execution(format!("blocking drain failed: {}", e))
                    })?,
                };
                self.transform = transform;
                next
            } else {
                self.transform.drain()
            };
            let Some(block) = next? else {
                break;
            };
            if !self.emit(block).await? {
                return Ok(());
            }
        }
        Ok(())
    }

    async fn emit(&mut self, block: BlockRef) -> ExecResult<bool> {
        let rows = block.num_rows();
        let live = self.output.push(block, &self.cancel).await?;
        if live {
            self.metrics.record_block_out(rows);
            if Logger::enabled(Event::BlockEmitted.severity()) {
                let rows = rows.to_string();
                Logger::log(
                    Event::BlockEmitted.severity(),
                    Event::BlockEmitted.as_str(),
                    &[("rows", rows.as_str()), ("transform", self.transform.name())],
                );
            }
        }
        Ok(live)
    }
}
