//! Pipeline scheduler

use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::worker::Worker;
use crate::config::EngineConfig;
use crate::datablocks::BlockRef;
use crate::errors::{ExecError, ExecResult};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry, MetricsSnapshot};
use crate::transforms::{Transform, TransformKind};

/// Lifecycle state of one transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformState {
    Created,
    Running,
    Finished,
    Failed,
    Cancelled,
}

impl TransformState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformState::Created => "created",
            TransformState::Running => "running",
            TransformState::Finished => "finished",
            TransformState::Failed => "failed",
            TransformState::Cancelled => "cancelled",
        }
    }

    fn from_result(result: &ExecResult<()>) -> Self {
        match result {
            Ok(()) => TransformState::Finished,
            Err(e) if e.is_cancelled() => TransformState::Cancelled,
            Err(_) => TransformState::Failed,
        }
    }
}

impl fmt::Display for TransformState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// First-outcome-wins error slot shared by every task.
///
/// Holds either the first failure or `Cancelled`, whichever was observed
/// first.
#[derive(Debug, Default)]
struct FailureRegister {
    first: Mutex<Option<ExecError>>,
}

impl FailureRegister {
    /// Records `err` unless an outcome is already held
    fn record(&self, err: ExecError) -> bool {
        let mut first = self.first.lock().unwrap_or_else(|e| e.into_inner());
        if first.is_some() {
            return false;
        }
        *first = Some(err);
        true
    }

    fn take(&self) -> Option<ExecError> {
        self.first.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

struct Running {
    tasks: JoinSet<(usize, ExecResult<()>)>,
    results: mpsc::Receiver<BlockRef>,
}

/// A DAG of transforms executed concurrently.
///
/// Transforms are wired with `transforms::connect` before being added.
/// `run` spawns one task per transform on the current tokio runtime and
/// `wait` delivers the sink's blocks to a callback until the stream ends.
pub struct Pipeline {
    id: Uuid,
    transforms: Vec<Box<dyn Transform>>,
    names: Vec<String>,
    states: Vec<TransformState>,
    cancel: CancellationToken,
    failure: Arc<FailureRegister>,
    metrics: Arc<MetricsRegistry>,
    result_capacity: usize,
    running: Option<Running>,
    started: bool,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Creates a pipeline cancelled whenever `parent` is
    pub fn with_parent(parent: &CancellationToken) -> Self {
        Self::with_token(parent.child_token())
    }

    fn with_token(cancel: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            transforms: Vec::new(),
            names: Vec::new(),
            states: Vec::new(),
            cancel,
            failure: Arc::new(FailureRegister::default()),
            metrics: Arc::new(MetricsRegistry::new()),
            result_capacity: EngineConfig::default().port_capacity,
            running: None,
            started: false,
        }
    }

    /// Shares a metrics registry, e.g. with the executors that built the plan
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Capacity of the channel between the sink and the consumer
    pub fn with_result_capacity(mut self, capacity: usize) -> Self {
        self.result_capacity = capacity.max(1);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Registers a transform. Insertion order is not execution order.
    pub fn add(&mut self, transform: Box<dyn Transform>) -> usize {
        self.names.push(transform.name().to_string());
        self.states.push(TransformState::Created);
        self.transforms.push(transform);
        self.transforms.len() - 1
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Handle for cancelling the pipeline from outside
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Requests cancellation. Irreversible.
    pub fn cancel(&self) {
        self.failure.record(ExecError::Cancelled);
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Per-transform states, in insertion order
    pub fn states(&self) -> Vec<(&str, TransformState)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.states.iter().copied())
            .collect()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Checks the wiring and returns the index of the sink
    fn validate(&self) -> ExecResult<usize> {
        if self.transforms.is_empty() {
            return Err(ExecError::plan_compilation("pipeline has no transforms"));
        }

        let sinks: Vec<usize> = self
            .transforms
            .iter()
            .enumerate()
            .filter(|(_, t)| t.kind() == TransformKind::Sink)
            .map(|(i, _)| i)
            .collect();
        let sink = match sinks.as_slice() {
            [sink] => *sink,
            _ => {
                return Err(ExecError::plan_compilation(format!(
                    "pipeline needs exactly one sink, found {}",
                    sinks.len()
                )))
            }
        };

        for transform in &self.transforms {
            let ports = transform.ports();
            match transform.kind() {
                TransformKind::Source if !ports.inputs.is_empty() => {
                    return Err(ExecError::plan_compilation(format!(
                        "source {} must not have inputs",
                        transform.name()
                    )));
                }
                TransformKind::Source => {}
                _ if ports.inputs.is_empty() => {
                    return Err(ExecError::plan_compilation(format!(
                        "{} has no input",
                        transform.name()
                    )));
                }
                _ => {}
            }
            match transform.kind() {
                TransformKind::Sink if ports.output.is_connected() => {
                    return Err(ExecError::plan_compilation(format!(
                        "sink {} must not feed another transform",
                        transform.name()
                    )));
                }
                TransformKind::Sink => {}
                _ if !ports.output.is_connected() => {
                    return Err(ExecError::plan_compilation(format!(
                        "output of {} is not connected",
                        transform.name()
                    )));
                }
                _ => {}
            }
        }
        Ok(sink)
    }

    /// Validates the DAG and starts every transform as its own task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run(&mut self) -> ExecResult<()> {
        if self.started {
            return Err(ExecError::execution("pipeline already started"));
        }
        let sink = self.validate()?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(ExecError::execution("pipeline must run inside a tokio runtime"));
        }
        self.started = true;

        let (tx, results) = mpsc::channel(self.result_capacity);
        self.transforms[sink].ports_mut().output.attach(tx);

        let pipeline_id = self.id.to_string();
        let count = self.transforms.len().to_string();
        log_event_with_fields(
            Event::PipelineStart,
            &[("pipeline_id", pipeline_id.as_str()), ("transforms", count.as_str())],
        );

        let mut tasks = JoinSet::new();
        for (index, transform) in self.transforms.drain(..).enumerate() {
            let name = transform.name().to_string();
            let worker = Worker::new(transform, self.cancel.clone(), Arc::clone(&self.metrics));
            let cancel = self.cancel.clone();
            let failure = Arc::clone(&self.failure);

            tasks.spawn(async move {
                log_event_with_fields(Event::TransformStart, &[("transform", name.as_str())]);
                let result = worker.run().await.map_err(|e| e.in_stage(name.as_str()));
                match &result {
                    Ok(()) => {
                        log_event_with_fields(Event::TransformFinish, &[("transform", name.as_str())])
                    }
                    Err(e) if e.is_cancelled() => {
                        failure.record(ExecError::Cancelled);
                        log_event_with_fields(
                            Event::TransformCancelled,
                            &[("transform", name.as_str())],
                        )
                    }
                    Err(e) => {
                        // a failure raised after cancellation does not replace it
                        if cancel.is_cancelled() {
                            failure.record(ExecError::Cancelled);
                        }
                        let message = e.to_string();
                        log_event_with_fields(
                            Event::TransformFailed,
                            &[
                                ("code", e.code()),
                                ("error", message.as_str()),
                                ("transform", name.as_str()),
                            ],
                        );
                        failure.record(e.clone());
                        cancel.cancel();
                    }
                }
                (index, result)
            });
            self.states[index] = TransformState::Running;
        }

        self.running = Some(Running { tasks, results });
        Ok(())
    }

    /// Delivers every block reaching the sink to `callback`, in emission
    /// order, then joins every transform task.
    ///
    /// Returns whichever was observed first: a failure or `Cancelled`.
    /// No callback runs after cancellation is observed.
    pub async fn wait<F>(&mut self, mut callback: F) -> ExecResult<()>
    where
        F: FnMut(&BlockRef) -> ExecResult<()>,
    {
        let Some(Running { mut tasks, mut results }) = self.running.take() else {
            return Err(ExecError::execution("pipeline is not running"));
        };

        loop {
            let block = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.failure.record(ExecError::Cancelled);
                    break;
                }
                block = results.recv() => block,
            };
            let Some(block) = block else {
                break;
            };
            if self.cancel.is_cancelled() {
                self.failure.record(ExecError::Cancelled);
                break;
            }
            self.metrics.increment_blocks_delivered();
            if let Err(e) = callback(&block) {
                self.failure.record(e.in_stage("consumer"));
                self.cancel.cancel();
                break;
            }
        }
        drop(results);

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => self.states[index] = TransformState::from_result(&result),
                Err(e) => {
                    self.failure
                        .record(ExecError::execution(format!("transform task aborted: {}", e)));
                    self.cancel.cancel();
                }
            }
        }
        for state in &mut self.states {
            if *state == TransformState::Running {
                *state = TransformState::Failed;
            }
        }

        let outcome = match self.failure.take() {
            Some(err) => Err(err),
            None if self.cancel.is_cancelled() => Err(ExecError::Cancelled),
            None => Ok(()),
        };
        self.log_outcome(&outcome);
        outcome
    }

    /// Runs `wait` and gathers every delivered block
    pub async fn collect(&mut self) -> ExecResult<Vec<BlockRef>> {
        let mut blocks = Vec::new();
        self.wait(|block| {
            blocks.push(Arc::clone(block));
            Ok(())
        })
        .await?;
        Ok(blocks)
    }

    fn log_outcome(&self, outcome: &ExecResult<()>) {
        let pipeline_id = self.id.to_string();
        match outcome {
            Ok(()) => {
                self.metrics.increment_completed();
                log_event_with_fields(
                    Event::PipelineComplete,
                    &[("pipeline_id", pipeline_id.as_str())],
                );
            }
            Err(e) if e.is_cancelled() => {
                self.metrics.increment_cancelled();
                log_event_with_fields(
                    Event::PipelineCancelled,
                    &[("pipeline_id", pipeline_id.as_str())],
                );
            }
            Err(e) => {
                self.metrics.increment_failed();
                let message = e.to_string();
                log_event_with_fields(
                    Event::PipelineFailed,
                    &[
                        ("code", e.code()),
                        ("error", message.as_str()),
                        ("pipeline_id", pipeline_id.as_str()),
                        ("stage", e.stage().unwrap_or("")),
                    ],
                );
            }
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("transforms", &self.names)
            .field("states", &self.states)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datablocks::{ColumnDescriptor, DataBlock};
    use crate::datatypes::{DataType, DataValue};
    use crate::errors::ErrorKind;
    use crate::transforms::{connect, DataSourceTransform, SinkTransform};

    fn ints(values: &[i64]) -> DataBlock {
        let schema = [ColumnDescriptor::new("v", DataType::Int64)];
        let rows = values.iter().map(|&v| vec![DataValue::Int(v)]).collect();
        DataBlock::from_rows(&schema, rows).unwrap()
    }

    #[test]
    fn test_failure_register_keeps_first() {
        let register = FailureRegister::default();
        assert!(register.record(ExecError::execution("first")));
        assert!(!register.record(ExecError::execution("second")));
        assert!(!register.record(ExecError::Cancelled));
        assert_eq!(register.take(), Some(ExecError::execution("first")));
    }

    #[test]
    fn test_failure_register_cancellation_first() {
        let register = FailureRegister::default();
        assert!(register.record(ExecError::Cancelled));
        assert!(!register.record(ExecError::execution("late")));
        assert_eq!(register.take(), Some(ExecError::Cancelled));
    }

    #[tokio::test]
    async fn test_source_to_sink() {
        let mut source = DataSourceTransform::from_blocks(vec![ints(&[1, 2]), ints(&[3])]);
        let mut sink = SinkTransform::default();
        connect(&mut source, &mut sink, 2);

        let mut pipeline = Pipeline::new();
        pipeline.add(Box::new(source));
        pipeline.add(Box::new(sink));
        pipeline.run().unwrap();

        let blocks = pipeline.collect().await.unwrap();
        let rows: usize = blocks.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 3);
        assert!(pipeline
            .states()
            .iter()
            .all(|(_, state)| *state == TransformState::Finished));
        assert_eq!(pipeline.metrics().pipelines_completed, 1);
    }

    #[test]
    fn test_run_requires_sink() {
        let mut source = DataSourceTransform::from_blocks(Vec::new());
        let mut other = DataSourceTransform::from_blocks(Vec::new());
        connect(&mut source, &mut other, 1);

        let mut pipeline = Pipeline::new();
        pipeline.add(Box::new(source));
        let err = pipeline.run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PlanCompilation);
    }

    #[test]
    fn test_run_rejects_dangling_output() {
        let source = DataSourceTransform::from_blocks(Vec::new());
        let mut pipeline = Pipeline::new();
        pipeline.add(Box::new(source));
        pipeline.add(Box::new(SinkTransform::default()));

        let err = pipeline.run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PlanCompilation);
    }

    #[tokio::test]
    async fn test_wait_before_run() {
        let mut pipeline = Pipeline::new();
        let err = pipeline.wait(|_| Ok(())).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
    }
}
