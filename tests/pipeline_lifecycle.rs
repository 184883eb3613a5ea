//! Pipeline scheduling tests
//!
//! Test Categories:
//! 1. Cancellation (explicit, parent token, mid-buffering)
//! 2. Failure propagation and consumer errors
//! 3. Fan-in / fan-out wiring
//! 4. Early termination (limit) and projection
//! 5. Metrics and per-transform states

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use vectorpipe::datablocks::{BlockRef, ColumnDescriptor, DataBlock};
use vectorpipe::datatypes::{DataType, DataValue};
use vectorpipe::errors::{ErrorKind, ExecError, ExecResult};
use vectorpipe::executor::{build_pipeline, ExecutorContext};
use vectorpipe::pipeline::{Pipeline, TransformState};
use vectorpipe::planner::{OrderPlan, PlanNode};
use vectorpipe::transforms::{
    connect, BlockInputStream, DataSourceTransform, MergeTransform, OrderByTransform,
    ProjectionTransform, SinkTransform, SortKey, Transform, TransformKind, TransformPorts,
};

fn ints(values: impl IntoIterator<Item = i64>) -> DataBlock {
    let schema = [ColumnDescriptor::new("v", DataType::Int64)];
    let rows = values.into_iter().map(|v| vec![DataValue::Int(v)]).collect();
    DataBlock::from_rows(&schema, rows).unwrap()
}

fn values(blocks: &[BlockRef]) -> Vec<i64> {
    blocks
        .iter()
        .flat_map(|b| b.rows())
        .filter_map(|r| r[0].as_i64())
        .collect()
}

/// Emits `total` one-row blocks and cancels `token` after `cancel_after`
struct CancellingStream {
    emitted: i64,
    total: i64,
    cancel_after: i64,
    token: CancellationToken,
}

impl BlockInputStream for CancellingStream {
    fn name(&self) -> &str {
        "CancellingStream"
    }

    fn read(&mut self) -> ExecResult<Option<DataBlock>> {
        if self.emitted == self.cancel_after {
            self.token.cancel();
        }
        if self.emitted == self.total {
            return Ok(None);
        }
        self.emitted += 1;
        Ok(Some(ints([self.emitted])))
    }
}

/// Fails on the n-th read
struct FailingStream {
    reads: usize,
    fail_at: usize,
}

impl BlockInputStream for FailingStream {
    fn name(&self) -> &str {
        "FailingStream"
    }

    fn read(&mut self) -> ExecResult<Option<DataBlock>> {
        self.reads += 1;
        if self.reads == self.fail_at {
            return Err(ExecError::execution("disk went away"));
        }
        Ok(Some(ints([self.reads as i64])))
    }
}

/// Cancels `token` on its first read, then fails that same read
struct CancelThenFailStream {
    token: CancellationToken,
}

impl BlockInputStream for CancelThenFailStream {
    fn name(&self) -> &str {
        "CancelThenFailStream"
    }

    fn read(&mut self) -> ExecResult<Option<DataBlock>> {
        self.token.cancel();
        Err(ExecError::execution("read interrupted"))
    }
}

/// Materializing stage whose drain blocks its thread until released
struct GatedDrain {
    ports: TransformPorts,
    gate: std_mpsc::Receiver<()>,
    drained: bool,
}

impl Transform for GatedDrain {
    fn name(&self) -> &str {
        "GatedDrain"
    }

    fn kind(&self) -> TransformKind {
        TransformKind::Materializing
    }

    fn ports(&self) -> &TransformPorts {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut TransformPorts {
        &mut self.ports
    }

    fn consume(&mut self, _block: BlockRef) -> ExecResult<Vec<BlockRef>> {
        Ok(Vec::new())
    }

    fn blocking_drain(&self) -> bool {
        !self.drained
    }

    fn drain(&mut self) -> ExecResult<Option<BlockRef>> {
        let _ = self.gate.recv();
        self.drained = true;
        Ok(None)
    }
}

fn sorted_pipeline(source: DataSourceTransform, pipeline: &mut Pipeline) {
    let mut source = source;
    let mut sort = OrderByTransform::new(vec![SortKey::asc("v")], 16);
    let mut sink = SinkTransform::default();
    connect(&mut source, &mut sort, 2);
    connect(&mut sort, &mut sink, 2);
    pipeline.add(Box::new(sink));
    pipeline.add(Box::new(sort));
    pipeline.add(Box::new(source));
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_cancel_while_buffering() {
    let mut pipeline = Pipeline::new();
    let stream = CancellingStream {
        emitted: 0,
        total: 1000,
        cancel_after: 5,
        token: pipeline.cancel_token(),
    };
    sorted_pipeline(DataSourceTransform::new(stream), &mut pipeline);
    pipeline.run().unwrap();

    let calls = AtomicUsize::new(0);
    let err = pipeline
        .wait(|_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap_err();

    assert_eq!(err, ExecError::Cancelled);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(pipeline
        .states()
        .iter()
        .all(|(_, state)| *state != TransformState::Running));
    assert_eq!(pipeline.metrics().pipelines_cancelled, 1);
}

#[tokio::test]
async fn test_parent_token_cancels_pipeline() {
    let parent = CancellationToken::new();
    let mut pipeline = Pipeline::with_parent(&parent);
    let stream = CancellingStream {
        emitted: 0,
        total: 1000,
        cancel_after: 3,
        token: parent.clone(),
    };
    sorted_pipeline(DataSourceTransform::new(stream), &mut pipeline);
    pipeline.run().unwrap();

    let err = pipeline.collect().await.unwrap_err();
    assert!(err.is_cancelled());
    assert!(pipeline.is_cancelled());
}

#[tokio::test]
async fn test_cancel_before_wait() {
    let mut pipeline = Pipeline::new();
    sorted_pipeline(DataSourceTransform::from_blocks(vec![ints(0..10)]), &mut pipeline);
    pipeline.run().unwrap();
    pipeline.cancel();

    let err = pipeline.collect().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[tokio::test]
async fn test_failure_after_cancel_reports_cancelled() {
    let mut pipeline = Pipeline::new();
    let stream = CancelThenFailStream {
        token: pipeline.cancel_token(),
    };
    sorted_pipeline(DataSourceTransform::new(stream), &mut pipeline);
    pipeline.run().unwrap();

    let err = pipeline.collect().await.unwrap_err();
    assert_eq!(err, ExecError::Cancelled);
    assert_eq!(pipeline.metrics().pipelines_cancelled, 1);
}

#[tokio::test]
async fn test_failure_after_parent_cancel_reports_cancelled() {
    let parent = CancellationToken::new();
    let mut pipeline = Pipeline::with_parent(&parent);
    let stream = CancelThenFailStream {
        token: parent.clone(),
    };
    sorted_pipeline(DataSourceTransform::new(stream), &mut pipeline);
    pipeline.run().unwrap();

    assert_eq!(pipeline.collect().await.unwrap_err(), ExecError::Cancelled);
}

#[tokio::test]
async fn test_cancel_during_blocking_drain() {
    let (release, gate) = std_mpsc::channel();
    let mut source = DataSourceTransform::from_blocks(vec![ints([1])]);
    let mut gated = GatedDrain {
        ports: TransformPorts::new(),
        gate,
        drained: false,
    };
    let mut sink = SinkTransform::default();
    connect(&mut source, &mut gated, 1);
    connect(&mut gated, &mut sink, 1);

    let mut pipeline = Pipeline::new();
    pipeline.add(Box::new(source));
    pipeline.add(Box::new(gated));
    pipeline.add(Box::new(sink));
    pipeline.run().unwrap();

    let token = pipeline.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    // the drain is still parked on its gate when wait returns
    let err = pipeline.collect().await.unwrap_err();
    assert_eq!(err, ExecError::Cancelled);
    assert!(pipeline.states().contains(&("GatedDrain", TransformState::Cancelled)));
    release.send(()).unwrap();
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_source_failure_names_stage() {
    let mut pipeline = Pipeline::new();
    let source = DataSourceTransform::new(FailingStream { reads: 0, fail_at: 4 }).with_name("scan");
    sorted_pipeline(source, &mut pipeline);
    pipeline.run().unwrap();

    let err = pipeline.collect().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert_eq!(err.stage(), Some("scan"));
    assert_eq!(err.to_string(), "[scan] Execution failed: disk went away");

    let states = pipeline.states();
    assert!(states.contains(&("scan", TransformState::Failed)));
    assert_eq!(pipeline.metrics().pipelines_failed, 1);
}

#[tokio::test]
async fn test_consumer_failure_stops_pipeline() {
    let mut source = DataSourceTransform::from_blocks((0..50).map(|i| ints([i])).collect());
    let mut sink = SinkTransform::default();
    connect(&mut source, &mut sink, 1);

    let mut pipeline = Pipeline::new();
    pipeline.add(Box::new(source));
    pipeline.add(Box::new(sink));
    pipeline.run().unwrap();

    let mut calls = 0;
    let err = pipeline
        .wait(|_| {
            calls += 1;
            if calls == 2 {
                Err(ExecError::execution("consumer full"))
            } else {
                Ok(())
            }
        })
        .await
        .unwrap_err();

    assert_eq!(calls, 2);
    assert_eq!(err.stage(), Some("consumer"));
    assert!(pipeline.is_cancelled());
}

#[tokio::test]
async fn test_run_twice_rejected() {
    let mut pipeline = Pipeline::new();
    sorted_pipeline(DataSourceTransform::from_blocks(Vec::new()), &mut pipeline);
    pipeline.run().unwrap();
    assert_eq!(pipeline.run().unwrap_err().kind(), ErrorKind::Execution);
    pipeline.collect().await.unwrap();
}

// =============================================================================
// Fan-in / fan-out
// =============================================================================

#[tokio::test]
async fn test_merge_keeps_branch_order() {
    let mut left = DataSourceTransform::from_blocks(vec![ints([1]), ints([2]), ints([3])]);
    let mut right = DataSourceTransform::from_blocks(vec![ints([10]), ints([20])]);
    let mut merge = MergeTransform::new();
    let mut sink = SinkTransform::default();
    connect(&mut left, &mut merge, 8);
    connect(&mut right, &mut merge, 8);
    connect(&mut merge, &mut sink, 8);

    let mut pipeline = Pipeline::new();
    pipeline.add(Box::new(left));
    pipeline.add(Box::new(right));
    pipeline.add(Box::new(merge));
    pipeline.add(Box::new(sink));
    pipeline.run().unwrap();

    let seen = values(&pipeline.collect().await.unwrap());
    let small: Vec<i64> = seen.iter().copied().filter(|v| *v < 10).collect();
    let large: Vec<i64> = seen.iter().copied().filter(|v| *v >= 10).collect();
    assert_eq!(small, vec![1, 2, 3]);
    assert_eq!(large, vec![10, 20]);
}

#[tokio::test]
async fn test_diamond_with_sort_branch_completes() {
    // one source feeds a sort and a streaming branch that merge again;
    // the merge must not wait on the sort while the other branch is full
    let mut source = DataSourceTransform::from_blocks((0..20).map(|i| ints([i])).collect());
    let mut sort = OrderByTransform::new(vec![SortKey::desc("v")], 16);
    let mut project = ProjectionTransform::new(vec!["v".to_string()]);
    let mut merge = MergeTransform::new();
    let mut sink = SinkTransform::default();
    connect(&mut source, &mut sort, 1);
    connect(&mut source, &mut project, 1);
    connect(&mut sort, &mut merge, 1);
    connect(&mut project, &mut merge, 1);
    connect(&mut merge, &mut sink, 1);

    let mut pipeline = Pipeline::new().with_result_capacity(1);
    pipeline.add(Box::new(source));
    pipeline.add(Box::new(sort));
    pipeline.add(Box::new(project));
    pipeline.add(Box::new(merge));
    pipeline.add(Box::new(sink));
    pipeline.run().unwrap();

    let blocks = tokio::time::timeout(Duration::from_secs(5), pipeline.collect())
        .await
        .expect("pipeline stalled")
        .unwrap();
    let mut seen = values(&blocks);
    assert_eq!(seen.len(), 40);
    seen.sort_unstable();
    let expected: Vec<i64> = (0..20).flat_map(|i| [i, i]).collect();
    assert_eq!(seen, expected);
    assert!(pipeline
        .states()
        .iter()
        .all(|(_, state)| *state == TransformState::Finished));
}

#[tokio::test]
async fn test_sort_over_merged_branches() {
    let mut left = DataSourceTransform::from_blocks(vec![ints([5, 1]), ints([9])]);
    let mut right = DataSourceTransform::from_blocks(vec![ints([4, 8])]);
    let mut sort = OrderByTransform::new(vec![SortKey::desc("v")], 2);
    let mut sink = SinkTransform::default();
    connect(&mut left, &mut sort, 2);
    connect(&mut right, &mut sort, 2);
    connect(&mut sort, &mut sink, 2);

    let mut pipeline = Pipeline::new();
    pipeline.add(Box::new(left));
    pipeline.add(Box::new(right));
    pipeline.add(Box::new(sort));
    pipeline.add(Box::new(sink));
    pipeline.run().unwrap();

    let blocks = pipeline.collect().await.unwrap();
    assert_eq!(values(&blocks), vec![9, 8, 5, 4, 1]);
    assert!(blocks.iter().all(|b| b.num_rows() <= 2));
}

#[tokio::test]
async fn test_fan_out_feeds_every_consumer() {
    let mut source = DataSourceTransform::from_blocks(vec![ints([1, 2]), ints([3])]);
    let mut merge = MergeTransform::new();
    let mut sink = SinkTransform::default();
    connect(&mut source, &mut merge, 4);
    connect(&mut source, &mut merge, 4);
    connect(&mut merge, &mut sink, 4);

    let mut pipeline = Pipeline::new();
    pipeline.add(Box::new(source));
    pipeline.add(Box::new(merge));
    pipeline.add(Box::new(sink));
    pipeline.run().unwrap();

    let mut seen = values(&pipeline.collect().await.unwrap());
    seen.sort_unstable();
    assert_eq!(seen, vec![1, 1, 2, 2, 3, 3]);
}

// =============================================================================
// Limit and projection
// =============================================================================

#[tokio::test]
async fn test_limit_stops_early() {
    let ctx = ExecutorContext::default();
    let source = DataSourceTransform::from_blocks((0..100).map(|i| ints([i])).collect());
    let mut compiled = build_pipeline(&ctx, Box::new(source), &[PlanNode::limit(2, 3)]).unwrap();
    compiled.pipeline.run().unwrap();

    let blocks = compiled.pipeline.collect().await.unwrap();
    assert_eq!(values(&blocks), vec![2, 3, 4]);
    assert!(compiled
        .pipeline
        .states()
        .iter()
        .all(|(_, state)| *state == TransformState::Finished));
}

#[tokio::test]
async fn test_sort_limit_project_chain() {
    let schema = [
        ColumnDescriptor::new("name", DataType::String),
        ColumnDescriptor::new("age", DataType::Int32),
    ];
    let rows = vec![
        vec![DataValue::from("x"), DataValue::Int(11)],
        vec![DataValue::from("z"), DataValue::Int(13)],
        vec![DataValue::from("y"), DataValue::Int(12)],
        vec![DataValue::from("y"), DataValue::Int(13)],
    ];
    let source = DataSourceTransform::from_blocks(vec![DataBlock::from_rows(&schema, rows).unwrap()]);

    let plans = [
        PlanNode::order_by(vec![OrderPlan::asc("name"), OrderPlan::desc("age")]),
        PlanNode::limit(1, 2),
        PlanNode::projection(["age"]),
    ];
    let ctx = ExecutorContext::default();
    let mut compiled = build_pipeline(&ctx, Box::new(source), &plans).unwrap();
    assert_eq!(
        compiled.description(),
        "-> OrderByExecutor\n    -> OrderByNode [(field:name, direction:asc)(field:age, direction:desc)]\n\
         -> LimitExecutor\n    -> LimitNode [offset:1, limit:2]\n\
         -> ProjectionExecutor\n    -> ProjectionNode [age]"
    );

    compiled.pipeline.run().unwrap();
    let blocks = compiled.pipeline.collect().await.unwrap();
    assert_eq!(values(&blocks), vec![13, 12]);
    assert_eq!(blocks[0].num_columns(), 1);
}

// =============================================================================
// Metrics
// =============================================================================

#[tokio::test]
async fn test_metrics_shared_with_context() {
    let ctx = ExecutorContext::default();
    let source = DataSourceTransform::from_blocks(vec![ints([3, 1]), ints([2])]);
    let plans = [PlanNode::order_by(vec![OrderPlan::asc("v")])];
    let mut compiled = build_pipeline(&ctx, Box::new(source), &plans).unwrap();
    compiled.pipeline.run().unwrap();
    compiled.pipeline.collect().await.unwrap();

    let snapshot = ctx.metrics.snapshot();
    assert_eq!(snapshot.rows_sorted, 3);
    assert_eq!(snapshot.blocks_delivered, 1);
    assert_eq!(snapshot.pipelines_completed, 1);
    assert_eq!(snapshot, compiled.pipeline.metrics());
}

#[tokio::test]
async fn test_concurrent_pipelines_independent() {
    let mut handles = Vec::new();
    for i in 0..4i64 {
        handles.push(tokio::spawn(async move {
            let mut pipeline = Pipeline::new();
            sorted_pipeline(
                DataSourceTransform::from_blocks(vec![ints([i + 2, i, i + 1])]),
                &mut pipeline,
            );
            pipeline.run()?;
            let blocks = pipeline.collect().await?;
            Ok::<_, ExecError>(values(&blocks))
        }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        let i = i as i64;
        assert_eq!(handle.await.unwrap().unwrap(), vec![i, i + 1, i + 2]);
    }
}

#[test]
fn test_states_created_before_run() {
    let mut pipeline = Pipeline::new();
    sorted_pipeline(DataSourceTransform::from_blocks(Vec::new()), &mut pipeline);
    assert_eq!(pipeline.len(), 3);
    assert!(pipeline
        .states()
        .iter()
        .all(|(_, state)| *state == TransformState::Created));
}
