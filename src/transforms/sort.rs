//! Multi-key ORDER BY transform
//!
//! Buffers its whole input, sorts it once, then drains the sorted rows in
//! blocks of at most `max_block_rows`.
//!
//! Ordering rules:
//! - Keys compare left to right; the first non-equal key decides
//! - A descending key reverses that key's comparison only
//! - Rows equal on every key keep their arrival order (stable)
//! - Nulls sort first under ascending keys

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use super::{Transform, TransformKind, TransformPorts};
use crate::datablocks::{BlockRef, ColumnDescriptor, DataBlock};
use crate::datatypes::CompareFn;
use crate::errors::{ExecError, ExecResult};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::planner::SortDirection;

/// A sort key resolved to a column name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    pub fn asc(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Asc)
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Desc)
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.column, self.direction)
    }
}

/// Lifecycle of an `OrderByTransform`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortPhase {
    Idle,
    Buffering,
    Sorting,
    Draining,
    Done,
}

/// Returns the row order of `block` under `keys`.
///
/// Every key value is checked against its column's comparator before
/// sorting starts, so the comparison closure itself never fails.
pub fn sort_indices(block: &DataBlock, keys: &[SortKey]) -> ExecResult<Vec<usize>> {
    let resolved = keys
        .iter()
        .map(|key| {
            let column = block.column_by_name(&key.column)?;
            let compare: CompareFn = column.data_type().comparator();
            for value in column.values() {
                compare(value, value).map_err(|e| {
                    ExecError::execution(format!("sort key {}: {}", key.column, e))
                })?;
            }
            Ok((column.values(), compare, key.direction))
        })
        .collect::<ExecResult<Vec<_>>>()?;

    let mut indices: Vec<usize> = (0..block.num_rows()).collect();
    // slice::sort_by is stable
    indices.sort_by(|&a, &b| {
        for (values, compare, direction) in &resolved {
            let ordering = compare(&values[a], &values[b]).unwrap_or(Ordering::Equal);
            let ordering = match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(indices)
}

/// Materializing transform implementing ORDER BY
pub struct OrderByTransform {
    name: String,
    ports: TransformPorts,
    keys: Vec<SortKey>,
    max_block_rows: usize,
    metrics: Option<Arc<MetricsRegistry>>,
    phase: SortPhase,
    schema: Option<Vec<ColumnDescriptor>>,
    buffered: Vec<BlockRef>,
    sorted: Option<DataBlock>,
    order: Vec<usize>,
    cursor: usize,
}

impl OrderByTransform {
    pub fn new(keys: Vec<SortKey>, max_block_rows: usize) -> Self {
        Self {
            name: "OrderByTransform".to_string(),
            ports: TransformPorts::new(),
            keys,
            max_block_rows: max_block_rows.max(1),
            metrics: None,
            phase: SortPhase::Idle,
            schema: None,
            buffered: Vec::new(),
            sorted: None,
            order: Vec::new(),
            cursor: 0,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn phase(&self) -> SortPhase {
        self.phase
    }

    /// Rows buffered so far
    pub fn buffered_rows(&self) -> usize {
        self.buffered.iter().map(|b| b.num_rows()).sum()
    }

    /// Fixes the schema and checks every key against it
    fn bind_schema(&mut self, block: &DataBlock) -> ExecResult<()> {
        match &self.schema {
            Some(schema) => block.check_schema(schema),
            None => {
                for key in &self.keys {
                    block.column_index(&key.column)?;
                }
                self.schema = Some(block.schema());
                Ok(())
            }
        }
    }

    fn sort_buffered(&mut self) -> ExecResult<()> {
        self.phase = SortPhase::Sorting;
        let rows = self.buffered_rows().to_string();
        log_event_with_fields(
            Event::SortBegin,
            &[("transform", self.name.as_str()), ("rows", rows.as_str())],
        );

        let block = DataBlock::concat(&self.buffered)?;
        self.buffered.clear();
        self.order = sort_indices(&block, &self.keys)?;
        self.cursor = 0;

        if let Some(metrics) = &self.metrics {
            metrics.add_rows_sorted(block.num_rows());
        }
        log_event_with_fields(
            Event::SortComplete,
            &[("transform", self.name.as_str()), ("rows", rows.as_str())],
        );

        self.sorted = Some(block);
        self.phase = SortPhase::Draining;
        Ok(())
    }
}

impl Transform for OrderByTransform {
    fn name(&self) -> &str {
        &self.name
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

    fn consume(&mut self, block: BlockRef) -> ExecResult<Vec<BlockRef>> {
        match self.phase {
            SortPhase::Idle | SortPhase::Buffering => {}
            phase => {
                return Err(ExecError::execution(format!(
                    "{} received input while {:?}",
                    self.name, phase
                )))
            }
        }
        self.bind_schema(&block)?;
        self.phase = SortPhase::Buffering;
        if !block.is_empty() {
            self.buffered.push(block);
        }
        Ok(Vec::new())
    }

    fn blocking_drain(&self) -> bool {
        matches!(self.phase, SortPhase::Idle | SortPhase::Buffering) && !self.buffered.is_empty()
    }

    fn drain(&mut self) -> ExecResult<Option<BlockRef>> {
        if matches!(self.phase, SortPhase::Idle | SortPhase::Buffering) {
            if self.buffered.is_empty() {
                self.phase = SortPhase::Done;
                return Ok(None);
            }
            self.sort_buffered()?;
        }

        let Some(sorted) = &self.sorted else {
            self.phase = SortPhase::Done;
            return Ok(None);
        };
        if self.cursor >= self.order.len() {
            self.sorted = None;
            self.order.clear();
            self.phase = SortPhase::Done;
            return Ok(None);
        }

        let end = (self.cursor + self.max_block_rows).min(self.order.len());
        let chunk = sorted.take(&self.order[self.cursor..end])?;
        self.cursor = end;
        Ok(Some(Arc::new(chunk)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{DataType, DataValue};
    use crate::errors::ErrorKind;

    fn schema() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("name", DataType::String),
            ColumnDescriptor::new("age", DataType::Int32),
        ]
    }

    fn row(name: &str, age: i64) -> Vec<DataValue> {
        vec![DataValue::from(name), DataValue::Int(age)]
    }

    fn block(rows: Vec<Vec<DataValue>>) -> BlockRef {
        Arc::new(DataBlock::from_rows(&schema(), rows).unwrap())
    }

    fn drain_all(sort: &mut OrderByTransform) -> Vec<Vec<DataValue>> {
        let mut rows = Vec::new();
        while let Some(b) = sort.drain().unwrap() {
            rows.extend(b.rows());
        }
        rows
    }

    #[test]
    fn test_name_asc_age_desc() {
        let mut sort = OrderByTransform::new(vec![SortKey::asc("name"), SortKey::desc("age")], 16);
        sort.consume(block(vec![row("x", 11), row("z", 13)])).unwrap();
        sort.consume(block(vec![row("y", 12), row("y", 13)])).unwrap();
        assert_eq!(sort.phase(), SortPhase::Buffering);
        assert_eq!(sort.buffered_rows(), 4);

        assert_eq!(
            drain_all(&mut sort),
            vec![row("x", 11), row("y", 13), row("y", 12), row("z", 13)]
        );
        assert_eq!(sort.phase(), SortPhase::Done);
    }

    #[test]
    fn test_only_the_sorting_drain_blocks() {
        let mut sort = OrderByTransform::new(vec![SortKey::asc("age")], 1);
        assert!(!sort.blocking_drain());

        sort.consume(block(vec![row("a", 2), row("b", 1)])).unwrap();
        assert!(sort.blocking_drain());

        sort.drain().unwrap();
        assert_eq!(sort.phase(), SortPhase::Draining);
        assert!(!sort.blocking_drain());
    }

    #[test]
    fn test_consume_emits_nothing() {
        let mut sort = OrderByTransform::new(vec![SortKey::asc("age")], 16);
        assert!(sort.consume(block(vec![row("a", 1)])).unwrap().is_empty());
    }

    #[test]
    fn test_ties_keep_arrival_order() {
        let mut sort = OrderByTransform::new(vec![SortKey::asc("age")], 16);
        sort.consume(block(vec![row("b", 5), row("a", 5)])).unwrap();
        sort.consume(block(vec![row("c", 1), row("d", 5)])).unwrap();

        assert_eq!(
            drain_all(&mut sort),
            vec![row("c", 1), row("b", 5), row("a", 5), row("d", 5)]
        );
    }

    #[test]
    fn test_output_chunked_by_max_rows() {
        let mut sort = OrderByTransform::new(vec![SortKey::desc("age")], 2);
        sort.consume(block((0..5).map(|i| row("n", i)).collect())).unwrap();

        let mut sizes = Vec::new();
        while let Some(b) = sort.drain().unwrap() {
            sizes.push(b.num_rows());
        }
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_empty_input_emits_nothing() {
        let mut sort = OrderByTransform::new(vec![SortKey::asc("age")], 16);
        assert!(sort.drain().unwrap().is_none());
        assert_eq!(sort.phase(), SortPhase::Done);

        let mut sort = OrderByTransform::new(vec![SortKey::asc("age")], 16);
        sort.consume(block(Vec::new())).unwrap();
        assert!(sort.drain().unwrap().is_none());
    }

    #[test]
    fn test_nulls_first() {
        let mut sort = OrderByTransform::new(vec![SortKey::asc("age")], 16);
        sort.consume(block(vec![
            row("a", 3),
            vec![DataValue::from("b"), DataValue::Null],
            row("c", 1),
        ]))
        .unwrap();

        let names: Vec<DataValue> = drain_all(&mut sort).into_iter().map(|r| r[0].clone()).collect();
        assert_eq!(
            names,
            vec![DataValue::from("b"), DataValue::from("c"), DataValue::from("a")]
        );
    }

    #[test]
    fn test_missing_key_column() {
        let mut sort = OrderByTransform::new(vec![SortKey::asc("salary")], 16);
        let err = sort.consume(block(vec![row("a", 1)])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ColumnNotFound);
    }

    #[test]
    fn test_schema_change_rejected() {
        let mut sort = OrderByTransform::new(vec![SortKey::asc("age")], 16);
        sort.consume(block(vec![row("a", 1)])).unwrap();

        let other = DataBlock::from_rows(
            &[ColumnDescriptor::new("age", DataType::Int32)],
            vec![vec![DataValue::Int(2)]],
        )
        .unwrap();
        let err = sort.consume(Arc::new(other)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    }

    #[test]
    fn test_incomparable_value_fails_sort() {
        let mut sort = OrderByTransform::new(vec![SortKey::asc("age")], 16);
        sort.consume(block(vec![row("a", 1), vec![DataValue::from("b"), DataValue::from("old")]]))
            .unwrap();

        let err = sort.drain().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
    }

    #[test]
    fn test_metrics_count_sorted_rows() {
        let metrics = Arc::new(MetricsRegistry::new());
        let mut sort =
            OrderByTransform::new(vec![SortKey::asc("age")], 16).with_metrics(Arc::clone(&metrics));
        sort.consume(block(vec![row("a", 2), row("b", 1)])).unwrap();
        drain_all(&mut sort);

        assert_eq!(metrics.snapshot().rows_sorted, 2);
    }
}
