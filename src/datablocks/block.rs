//! Immutable columnar data block

use std::collections::HashSet;
use std::sync::Arc;

use super::column::{Column, ColumnDescriptor};
use crate::datatypes::DataValue;
use crate::errors::{ExecError, ExecResult};

/// Shared handle to a published block
pub type BlockRef = Arc<DataBlock>;

/// An immutable batch of equally sized columns.
///
/// A block is never mutated after construction; every operation that changes
/// content returns a new block.
#[derive(Debug, Clone, PartialEq)]
pub struct DataBlock {
    columns: Vec<Column>,
    num_rows: usize,
}

impl DataBlock {
    /// Creates a block, validating equal column lengths and unique names
    pub fn new(columns: Vec<Column>) -> ExecResult<Self> {
        let num_rows = columns.first().map(|c| c.len()).unwrap_or(0);

        let mut names = HashSet::with_capacity(columns.len());
        for col in &columns {
            if col.len() != num_rows {
                return Err(ExecError::schema_mismatch(format!(
                    "column '{}' has {} rows, expected {}",
                    col.name(),
                    col.len(),
                    num_rows
                )));
            }
            if !names.insert(col.name()) {
                return Err(ExecError::schema_mismatch(format!(
                    "duplicate column name '{}'",
                    col.name()
                )));
            }
        }

        Ok(Self { columns, num_rows })
    }

    /// Creates a zero-row block with the given schema
    pub fn empty(schema: &[ColumnDescriptor]) -> Self {
        Self {
            columns: schema.iter().cloned().map(Column::empty).collect(),
            num_rows: 0,
        }
    }

    /// Creates a block from row-major values
    pub fn from_rows(schema: &[ColumnDescriptor], rows: Vec<Vec<DataValue>>) -> ExecResult<Self> {
        let mut columns: Vec<Vec<DataValue>> = schema
            .iter()
            .map(|_| Vec::with_capacity(rows.len()))
            .collect();

        for (row_idx, row) in rows.into_iter().enumerate() {
            if row.len() != schema.len() {
                return Err(ExecError::schema_mismatch(format!(
                    "row {} has {} values, expected {}",
                    row_idx,
                    row.len(),
                    schema.len()
                )));
            }
            for (col, value) in columns.iter_mut().zip(row) {
                col.push(value);
            }
        }

        let columns = schema
            .iter()
            .cloned()
            .zip(columns)
            .map(|(desc, values)| Column::new(desc, values))
            .collect();
        Self::new(columns)
    }

    /// Concatenates blocks sharing one schema
    pub fn concat(blocks: &[BlockRef]) -> ExecResult<Self> {
        let Some(first) = blocks.first() else {
            return Ok(Self::empty(&[]));
        };
        let schema = first.schema();

        let total: usize = blocks.iter().map(|b| b.num_rows()).sum();
        let mut columns: Vec<Vec<DataValue>> =
            schema.iter().map(|_| Vec::with_capacity(total)).collect();

        for block in blocks {
            block.check_schema(&schema)?;
            for (values, col) in columns.iter_mut().zip(&block.columns) {
                values.extend(col.values().iter().cloned());
            }
        }

        let columns = schema
            .into_iter()
            .zip(columns)
            .map(|(desc, values)| Column::new(desc, values))
            .collect();
        Self::new(columns)
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the column descriptors in order
    pub fn schema(&self) -> Vec<ColumnDescriptor> {
        self.columns.iter().map(|c| c.descriptor().clone()).collect()
    }

    /// Fails with SchemaMismatch unless this block has exactly `schema`
    pub fn check_schema(&self, schema: &[ColumnDescriptor]) -> ExecResult<()> {
        let matches = self.columns.len() == schema.len()
            && self
                .columns
                .iter()
                .zip(schema)
                .all(|(col, desc)| col.descriptor() == desc);
        if matches {
            Ok(())
        } else {
            Err(ExecError::schema_mismatch(format!(
                "block schema [{}] does not match expected [{}]",
                join_descriptors(&self.schema()),
                join_descriptors(schema)
            )))
        }
    }

    /// Returns the column at `index`
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Returns the position of the named column
    pub fn column_index(&self, name: &str) -> ExecResult<usize> {
        self.columns
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| ExecError::column_not_found(name))
    }

    /// Returns the named column
    pub fn column_by_name(&self, name: &str) -> ExecResult<&Column> {
        let index = self.column_index(name)?;
        Ok(&self.columns[index])
    }

    /// Returns the value at (`row`, `column`)
    pub fn value(&self, row: usize, column: usize) -> Option<&DataValue> {
        self.columns.get(column).and_then(|c| c.get(row))
    }

    /// Returns one row as owned values
    pub fn row(&self, row: usize) -> Option<Vec<DataValue>> {
        if row >= self.num_rows {
            return None;
        }
        Some(
            self.columns
                .iter()
                .filter_map(|c| c.get(row).cloned())
                .collect(),
        )
    }

    /// Returns all rows as owned values
    pub fn rows(&self) -> Vec<Vec<DataValue>> {
        (0..self.num_rows).filter_map(|i| self.row(i)).collect()
    }

    /// Builds a block from the rows at `indices`, in order
    pub fn take(&self, indices: &[usize]) -> ExecResult<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.num_rows) {
            return Err(ExecError::execution(format!(
                "row index {} out of range for block of {} rows",
                bad, self.num_rows
            )));
        }
        Self::new(self.columns.iter().map(|c| c.take(indices)).collect())
    }

    /// Builds a block from a contiguous row range, clamped to the row count
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        let columns: Vec<Column> = self.columns.iter().map(|c| c.slice(offset, len)).collect();
        let num_rows = columns.first().map(|c| c.len()).unwrap_or(0);
        Self { columns, num_rows }
    }

    /// Builds a block with the named columns, in the given order
    pub fn project(&self, names: &[String]) -> ExecResult<Self> {
        let columns = names
            .iter()
            .map(|name| self.column_by_name(name).cloned())
            .collect::<ExecResult<Vec<_>>>()?;
        Self::new(columns)
    }
}

fn join_descriptors(schema: &[ColumnDescriptor]) -> String {
    schema
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
