//! Column descriptors and column vectors

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::datatypes::{DataType, DataValue};

/// Name + data type of one column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

impl fmt::Display for ColumnDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.data_type)
    }
}

/// A typed column of values.
///
/// Values are shared, so cloning a column never copies its data.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    descriptor: ColumnDescriptor,
    values: Arc<Vec<DataValue>>,
}

impl Column {
    pub fn new(descriptor: ColumnDescriptor, values: Vec<DataValue>) -> Self {
        Self {
            descriptor,
            values: Arc::new(values),
        }
    }

    /// Creates an empty column
    pub fn empty(descriptor: ColumnDescriptor) -> Self {
        Self::new(descriptor, Vec::new())
    }

    pub fn descriptor(&self) -> &ColumnDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn data_type(&self) -> DataType {
        self.descriptor.data_type
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the value at `row`
    pub fn get(&self, row: usize) -> Option<&DataValue> {
        self.values.get(row)
    }

    pub fn values(&self) -> &[DataValue] {
        &self.values
    }

    /// Builds a new column from the rows at `indices`, in order
    pub fn take(&self, indices: &[usize]) -> Column {
        let values = indices
            .iter()
            .filter_map(|&i| self.values.get(i).cloned())
            .collect();
        Column::new(self.descriptor.clone(), values)
    }

    /// Builds a new column from a contiguous row range
    pub fn slice(&self, offset: usize, len: usize) -> Column {
        let start = offset.min(self.values.len());
        let end = offset.saturating_add(len).min(self.values.len());
        Column::new(self.descriptor.clone(), self.values[start..end].to_vec())
    }
}
