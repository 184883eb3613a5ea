//! Table file input and JSON-lines output
//!
//! - Input: one JSON object holding the schema and the rows
//! - Output: one JSON object per row, keys in column order
//! - UTF-8 only

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::errors::{CliError, CliResult};
use crate::datablocks::{ColumnDescriptor, DataBlock};

/// On-disk table format
#[derive(Debug, Deserialize)]
struct TableFile {
    columns: Vec<ColumnDescriptor>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

/// Parses a table document into blocks of at most `block_rows` rows
pub fn parse_table(json: &str, block_rows: usize) -> CliResult<Vec<DataBlock>> {
    let table: TableFile = serde_json::from_str(json)?;
    let width = table.columns.len();

    let mut rows = Vec::with_capacity(table.rows.len());
    for (i, row) in table.rows.into_iter().enumerate() {
        if row.len() != width {
            return Err(CliError::invalid_input(format!(
                "row {} has {} values, expected {}",
                i,
                row.len(),
                width
            )));
        }
        let values = table
            .columns
            .iter()
            .zip(&row)
            .map(|(column, json)| column.data_type.value_from_json(json))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CliError::invalid_input(format!("row {}: {}", i, e)))?;
        rows.push(values);
    }

    let mut blocks = Vec::new();
    let mut remaining = rows.into_iter().peekable();
    while remaining.peek().is_some() {
        let chunk: Vec<_> = remaining.by_ref().take(block_rows.max(1)).collect();
        blocks.push(
            DataBlock::from_rows(&table.columns, chunk)
                .map_err(|e| CliError::invalid_input(e.to_string()))?,
        );
    }
    Ok(blocks)
}

/// Reads and parses a table file
pub fn read_table(path: &Path, block_rows: usize) -> CliResult<Vec<DataBlock>> {
    let content = fs::read_to_string(path)
        .map_err(|e| CliError::io_error(format!("Failed to read {}: {}", path.display(), e)))?;
    parse_table(&content, block_rows)
}

/// Renders every row of `block` as a JSON object keyed by column name.
/// Keys keep the block's column order.
pub fn block_to_json(block: &DataBlock) -> Vec<Value> {
    (0..block.num_rows())
        .map(|row| {
            let mut object = Map::new();
            for (col, column) in block.columns().iter().enumerate() {
                let value = block.value(row, col).map(|v| v.to_json()).unwrap_or(Value::Null);
                object.insert(column.name().to_string(), value);
            }
            Value::Object(object)
        })
        .collect()
}

/// Writes every row of `block` to `out` as JSON lines
pub fn write_block<W: Write>(out: &mut W, block: &DataBlock) -> CliResult<()> {
    for row in block_to_json(block) {
        serde_json::to_writer(&mut *out, &row)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}
