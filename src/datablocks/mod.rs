//! Columnar data blocks
//!
//! A `DataBlock` is an immutable batch of typed columns sharing one row
//! count. Blocks travel through the pipeline as `BlockRef` (`Arc<DataBlock>`)
//! and are shared read-only by every consumer.

mod block;
mod column;

pub use block::{BlockRef, DataBlock};
pub use column::{Column, ColumnDescriptor};
