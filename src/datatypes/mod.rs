//! Data type system
//!
//! A closed set of column types. Each type owns a total order over its
//! value domain, exposed as a comparator resolved once per column.
//! `DataValue::Null` is the null representation for every type.

mod types;
mod value;

pub use types::{CompareFn, DataType};
pub use value::DataValue;
