//! Engine layer: the SQLite handle and the value types it produces.

pub mod connection;
pub mod value;

pub use connection::{Database, ErrorContext, Sampling, Statement};
pub use value::{CellValue, FullValue, QueryResult, Row};
