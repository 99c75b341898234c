//! Presentation: cell formatting, status lines and terminal rendering.

pub mod format;
pub mod pagination;
pub mod sink;
pub mod table;

pub use format::{DisplayString, NULL_SENTINEL};
pub use pagination::PageInfo;
pub use sink::{DisplaySink, RecordingSink, SinkEvent};
pub use table::{ConsoleSink, TableDisplay};
