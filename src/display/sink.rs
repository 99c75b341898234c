//! The effects the browsing core produces toward a user interface.

use crate::core::catalog::Catalog;
use crate::core::fetch::RowWindow;
use crate::display::pagination::PageInfo;
use crate::engine::{FullValue, QueryResult};
use crate::error::ErrorKind;

/// Consumer of rendered state. The session calls these and nothing else.
pub trait DisplaySink {
    fn render_rows(&mut self, window: &RowWindow, page: &PageInfo);
    fn render_schema(&mut self, catalog: &Catalog);
    fn render_query_result(&mut self, result: &QueryResult);
    fn render_error(&mut self, kind: ErrorKind, message: &str);

    /// Informational messages such as "Query cancelled".
    fn render_status(&mut self, _message: &str) {}

    fn render_cell_detail(&mut self, column: &str, value: &FullValue);
}

/// One call made on a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Rows { window: RowWindow, status: String },
    Schema { version: u64, objects: usize },
    QueryResult(QueryResult),
    Error { kind: ErrorKind, message: String },
    Status(String),
    CellDetail { column: String, value: FullValue },
}

/// Sink that records every call. Used by headless drivers and tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<SinkEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every window rendered so far, oldest first.
    pub fn windows(&self) -> Vec<&RowWindow> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Rows { window, .. } => Some(window),
                _ => None,
            })
            .collect()
    }

    pub fn last_window(&self) -> Option<&RowWindow> {
        self.windows().into_iter().last()
    }

    pub fn errors(&self) -> Vec<(ErrorKind, &str)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Error { kind, message } => Some((*kind, message.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn query_results(&self) -> Vec<&QueryResult> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::QueryResult(result) => Some(result),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl DisplaySink for RecordingSink {
    fn render_rows(&mut self, window: &RowWindow, page: &PageInfo) {
        self.events.push(SinkEvent::Rows {
            window: window.clone(),
            status: page.status_line(),
        });
    }

    fn render_schema(&mut self, catalog: &Catalog) {
        self.events.push(SinkEvent::Schema {
            version: catalog.version(),
            objects: catalog.objects().len(),
        });
    }

    fn render_query_result(&mut self, result: &QueryResult) {
        self.events.push(SinkEvent::QueryResult(result.clone()));
    }

    fn render_error(&mut self, kind: ErrorKind, message: &str) {
        self.events.push(SinkEvent::Error {
            kind,
            message: message.to_string(),
        });
    }

    fn render_status(&mut self, message: &str) {
        self.events.push(SinkEvent::Status(message.to_string()));
    }

    fn render_cell_detail(&mut self, column: &str, value: &FullValue) {
        self.events.push(SinkEvent::CellDetail {
            column: column.to_string(),
            value: value.clone(),
        });
    }
}
