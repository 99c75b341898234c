//! Per-table browse state.
//!
//! Only the session mutates it. Every sort or filter change bumps the
//! generation exactly once; windows fetched under an older generation are
//! never shown.

use crate::core::query_builder::{FilterSpec, RowRef, SortSpec, WindowRequest};
use crate::utils::data::page_start;

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    table: String,
    sort: SortSpec,
    filter: FilterSpec,
    scroll_offset: u64,
    selected_row: Option<u64>,
    selected_column: usize,
    generation: u64,
}

impl ViewState {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            sort: SortSpec::natural(),
            filter: FilterSpec::none(),
            scroll_offset: 0,
            selected_row: None,
            selected_column: 0,
            generation: 0,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn sort(&self) -> &SortSpec {
        &self.sort
    }

    pub fn filter(&self) -> &FilterSpec {
        &self.filter
    }

    pub fn scroll_offset(&self) -> u64 {
        self.scroll_offset
    }

    pub fn selected_row(&self) -> Option<u64> {
        self.selected_row
    }

    pub fn selected_column(&self) -> usize {
        self.selected_column
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The window to fetch for the current state.
    pub fn request(&self, limit: u32) -> WindowRequest {
        WindowRequest {
            table: self.table.clone(),
            sort: self.sort.clone(),
            filter: self.filter.clone(),
            offset: self.scroll_offset,
            limit,
        }
    }

    /// Reference to the row at `position` under the current sort and filter.
    pub fn row_ref(&self, position: u64, rowid: Option<i64>) -> RowRef {
        RowRef {
            table: self.table.clone(),
            sort: self.sort.clone(),
            filter: self.filter.clone(),
            position,
            rowid,
        }
    }

    /// Replace the sort. Returns whether anything changed.
    pub fn set_sort(&mut self, sort: SortSpec) -> bool {
        if sort == self.sort {
            return false;
        }
        self.sort = sort;
        self.reset_position();
        true
    }

    /// Replace the filter. Returns whether anything changed.
    pub fn set_filter(&mut self, filter: FilterSpec) -> bool {
        if filter == self.filter {
            return false;
        }
        self.filter = filter;
        self.reset_position();
        true
    }

    /// Put back a sort and filter that are known to work.
    pub fn revert(&mut self, sort: SortSpec, filter: FilterSpec, offset: u64) {
        self.sort = sort;
        self.filter = filter;
        self.generation += 1;
        self.scroll_offset = offset;
        self.selected_row = None;
    }

    /// Move to the page containing `offset`.
    pub fn scroll_to(&mut self, offset: u64, page_size: u32) {
        self.scroll_offset = page_start(offset, page_size);
    }

    pub fn select(&mut self, row: Option<u64>, column: usize) {
        self.selected_row = row;
        self.selected_column = column;
    }

    fn reset_position(&mut self) {
        self.generation += 1;
        self.scroll_offset = 0;
        self.selected_row = None;
    }
}
