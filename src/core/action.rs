//! User input the session reacts to.
//!
//! The front end turns keys, clicks or command-line arguments into these;
//! the session turns them into view-state changes and requests.

use crate::core::coordinator::Tab;

#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    /// Show the schema tree
    ShowSchema,

    /// Start browsing a table or view
    SelectTable(String),

    /// Scroll the browse to the page containing this row position
    ScrollTo(u64),

    NextPage,
    PreviousPage,
    FirstPage,
    /// Only possible once the total row count is known
    LastPage,

    /// Sort by a column, or flip the direction if it is already sorted
    ToggleSort(String),

    /// Back to natural order
    ClearSort,

    /// Apply WHERE-fragment filter text; blank clears the filter
    SubmitFilter(String),

    /// Run one ad-hoc statement
    SubmitSql(String),

    /// Move the selection within the current window
    Select { row: u64, column: usize },

    /// Open the complete value of a cell (absolute row position)
    ViewCell { row: u64, column: String },

    /// Cancel whatever the tab is running
    Cancel(Tab),

    /// Reload the schema and drop cached windows
    Refresh,
}

impl UserAction {
    /// Whether this action changes the sort or filter of the browse.
    pub fn changes_generation(&self) -> bool {
        matches!(
            self,
            UserAction::ToggleSort(_) | UserAction::ClearSort | UserAction::SubmitFilter(_)
        )
    }
}
