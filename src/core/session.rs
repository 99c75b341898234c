//! Interactive controller.
//!
//! The session owns every table's [`ViewState`], turns [`UserAction`]s into
//! coordinator requests, and applies the answers as they arrive. Requests run
//! on spawned tasks that report back over a channel, so `dispatch` never
//! waits on the database. A result is rendered only if it still answers the
//! current generation of the active table.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::mpsc;

use crate::core::action::UserAction;
use crate::core::catalog::{Catalog, RowCount};
use crate::core::coordinator::{Coordinator, Delivery, Tab};
use crate::core::fetch::{FetchEngine, RowWindow};
use crate::core::query_builder::{FilterSpec, SortSpec};
use crate::core::view_state::ViewState;
use crate::display::pagination::PageInfo;
use crate::display::sink::DisplaySink;
use crate::engine::{FullValue, QueryResult};
use crate::error::{AppError, QueryError};
use crate::storage::config::Settings;
use crate::utils::data::page_start;
use crate::{Result, utils};

/// Answer to a request, sent back from the task that awaited it.
#[derive(Debug)]
pub enum Completion {
    Window {
        table: String,
        generation: u64,
        /// Row count under the filter it was taken for.
        count: Option<(FilterSpec, Result<RowCount>)>,
        result: Result<Delivery<RowWindow>>,
    },
    Sql(Result<Delivery<QueryResult>>),
    Cell {
        column: String,
        result: Result<FullValue>,
    },
    Schema(Result<Catalog>),
}

/// The last state of a table that produced a window.
#[derive(Debug, Clone)]
struct GoodState {
    sort: SortSpec,
    filter: FilterSpec,
    offset: u64,
    total: RowCount,
}

#[derive(Debug)]
struct TableView {
    state: ViewState,
    displayed: Option<RowWindow>,
    last_good: Option<GoodState>,
    total: RowCount,
    /// Filter `total` was counted under.
    counted: Option<FilterSpec>,
    high_water: u64,
}

impl TableView {
    fn new(table: &str) -> Self {
        Self {
            state: ViewState::new(table),
            displayed: None,
            last_good: None,
            total: RowCount::Unknown,
            counted: None,
            high_water: 0,
        }
    }

    /// The displayed window, if it belongs to the current generation.
    fn current_window(&self) -> Option<&RowWindow> {
        self.displayed
            .as_ref()
            .filter(|w| w.generation == self.state.generation())
    }

    fn page_info(&self, window: &RowWindow, page_size: u32) -> PageInfo {
        PageInfo {
            page_size,
            offset: window.offset,
            shown: window.len(),
            has_more: window.has_more,
            total: self.total,
            high_water: self.high_water,
            sort: self.state.sort().clone(),
            filter: self.state.filter().predicate().map(str::to_string),
        }
    }
}

pub struct Session<S> {
    coordinator: Coordinator,
    sink: S,
    settings: Settings,
    catalog: Catalog,
    views: HashMap<String, TableView>,
    active: Option<String>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    pending: usize,
}

impl<S: DisplaySink> Session<S> {
    /// Open `path` read-only and start the execution line.
    pub fn open(path: &Path, settings: Settings, sink: S) -> Result<Self> {
        let engine = FetchEngine::open(path, &settings)?;
        let catalog = engine.catalog().clone();
        let coordinator =
            Coordinator::start(engine, Duration::from_millis(settings.sql_timeout_ms))?;
        info!("Opened {}", path.display());
        Ok(Self::new(coordinator, catalog, settings, sink))
    }

    pub fn new(coordinator: Coordinator, catalog: Catalog, settings: Settings, sink: S) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            coordinator,
            sink,
            settings,
            catalog,
            views: HashMap::new(),
            active: None,
            completions_tx,
            completions_rx,
            pending: 0,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn active_table(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn view(&self, table: &str) -> Option<&ViewState> {
        self.views.get(table).map(|v| &v.state)
    }

    /// Window currently on screen for `table`.
    pub fn displayed(&self, table: &str) -> Option<&RowWindow> {
        self.views.get(table).and_then(|v| v.displayed.as_ref())
    }

    pub fn total(&self, table: &str) -> Option<RowCount> {
        self.views.get(table).map(|v| v.total)
    }

    /// Requests sent but not yet applied.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// React to one user action. Only fatal errors are returned; everything
    /// else is reported through the sink.
    pub fn dispatch(&mut self, action: UserAction) -> Result<()> {
        debug!("Dispatch {:?}", action);
        let resets_view = action.changes_generation();
        let before = self.active_generation();
        self.handle(action)?;

        if resets_view && self.active_generation() != before {
            if let Some(table) = self.active.clone() {
                self.coordinator.invalidate_table(&table)?;
                self.request_window(&table)?;
            }
        }
        Ok(())
    }

    fn handle(&mut self, action: UserAction) -> Result<()> {
        match action {
            UserAction::ShowSchema => {
                self.sink.render_schema(&self.catalog);
                Ok(())
            }
            UserAction::SelectTable(name) => self.select_table(&name),
            UserAction::ScrollTo(offset) => self.scroll_to(offset),
            UserAction::NextPage
            | UserAction::PreviousPage
            | UserAction::FirstPage
            | UserAction::LastPage => self.navigate(&action),
            UserAction::ToggleSort(column) => self.toggle_sort(&column),
            UserAction::ClearSort => self.change_sort(SortSpec::natural()),
            UserAction::SubmitFilter(text) => self.submit_filter(&text),
            UserAction::SubmitSql(sql) => self.submit_sql(sql),
            UserAction::Select { row, column } => {
                if let Some(view) = self.active_view_mut() {
                    view.state.select(Some(row), column);
                }
                Ok(())
            }
            UserAction::ViewCell { row, column } => self.view_cell(row, &column),
            UserAction::Cancel(tab) => {
                self.coordinator.cancel(tab);
                self.sink.render_status(match tab {
                    Tab::Browse => "Browse request cancelled",
                    Tab::Sql => "Query cancelled",
                });
                Ok(())
            }
            UserAction::Refresh => {
                let queued = self.coordinator.refresh()?;
                self.spawn(async move { Completion::Schema(queued.wait().await) });
                Ok(())
            }
        }
    }

    /// Apply every outstanding answer, then return.
    pub async fn run_until_idle(&mut self) -> Result<()> {
        while self.pending > 0 {
            let Some(completion) = self.completions_rx.recv().await else {
                break;
            };
            self.pending -= 1;
            self.apply(completion)?;
        }
        Ok(())
    }

    /// Wait for the next answer without applying it.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        if self.pending == 0 {
            return None;
        }
        let completion = self.completions_rx.recv().await;
        if completion.is_some() {
            self.pending -= 1;
        }
        completion
    }

    /// Apply one answer to the view state and render it if still current.
    pub fn apply(&mut self, completion: Completion) -> Result<()> {
        match completion {
            Completion::Window {
                table,
                generation,
                count,
                result,
            } => self.apply_window(&table, generation, count, result),
            Completion::Sql(result) => match result {
                Ok(Delivery::Completed(result)) => {
                    self.sink.render_query_result(&result);
                    Ok(())
                }
                Ok(Delivery::Superseded) => {
                    debug!("Discarding superseded SQL result");
                    Ok(())
                }
                Err(err) => self.report(err),
            },
            Completion::Cell { column, result } => match result {
                Ok(value) => {
                    self.sink.render_cell_detail(&column, &value);
                    Ok(())
                }
                Err(err) => self.report(err),
            },
            Completion::Schema(result) => match result {
                Ok(catalog) => self.apply_catalog(catalog),
                Err(err) => self.report(err),
            },
        }
    }

    /// Stop the execution line and close the connection.
    pub async fn close(&mut self) -> Result<()> {
        self.coordinator.close().await
    }

    fn spawn<F>(&mut self, task: F)
    where
        F: std::future::Future<Output = Completion> + Send + 'static,
    {
        let tx = self.completions_tx.clone();
        self.pending += 1;
        tokio::spawn(async move {
            let _ = tx.send(task.await);
        });
    }

    /// Fatal errors end the session; the rest become an inline message.
    fn report(&mut self, err: AppError) -> Result<()> {
        if err.is_fatal() {
            return Err(err);
        }
        match err {
            AppError::Query(QueryError::Cancelled) => self.sink.render_status("Query cancelled"),
            err => {
                debug!("Reporting {:?}: {}", err.kind(), err);
                self.sink.render_error(err.kind(), &err.display_friendly());
            }
        }
        Ok(())
    }

    fn active_generation(&self) -> Option<u64> {
        let table = self.active.as_ref()?;
        self.views.get(table).map(|v| v.state.generation())
    }

    fn active_view_mut(&mut self) -> Option<&mut TableView> {
        let table = self.active.as_ref()?;
        self.views.get_mut(table)
    }

    fn require_active(&mut self) -> Option<String> {
        if self.active.is_none() {
            self.sink.render_status("No table selected");
        }
        self.active.clone()
    }

    /// Queue the window for the table's current state, counting rows first
    /// when the filter changed since the last count.
    fn request_window(&mut self, table: &str) -> Result<()> {
        let Some(view) = self.views.get_mut(table) else {
            return Ok(());
        };
        let generation = view.state.generation();
        let request = view.state.request(self.settings.page_size);

        let count = if view.counted.as_ref() != Some(view.state.filter()) {
            let filter = view.state.filter().clone();
            view.counted = Some(filter.clone());
            let queued = self
                .coordinator
                .row_count(table.to_string(), filter.clone())?;
            Some((filter, queued))
        } else {
            None
        };
        let pending = self.coordinator.fetch(request, generation)?;

        let table = table.to_string();
        self.spawn(async move {
            let count = match count {
                Some((filter, queued)) => Some((filter, queued.wait().await)),
                None => None,
            };
            Completion::Window {
                table,
                generation,
                count,
                result: pending.wait().await,
            }
        });
        Ok(())
    }

    fn select_table(&mut self, name: &str) -> Result<()> {
        let table = match self.catalog.table(name) {
            Ok(descriptor) => descriptor.name.clone(),
            Err(err) => return self.report(err.into()),
        };
        self.views
            .entry(table.clone())
            .or_insert_with(|| TableView::new(&table));
        self.active = Some(table.clone());
        self.request_window(&table)
    }

    fn scroll_to(&mut self, offset: u64) -> Result<()> {
        let Some(table) = self.require_active() else {
            return Ok(());
        };
        let page_size = self.settings.page_size;
        if let Some(view) = self.views.get_mut(&table) {
            view.state.scroll_to(offset, page_size);
        }
        self.request_window(&table)
    }

    fn navigate(&mut self, action: &UserAction) -> Result<()> {
        let Some(table) = self.require_active() else {
            return Ok(());
        };
        let page_size = self.settings.page_size;
        let Some(view) = self.views.get(&table) else {
            return Ok(());
        };

        let page = view.current_window().map(|w| view.page_info(w, page_size));
        let offset = view.state.scroll_offset();
        let target = match action {
            UserAction::FirstPage => Some(0),
            UserAction::NextPage => match &page {
                Some(page) => page.next_offset(),
                None => Some(offset + u64::from(page_size)),
            },
            UserAction::PreviousPage => {
                (offset > 0).then(|| offset.saturating_sub(u64::from(page_size)))
            }
            UserAction::LastPage => match &page {
                Some(page) => page.last_offset(),
                None => view
                    .total
                    .value()
                    .map(|total| page_start(total.saturating_sub(1), page_size)),
            },
            _ => None,
        };

        match target {
            Some(target) => self.scroll_to(target),
            None => {
                self.sink.render_status(match action {
                    UserAction::LastPage => "Total row count unknown",
                    UserAction::PreviousPage => "Already at the first page",
                    _ => "No more rows",
                });
                Ok(())
            }
        }
    }

    fn toggle_sort(&mut self, column: &str) -> Result<()> {
        let Some(table) = self.require_active() else {
            return Ok(());
        };
        let column = match self.catalog.column(&table, column) {
            Ok(descriptor) => descriptor.name.clone(),
            Err(err) => return self.report(err.into()),
        };
        let Some(view) = self.views.get(&table) else {
            return Ok(());
        };
        let sort = view.state.sort().toggled_on(&column);
        self.change_sort(sort)
    }

    fn change_sort(&mut self, sort: SortSpec) -> Result<()> {
        let Some(table) = self.require_active() else {
            return Ok(());
        };
        if let Some(view) = self.views.get_mut(&table) {
            view.state.set_sort(sort);
        }
        Ok(())
    }

    fn submit_filter(&mut self, text: &str) -> Result<()> {
        let Some(table) = self.require_active() else {
            return Ok(());
        };
        // rejected before the generation moves, so the current window stays
        let filter = match FilterSpec::parse(text) {
            Ok(filter) => filter,
            Err(err) => return self.report(err.into()),
        };
        if let Some(view) = self.views.get_mut(&table) {
            if view.state.set_filter(filter) {
                view.high_water = 0;
            }
        }
        Ok(())
    }

    fn submit_sql(&mut self, sql: String) -> Result<()> {
        let pending = self.coordinator.execute_sql(sql)?;
        self.spawn(async move { Completion::Sql(pending.wait().await) });
        Ok(())
    }

    fn view_cell(&mut self, row: u64, column: &str) -> Result<()> {
        let Some(table) = self.require_active() else {
            return Ok(());
        };
        let (column, index) = match self.catalog.table(&table) {
            Ok(descriptor) => match descriptor.column_index(column) {
                Some(index) => (descriptor.columns[index].name.clone(), index),
                None => {
                    let err = QueryError::InvalidColumn {
                        table: descriptor.name.clone(),
                        column: column.to_string(),
                    };
                    return self.report(err.into());
                }
            },
            Err(err) => return self.report(err.into()),
        };
        let Some(view) = self.views.get_mut(&table) else {
            return Ok(());
        };

        let rowid = view
            .current_window()
            .and_then(|w| w.row_at(row))
            .and_then(|r| r.rowid);
        let row_ref = view.state.row_ref(row, rowid);
        view.state.select(Some(row), index);

        let queued = self.coordinator.fetch_full(row_ref, column.clone())?;
        self.spawn(async move {
            Completion::Cell {
                column,
                result: queued.wait().await,
            }
        });
        Ok(())
    }

    fn apply_window(
        &mut self,
        table: &str,
        generation: u64,
        count: Option<(FilterSpec, Result<RowCount>)>,
        result: Result<Delivery<RowWindow>>,
    ) -> Result<()> {
        let page_size = self.settings.page_size;
        let is_active = self.active.as_deref() == Some(table);
        let Some(view) = self.views.get_mut(table) else {
            return Ok(());
        };
        // a count stays valid across sort changes, so it may outlive its window
        if let Some((filter, count)) = count {
            if &filter == view.state.filter() {
                match count {
                    Ok(total) => view.total = total,
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(err) => {
                        debug!("Row count of {} unavailable: {}", table, err);
                        view.total = RowCount::Unknown;
                    }
                }
            }
        }
        if generation != view.state.generation() {
            debug!(
                "Discarding {} window of generation {} (current {})",
                table,
                generation,
                view.state.generation()
            );
            return Ok(());
        }

        match result {
            Ok(Delivery::Completed(window)) => {
                if window.offset != view.state.scroll_offset() {
                    debug!("Discarding {} window at stale offset {}", table, window.offset);
                    return Ok(());
                }
                view.high_water = view.high_water.max(window.end());
                view.last_good = Some(GoodState {
                    sort: view.state.sort().clone(),
                    filter: view.state.filter().clone(),
                    offset: window.offset,
                    total: view.total,
                });
                let page = view.page_info(&window, page_size);
                if is_active {
                    self.sink.render_rows(&window, &page);
                }
                view.displayed = Some(window);
                Ok(())
            }
            Ok(Delivery::Superseded) => {
                debug!("Discarding superseded {} window", table);
                Ok(())
            }
            Err(err) if err.is_fatal() => Err(err),
            Err(AppError::Query(QueryError::Cancelled)) => {
                debug!("{} window cancelled", table);
                Ok(())
            }
            Err(err) => {
                // go back to the last state that produced a window
                let rejected = (view.state.sort().clone(), view.state.filter().clone());
                let mut refetch = false;
                match view.last_good.clone() {
                    Some(good) if (good.sort.clone(), good.filter.clone()) != rejected => {
                        view.state.revert(good.sort, good.filter.clone(), good.offset);
                        view.total = good.total;
                        view.counted = Some(good.filter);
                        let generation = view.state.generation();
                        if let Some(window) = view.displayed.as_mut() {
                            window.generation = generation;
                        }
                    }
                    None if !rejected.1.is_empty() => {
                        view.state.revert(rejected.0, FilterSpec::none(), 0);
                        refetch = true;
                    }
                    _ => {}
                }
                self.report(err)?;
                if refetch {
                    self.request_window(table)?;
                }
                Ok(())
            }
        }
    }

    fn apply_catalog(&mut self, catalog: Catalog) -> Result<()> {
        info!("Schema refreshed (v{})", catalog.version());
        self.views
            .retain(|name, _| catalog.table(name).is_ok());
        for (name, view) in self.views.iter_mut() {
            view.counted = None;
            view.high_water = 0;
            let sort_gone = view
                .state
                .sort()
                .column
                .as_ref()
                .is_some_and(|column| catalog.column(name, column).is_err());
            if sort_gone {
                view.state.set_sort(SortSpec::natural());
            }
        }
        self.catalog = catalog;

        if let Some(active) = self.active.clone() {
            if !self.views.contains_key(&active) {
                self.active = None;
                self.sink
                    .render_status(&format!("{} no longer exists", active));
            }
        }
        self.sink.render_schema(&self.catalog);

        match self.active.clone() {
            Some(active) => self.request_window(&active),
            None => Ok(()),
        }
    }
}

/// Number of rows a status line would claim for a window, for scripted use.
pub fn describe_window(window: &RowWindow) -> String {
    format!(
        "{} rows from {} at offset {}",
        utils::data::format_number(window.len() as u64),
        window.table,
        utils::data::format_number(window.offset)
    )
}
