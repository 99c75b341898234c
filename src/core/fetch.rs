//! Paged fetch engine.
//!
//! Owns the connection, the catalog and the window cache. It lives on the
//! coordinator's execution line; nothing else touches the connection.

use std::path::Path;
use std::time::Instant;

use log::{debug, info};
use rusqlite::InterruptHandle;

use crate::Result;
use crate::core::cache::{CacheStats, WindowCache};
use crate::core::catalog::{Catalog, RowCount};
use crate::core::query_builder::{self, FilterSpec, RowRef, WindowRequest};
use crate::engine::{CellValue, Database, ErrorContext, FullValue, QueryResult, Row, Sampling};
use crate::error::QueryError;
use crate::storage::config::{RowCountStrategy, Settings};

/// A bounded slice of a browse result.
#[derive(Debug, Clone, PartialEq)]
pub struct RowWindow {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    /// Position of the first row within the full result.
    pub offset: u64,
    /// View generation this window was fetched for.
    pub generation: u64,
    /// Whether rows exist past the end of this window.
    pub has_more: bool,
}

impl RowWindow {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position one past the last row.
    pub fn end(&self) -> u64 {
        self.offset + self.rows.len() as u64
    }

    /// Row at an absolute position, if this window holds it.
    pub fn row_at(&self, position: u64) -> Option<&Row> {
        let index = position.checked_sub(self.offset)?;
        self.rows.get(usize::try_from(index).ok()?)
    }
}

pub struct FetchEngine {
    db: Database,
    catalog: Catalog,
    cache: WindowCache,
    page_size: u32,
    sampling: Sampling,
    sql_max_rows: usize,
    row_count_strategy: RowCountStrategy,
}

impl FetchEngine {
    /// Open `path` read-only and load its catalog.
    pub fn open(path: &Path, settings: &Settings) -> Result<Self> {
        let db = Database::open(path)?;
        Self::new(db, settings)
    }

    pub fn new(mut db: Database, settings: &Settings) -> Result<Self> {
        let catalog = Catalog::load(&mut db, 1)?;
        Ok(Self {
            db,
            catalog,
            cache: WindowCache::new(settings.cache_windows),
            page_size: settings.page_size.max(1),
            sampling: Sampling {
                text_bytes: settings.text_sample_bytes,
                blob_bytes: settings.blob_preview_bytes,
            },
            sql_max_rows: settings.sql_max_rows,
            row_count_strategy: settings.row_count,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Statements executed against the connection so far.
    pub fn executions(&self) -> u64 {
        self.db.executions()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn interrupt_handle(&self) -> Result<InterruptHandle> {
        self.db.interrupt_handle()
    }

    /// Fetch one window, from the cache when possible.
    ///
    /// The limit is clamped to the page size. An offset past the end yields
    /// an empty window.
    pub fn fetch(&mut self, request: &WindowRequest, generation: u64) -> Result<RowWindow> {
        if !self.db.is_open() {
            return Err(QueryError::ConnectionClosed.into());
        }

        let mut request = request.clone();
        request.limit = request.limit.min(self.page_size);

        if let Some(mut window) = self.cache.get(&request) {
            debug!(
                "Cache hit: {} @{} (+{})",
                request.table, request.offset, request.limit
            );
            window.generation = generation;
            return Ok(window);
        }

        let built = query_builder::build(&self.catalog, &request)?;
        let first_cell = usize::from(built.has_rowid);
        let width = built.columns.len();
        let sampling = self.sampling;

        let mut rows = self.db.query_map(
            &built.statement,
            ErrorContext::Browse {
                filter: request.filter.predicate(),
            },
            None,
            |row| {
                let rowid = if built.has_rowid {
                    row.get::<_, Option<i64>>(0)?
                } else {
                    None
                };
                let mut cells = Vec::with_capacity(width);
                for idx in first_cell..first_cell + width {
                    cells.push(CellValue::sample(
                        row.get_ref(idx)?,
                        sampling.text_bytes,
                        sampling.blob_bytes,
                    ));
                }
                Ok(Row { rowid, cells })
            },
        )?;

        let limit = request.limit as usize;
        let has_more = rows.len() > limit;
        rows.truncate(limit);
        debug!(
            "Cache miss: {} @{} fetched {} rows (more: {})",
            request.table,
            request.offset,
            rows.len(),
            has_more
        );

        let window = RowWindow {
            table: self.catalog.table(&request.table)?.name.clone(),
            columns: built.columns,
            rows,
            offset: request.offset,
            generation,
            has_more,
        };

        self.cache.put(request, window.clone());
        Ok(window)
    }

    /// Read one complete cell value.
    pub fn fetch_full(&mut self, row: &RowRef, column: &str) -> Result<FullValue> {
        let statement = query_builder::full_cell(&self.catalog, row, column)?;
        let value = self
            .db
            .query_one(&statement, ErrorContext::Lookup, |r| {
                Ok(FullValue::from_ref(r.get_ref(0)?))
            })?;
        value.ok_or_else(|| {
            QueryError::Execution {
                message: format!("row {} of {} no longer exists", row.position + 1, row.table),
            }
            .into()
        })
    }

    /// Total rows for the status line. A filtered browse is only counted
    /// under the exact strategy.
    pub fn row_count(&mut self, table: &str, filter: &FilterSpec) -> Result<RowCount> {
        if filter.is_empty() {
            return self
                .catalog
                .row_count_estimate(&mut self.db, table, self.row_count_strategy);
        }
        if self.row_count_strategy != RowCountStrategy::Exact {
            return Ok(RowCount::Unknown);
        }

        let statement = query_builder::count(&self.catalog, table, filter)?;
        let count = self.db.query_one(
            &statement,
            ErrorContext::Browse {
                filter: filter.predicate(),
            },
            |r| r.get::<_, i64>(0),
        )?;
        Ok(RowCount::Exact(count.unwrap_or(0).max(0) as u64))
    }

    /// Run one ad-hoc statement. Engine failures come back as
    /// [`QueryResult::Error`].
    pub fn execute_sql(&mut self, sql: &str) -> Result<QueryResult> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Ok(QueryResult::Error {
                message: "No SQL to execute".to_string(),
            });
        }

        let started = Instant::now();
        let result = self
            .db
            .execute_adhoc(sql, self.sql_max_rows, self.sampling)?;
        info!(
            "SQL finished in {:.1}ms: {}",
            started.elapsed().as_secs_f64() * 1000.0,
            result.summary()
        );
        Ok(result)
    }

    /// Forget cached windows of one table.
    pub fn invalidate_table(&mut self, table: &str) -> usize {
        let dropped = self.cache.invalidate_table(table);
        debug!("Invalidated {} cached windows of {}", dropped, table);
        dropped
    }

    /// Reload the catalog under the next schema version and drop all cached
    /// windows.
    pub fn refresh(&mut self) -> Result<&Catalog> {
        let version = self.catalog.version() + 1;
        self.catalog = Catalog::load(&mut self.db, version)?;
        self.cache.clear();
        Ok(&self.catalog)
    }

    pub fn close(&mut self) {
        self.cache.clear();
        self.db.close();
    }
}
