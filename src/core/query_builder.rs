//! Builds parameterized SELECT statements from browse state.
//!
//! Identifiers only ever come from the [`Catalog`]: a sort column the catalog
//! does not know is rejected, never passed through. User text reaches the
//! statement in exactly one place, the parenthesized predicate after `WHERE`,
//! and only after [`FilterSpec::parse`] has checked its shape.

use log::debug;

use crate::core::catalog::{Catalog, TableDescriptor};
use crate::engine::Statement;
use crate::error::QueryError;
use crate::utils::validation::validate_filter;

type Result<T> = std::result::Result<T, QueryError>;

/// Quote an identifier for SQLite, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            SortDirection::Ascending => "↑",
            SortDirection::Descending => "↓",
        }
    }
}

/// Sort order of a browse. `column: None` is natural (rowid) order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SortSpec {
    pub column: Option<String>,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn natural() -> Self {
        Self::default()
    }

    pub fn ascending(column: impl Into<String>) -> Self {
        Self {
            column: Some(column.into()),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(column: impl Into<String>) -> Self {
        Self {
            column: Some(column.into()),
            direction: SortDirection::Descending,
        }
    }

    pub fn is_natural(&self) -> bool {
        self.column.is_none()
    }

    pub fn is_ascending(&self) -> bool {
        self.direction == SortDirection::Ascending
    }

    /// Sorting the sorted column again flips it; any other column starts
    /// ascending.
    pub fn toggled_on(&self, column: &str) -> Self {
        match &self.column {
            Some(current) if current.eq_ignore_ascii_case(column) => Self {
                column: Some(current.clone()),
                direction: self.direction.toggled(),
            },
            _ => Self::ascending(column),
        }
    }
}

/// A validated WHERE predicate, or no predicate at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FilterSpec {
    predicate: Option<String>,
}

impl FilterSpec {
    pub fn none() -> Self {
        Self::default()
    }

    /// Validate user filter text. Blank text is the empty filter.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(Self {
            predicate: validate_filter(text)?,
        })
    }

    pub fn predicate(&self) -> Option<&str> {
        self.predicate.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.predicate.is_none()
    }
}

/// The unit of fetch, and the window cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowRequest {
    pub table: String,
    pub sort: SortSpec,
    pub filter: FilterSpec,
    pub offset: u64,
    pub limit: u32,
}

impl WindowRequest {
    pub fn new(table: impl Into<String>, offset: u64, limit: u32) -> Self {
        Self {
            table: table.into(),
            sort: SortSpec::natural(),
            filter: FilterSpec::none(),
            offset,
            limit,
        }
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_filter(mut self, filter: FilterSpec) -> Self {
        self.filter = filter;
        self
    }
}

/// Identifies one row of a browse for an on-demand full-value read.
#[derive(Debug, Clone, PartialEq)]
pub struct RowRef {
    pub table: String,
    pub sort: SortSpec,
    pub filter: FilterSpec,
    /// Absolute position of the row within the sorted, filtered result.
    pub position: u64,
    pub rowid: Option<i64>,
}

/// A browse statement plus the shape of what it returns.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub statement: Statement,
    pub columns: Vec<String>,
    /// Whether the first result column is the rowid.
    pub has_rowid: bool,
}

/// Build the statement for a window. Fetches `limit + 1` rows so the caller
/// can tell whether more rows follow without a separate count.
pub fn build(catalog: &Catalog, request: &WindowRequest) -> Result<BuiltQuery> {
    let table = catalog.table(&request.table)?;

    let mut projection: Vec<String> = Vec::with_capacity(table.columns.len() + 1);
    if let Some(alias) = table.rowid_alias {
        projection.push(alias.to_string());
    }
    projection.extend(table.columns.iter().map(|c| quote_identifier(&c.name)));

    let mut sql = format!(
        "SELECT {} FROM {}",
        projection.join(", "),
        quote_identifier(&table.name)
    );
    push_where(&mut sql, &request.filter);
    push_order_by(&mut sql, table, &request.sort)?;
    sql.push_str(" LIMIT ?1 OFFSET ?2");
    debug!("Built browse query: {}", sql);

    let statement = Statement::new(sql)
        .with_param(i64::from(request.limit) + 1)
        .with_param(offset_param(request.offset));

    Ok(BuiltQuery {
        statement,
        columns: table.column_names(),
        has_rowid: table.rowid_alias.is_some(),
    })
}

/// `COUNT(*)` of a table with an optional filter applied.
pub fn count(catalog: &Catalog, table: &str, filter: &FilterSpec) -> Result<Statement> {
    let table = catalog.table(table)?;
    let mut sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(&table.name));
    push_where(&mut sql, filter);
    Ok(Statement::new(sql))
}

/// Statement reading one complete cell. Uses the rowid when the row has one,
/// otherwise replays the browse ordering at the row's position.
pub fn full_cell(catalog: &Catalog, row: &RowRef, column: &str) -> Result<Statement> {
    let table = catalog.table(&row.table)?;
    let column = table
        .column(column)
        .ok_or_else(|| QueryError::InvalidColumn {
            table: table.name.clone(),
            column: column.to_string(),
        })?;

    let mut sql = format!(
        "SELECT {} FROM {}",
        quote_identifier(&column.name),
        quote_identifier(&table.name)
    );

    match (table.rowid_alias, row.rowid) {
        (Some(alias), Some(rowid)) => {
            sql.push_str(&format!(" WHERE {} = ?1", alias));
            Ok(Statement::new(sql).with_param(rowid))
        }
        _ => {
            push_where(&mut sql, &row.filter);
            push_order_by(&mut sql, table, &row.sort)?;
            sql.push_str(" LIMIT 1 OFFSET ?1");
            Ok(Statement::new(sql).with_param(offset_param(row.position)))
        }
    }
}

fn push_where(sql: &mut String, filter: &FilterSpec) {
    if let Some(predicate) = filter.predicate() {
        sql.push_str(&format!(" WHERE ({})", predicate));
    }
}

/// Deterministic order: the sort column, then rowid as tiebreaker in the same
/// direction. Natural order is rowid order when there is one.
fn push_order_by(sql: &mut String, table: &TableDescriptor, sort: &SortSpec) -> Result<()> {
    let mut terms = Vec::new();
    if let Some(name) = &sort.column {
        let column = table
            .column(name)
            .ok_or_else(|| QueryError::InvalidColumn {
                table: table.name.clone(),
                column: name.clone(),
            })?;
        terms.push(format!(
            "{} {}",
            quote_identifier(&column.name),
            sort.direction.keyword()
        ));
    }
    if let Some(alias) = table.rowid_alias {
        terms.push(format!("{} {}", alias, sort.direction.keyword()));
    }
    if !terms.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&terms.join(", "));
    }
    Ok(())
}

fn offset_param(offset: u64) -> i64 {
    i64::try_from(offset).unwrap_or(i64::MAX)
}
