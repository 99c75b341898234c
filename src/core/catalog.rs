//! Schema catalog: tables, views, indices and triggers of the open file.
//!
//! Loaded once per connection (and again on explicit refresh). Everything the
//! query builder splices into a statement as an identifier comes from here.

use log::{debug, info, warn};

use crate::Result;
use crate::core::query_builder::quote_identifier;
use crate::engine::{Database, ErrorContext, Statement};
use crate::error::{AppError, QueryError, SchemaError};
use crate::storage::config::RowCountStrategy;

/// Names SQLite accepts for the implicit rowid, in order of preference.
const ROWID_ALIASES: [&str; 3] = ["rowid", "_rowid_", "oid"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Table,
    View,
    Index,
    Trigger,
}

impl ObjectKind {
    fn from_master_type(kind: &str) -> Option<Self> {
        match kind {
            "table" => Some(ObjectKind::Table),
            "view" => Some(ObjectKind::View),
            "index" => Some(ObjectKind::Index),
            "trigger" => Some(ObjectKind::Trigger),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ObjectKind::Table => "table",
            ObjectKind::View => "view",
            ObjectKind::Index => "index",
            ObjectKind::Trigger => "trigger",
        }
    }

    /// Tables and views can be paged through.
    pub fn is_browsable(&self) -> bool {
        matches!(self, ObjectKind::Table | ObjectKind::View)
    }
}

/// One row of `sqlite_master`.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaObject {
    pub kind: ObjectKind,
    pub name: String,
    /// Table the object belongs to; equal to `name` for tables and views.
    pub tbl_name: String,
    /// Defining SQL. `None` for automatically created indices.
    pub sql: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub declared_type: String,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDescriptor {
    pub name: String,
    pub kind: ObjectKind,
    pub columns: Vec<ColumnDescriptor>,
    /// Name under which the implicit rowid can be selected, if any.
    pub rowid_alias: Option<&'static str>,
    pub schema_version: u64,
}

impl TableDescriptor {
    /// Case-insensitive lookup, matching how SQLite resolves column names.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Total row count as far as it is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCount {
    Exact(u64),
    Estimated(u64),
    Unknown,
}

impl RowCount {
    pub fn value(&self) -> Option<u64> {
        match self {
            RowCount::Exact(n) | RowCount::Estimated(n) => Some(*n),
            RowCount::Unknown => None,
        }
    }
}

/// A table or view whose columns could not be read, such as a view over a
/// dropped table or a virtual table whose module is not compiled in.
#[derive(Debug, Clone, PartialEq)]
pub struct Unreadable {
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    version: u64,
    objects: Vec<SchemaObject>,
    tables: Vec<TableDescriptor>,
    unreadable: Vec<Unreadable>,
}

impl Catalog {
    /// Enumerate every schema object and describe the browsable ones.
    ///
    /// Fails with a `SchemaError` when the file is not a usable database.
    pub fn load(db: &mut Database, version: u64) -> Result<Self> {
        let master = Statement::new(
            "SELECT type, name, tbl_name, sql FROM sqlite_master \
             WHERE name NOT LIKE 'sqlite\\_%' ESCAPE '\\' ORDER BY name",
        );
        let rows = db.query_map(&master, ErrorContext::Schema, None, |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let objects: Vec<SchemaObject> = rows
            .into_iter()
            .filter_map(|(kind, name, tbl_name, sql)| {
                ObjectKind::from_master_type(&kind).map(|kind| SchemaObject {
                    kind,
                    name,
                    tbl_name,
                    sql,
                })
            })
            .collect();

        let mut tables = Vec::new();
        let mut unreadable = Vec::new();
        for object in objects.iter().filter(|o| o.kind.is_browsable()) {
            match describe(db, object, version) {
                Ok(descriptor) => tables.push(descriptor),
                // one broken object must not hide the rest of the file
                Err(AppError::Schema(SchemaError::LoadFailed { message })) => {
                    warn!("Skipping {} {}: {}", object.kind.label(), object.name, message);
                    unreadable.push(Unreadable {
                        name: object.name.clone(),
                        message,
                    });
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            "Loaded schema v{}: {} objects, {} browsable, {} unreadable",
            version,
            objects.len(),
            tables.len(),
            unreadable.len()
        );

        Ok(Self {
            version,
            objects,
            tables,
            unreadable,
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn objects(&self) -> &[SchemaObject] {
        &self.objects
    }

    /// Browsable objects (tables and views), sorted by name.
    pub fn browsable(&self) -> &[TableDescriptor] {
        &self.tables
    }

    pub fn unreadable(&self) -> &[Unreadable] {
        &self.unreadable
    }

    pub fn tables(&self) -> impl Iterator<Item = &SchemaObject> {
        self.of_kind(ObjectKind::Table)
    }

    pub fn views(&self) -> impl Iterator<Item = &SchemaObject> {
        self.of_kind(ObjectKind::View)
    }

    pub fn indices(&self) -> impl Iterator<Item = &SchemaObject> {
        self.of_kind(ObjectKind::Index)
    }

    pub fn triggers(&self) -> impl Iterator<Item = &SchemaObject> {
        self.of_kind(ObjectKind::Trigger)
    }

    fn of_kind(&self, kind: ObjectKind) -> impl Iterator<Item = &SchemaObject> {
        self.objects.iter().filter(move |o| o.kind == kind)
    }

    /// Descriptor for a browsable object. Unknown names give `InvalidTable`;
    /// objects whose columns could not be read give `Execution`.
    pub fn table(&self, name: &str) -> std::result::Result<&TableDescriptor, QueryError> {
        if let Some(descriptor) = self
            .tables
            .iter()
            .find(|t| t.name == name)
            .or_else(|| self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name)))
        {
            return Ok(descriptor);
        }

        match self
            .unreadable
            .iter()
            .find(|u| u.name.eq_ignore_ascii_case(name))
        {
            Some(broken) => Err(QueryError::Execution {
                message: format!("cannot read '{}': {}", broken.name, broken.message),
            }),
            None => Err(QueryError::InvalidTable {
                table: name.to_string(),
            }),
        }
    }

    /// Column of a browsable object, or `InvalidTable`/`InvalidColumn`.
    pub fn column(
        &self,
        table: &str,
        column: &str,
    ) -> std::result::Result<&ColumnDescriptor, QueryError> {
        let descriptor = self.table(table)?;
        descriptor
            .column(column)
            .ok_or_else(|| QueryError::InvalidColumn {
                table: descriptor.name.clone(),
                column: column.to_string(),
            })
    }

    /// Stored `CREATE ...` text of any schema object.
    pub fn definition(&self, name: &str) -> Option<&str> {
        self.objects
            .iter()
            .find(|o| o.name.eq_ignore_ascii_case(name))
            .and_then(|o| o.sql.as_deref())
    }

    /// Indices and triggers attached to `table`.
    pub fn dependents(&self, table: &str) -> Vec<&SchemaObject> {
        self.objects
            .iter()
            .filter(|o| {
                matches!(o.kind, ObjectKind::Index | ObjectKind::Trigger)
                    && o.tbl_name.eq_ignore_ascii_case(table)
            })
            .collect()
    }

    /// Row count for sizing the scrollbar, using the configured strategy.
    ///
    /// The estimate reads `sqlite_stat1` when `ANALYZE` has been run, then
    /// `max(rowid)`, and otherwise reports `Unknown`.
    pub fn row_count_estimate(
        &self,
        db: &mut Database,
        table: &str,
        strategy: RowCountStrategy,
    ) -> Result<RowCount> {
        let descriptor = self.table(table)?;
        let quoted = quote_identifier(&descriptor.name);

        match strategy {
            RowCountStrategy::None => Ok(RowCount::Unknown),
            RowCountStrategy::Exact => {
                let stmt = Statement::new(format!("SELECT COUNT(*) FROM {}", quoted));
                let count = db.query_one(&stmt, ErrorContext::Lookup, |row| row.get::<_, i64>(0))?;
                Ok(RowCount::Exact(count.unwrap_or(0).max(0) as u64))
            }
            RowCountStrategy::Estimate => {
                if descriptor.kind != ObjectKind::Table {
                    return Ok(RowCount::Unknown);
                }

                if db.prepares("SELECT tbl, stat FROM sqlite_stat1")? {
                    let stmt = Statement::new("SELECT stat FROM sqlite_stat1 WHERE tbl = ?1")
                        .with_param(descriptor.name.clone());
                    let stat = db.query_one(&stmt, ErrorContext::Lookup, |row| {
                        row.get::<_, Option<String>>(0)
                    })?;
                    if let Some(n) = stat
                        .flatten()
                        .and_then(|s| s.split_whitespace().next()?.parse::<u64>().ok())
                    {
                        debug!("Row estimate for {} from sqlite_stat1: {}", table, n);
                        return Ok(RowCount::Estimated(n));
                    }
                }

                if let Some(alias) = descriptor.rowid_alias {
                    let stmt = Statement::new(format!("SELECT max({}) FROM {}", alias, quoted));
                    let max = db.query_one(&stmt, ErrorContext::Lookup, |row| {
                        row.get::<_, Option<i64>>(0)
                    })?;
                    let estimate = max.flatten().unwrap_or(0).max(0) as u64;
                    debug!("Row estimate for {} from max(rowid): {}", table, estimate);
                    return Ok(RowCount::Estimated(estimate));
                }

                Ok(RowCount::Unknown)
            }
        }
    }
}

fn describe(db: &mut Database, object: &SchemaObject, version: u64) -> Result<TableDescriptor> {
    let columns = load_columns(db, &object.name)?;
    let rowid_alias = match object.kind {
        ObjectKind::Table => detect_rowid_alias(db, &object.name, &columns)?,
        _ => None,
    };
    Ok(TableDescriptor {
        name: object.name.clone(),
        kind: object.kind,
        columns,
        rowid_alias,
        schema_version: version,
    })
}

fn load_columns(db: &mut Database, table: &str) -> Result<Vec<ColumnDescriptor>> {
    let stmt = Statement::new(
        "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid",
    )
    .with_param(table.to_string());

    db.query_map(&stmt, ErrorContext::Schema, None, |row| {
        Ok(ColumnDescriptor {
            name: row.get(0)?,
            declared_type: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            nullable: row.get::<_, i64>(2)? == 0,
            default_value: row.get(3)?,
            is_primary_key: row.get::<_, i64>(4)? > 0,
        })
    })
}

/// First rowid alias not shadowed by a real column that the engine accepts.
/// `WITHOUT ROWID` and virtual tables end up with `None`.
fn detect_rowid_alias(
    db: &mut Database,
    table: &str,
    columns: &[ColumnDescriptor],
) -> Result<Option<&'static str>> {
    let Some(alias) = ROWID_ALIASES
        .into_iter()
        .find(|alias| !columns.iter().any(|c| c.name.eq_ignore_ascii_case(alias)))
    else {
        return Ok(None);
    };

    let probe = format!("SELECT {} FROM {} LIMIT 0", alias, quote_identifier(table));
    Ok(db.prepares(&probe)?.then_some(alias))
}
