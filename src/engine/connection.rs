//! Read-only SQLite connection owned by the execution line.
//!
//! Every statement the browser issues goes through [`Database`], which maps
//! engine failures onto the crate error taxonomy and counts executions.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode, InterruptHandle, OpenFlags, params_from_iter};

use crate::Result;
use crate::engine::value::{CellValue, QueryResult};
use crate::error::{AppError, QueryError, SchemaError};
use crate::utils::validation::validate_database_path;

/// A SQL statement with bound parameters, ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }
}

/// How many bytes of text/blob content to copy into fetched cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sampling {
    pub text_bytes: usize,
    pub blob_bytes: usize,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            text_bytes: 1024,
            blob_bytes: 16,
        }
    }
}

/// What a statement was issued for; decides how engine errors are reported.
#[derive(Debug, Clone, Copy)]
pub enum ErrorContext<'a> {
    Schema,
    Browse { filter: Option<&'a str> },
    Lookup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Prepare,
    Step,
}

pub struct Database {
    path: PathBuf,
    conn: Option<Connection>,
    executions: u64,
}

impl Database {
    /// Validate the path and open the file read-only.
    pub fn open(path: &Path) -> Result<Self> {
        validate_database_path(path)?;

        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags).map_err(|e| {
            AppError::Schema(SchemaError::NotADatabase {
                path: path.display().to_string(),
                message: e.to_string(),
            })
        })?;
        debug!("Opened {} read-only", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            conn: Some(conn),
            executions: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Number of statements executed against the engine so far.
    pub fn executions(&self) -> u64 {
        self.executions
    }

    pub fn interrupt_handle(&self) -> Result<InterruptHandle> {
        Ok(self.conn()?.get_interrupt_handle())
    }

    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, err)) = conn.close() {
                warn!("Closing {} failed: {}", self.path.display(), err);
            }
        }
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or(AppError::Query(QueryError::ConnectionClosed))
    }

    /// Run `statement` and map each result row with `f`, stopping after
    /// `max_rows` rows when given.
    pub fn query_map<T, F>(
        &mut self,
        statement: &Statement,
        context: ErrorContext<'_>,
        max_rows: Option<usize>,
        mut f: F,
    ) -> Result<Vec<T>>
    where
        F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    {
        let path = self.path.clone();
        let conn = self.conn.as_ref().ok_or(QueryError::ConnectionClosed)?;
        debug!("Executing: {}", statement.sql);

        let mut stmt = conn
            .prepare_cached(&statement.sql)
            .map_err(|e| map_engine_error(e, Phase::Prepare, context, &path))?;
        self.executions += 1;

        let mut rows = stmt
            .query(params_from_iter(statement.params.iter()))
            .map_err(|e| map_engine_error(e, Phase::Step, context, &path))?;

        let mut out = Vec::new();
        while max_rows.is_none_or(|max| out.len() < max) {
            let next = rows
                .next()
                .map_err(|e| map_engine_error(e, Phase::Step, context, &path))?;
            let Some(row) = next else {
                break;
            };
            out.push(f(row).map_err(|e| map_engine_error(e, Phase::Step, context, &path))?);
        }
        Ok(out)
    }

    /// Run a statement expected to produce at most one row.
    pub fn query_one<T, F>(
        &mut self,
        statement: &Statement,
        context: ErrorContext<'_>,
        f: F,
    ) -> Result<Option<T>>
    where
        F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    {
        Ok(self
            .query_map(statement, context, Some(1), f)?
            .into_iter()
            .next())
    }

    /// Whether `sql` compiles against the current schema. Does not execute it.
    pub fn prepares(&self, sql: &str) -> Result<bool> {
        Ok(self.conn()?.prepare(sql).is_ok())
    }

    /// Execute one user-supplied statement.
    ///
    /// Engine failures come back as [`QueryResult::Error`]; only a closed
    /// connection or an interrupt is reported as `Err`.
    pub fn execute_adhoc(
        &mut self,
        sql: &str,
        max_rows: usize,
        sampling: Sampling,
    ) -> Result<QueryResult> {
        let conn = self.conn.as_ref().ok_or(QueryError::ConnectionClosed)?;

        let mut stmt = match conn.prepare(sql) {
            Ok(stmt) => stmt,
            Err(err) => return adhoc_error(err),
        };
        self.executions += 1;

        let column_count = stmt.column_count();
        if column_count == 0 {
            return match stmt.execute([]) {
                Ok(rows_affected) => Ok(QueryResult::Status {
                    rows_affected: rows_affected as u64,
                }),
                Err(err) => adhoc_error(err),
            };
        }

        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut rows_iter = match stmt.query([]) {
            Ok(rows) => rows,
            Err(err) => return adhoc_error(err),
        };

        let mut rows = Vec::new();
        let mut truncated = false;
        loop {
            let row = match rows_iter.next() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(err) => return adhoc_error(err),
            };
            if rows.len() == max_rows {
                truncated = true;
                break;
            }
            let mut cells = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                match row.get_ref(idx) {
                    Ok(value) => cells.push(CellValue::sample(
                        value,
                        sampling.text_bytes,
                        sampling.blob_bytes,
                    )),
                    Err(err) => return adhoc_error(err),
                }
            }
            rows.push(cells);
        }

        let row_count = rows.len() as u64;
        Ok(QueryResult::Rows {
            columns,
            rows,
            row_count,
            truncated,
        })
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.close();
    }
}

fn is_interrupt(err: &rusqlite::Error) -> bool {
    err.sqlite_error_code() == Some(ErrorCode::OperationInterrupted)
}

fn adhoc_error(err: rusqlite::Error) -> Result<QueryResult> {
    if is_interrupt(&err) {
        return Err(QueryError::Cancelled.into());
    }
    Ok(QueryResult::Error {
        message: engine_message(&err),
    })
}

fn engine_message(err: &rusqlite::Error) -> String {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => message.clone(),
        other => other.to_string(),
    }
}

fn map_engine_error(
    err: rusqlite::Error,
    phase: Phase,
    context: ErrorContext<'_>,
    path: &Path,
) -> AppError {
    if is_interrupt(&err) {
        return QueryError::Cancelled.into();
    }

    let message = engine_message(&err);
    match context {
        ErrorContext::Schema => match err.sqlite_error_code() {
            Some(ErrorCode::NotADatabase) => SchemaError::NotADatabase {
                path: path.display().to_string(),
                message,
            }
            .into(),
            Some(ErrorCode::DatabaseCorrupt) => SchemaError::Corrupt {
                path: path.display().to_string(),
                message,
            }
            .into(),
            _ => SchemaError::LoadFailed { message }.into(),
        },
        ErrorContext::Browse {
            filter: Some(filter),
        } if phase == Phase::Prepare => QueryError::FilterSyntax {
            filter: filter.to_string(),
            message,
        }
        .into(),
        ErrorContext::Browse { .. } | ErrorContext::Lookup => {
            QueryError::Execution { message }.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_db;

    #[test]
    fn test_open_missing_file_fails_fast() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = Database::open(&dir.path().join("missing.db"));
        assert!(matches!(
            result,
            Err(AppError::Cli(crate::error::CliError::DatabaseNotFound { .. }))
        ));
    }

    #[test]
    fn test_query_map_counts_executions() {
        let fixture = sample_db();
        let mut db = Database::open(fixture.path()).expect("open");
        assert_eq!(db.executions(), 0);

        let names = db
            .query_map(
                &Statement::new("SELECT name FROM users ORDER BY id"),
                ErrorContext::Lookup,
                None,
                |row| row.get::<_, String>(0),
            )
            .expect("query");
        assert_eq!(names.len(), 5);
        assert_eq!(names[0], "Alice");
        assert_eq!(db.executions(), 1);
    }

    #[test]
    fn test_query_map_respects_max_rows() {
        let fixture = sample_db();
        let mut db = Database::open(fixture.path()).expect("open");
        let ids = db
            .query_map(
                &Statement::new("SELECT id FROM users WHERE id > ?1").with_param(1i64),
                ErrorContext::Lookup,
                Some(2),
                |row| row.get::<_, i64>(0),
            )
            .expect("query");
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_prepare_failure_with_filter_is_filter_syntax() {
        let fixture = sample_db();
        let mut db = Database::open(fixture.path()).expect("open");
        let err = db
            .query_map(
                &Statement::new("SELECT * FROM users WHERE (nosuchcol > 1)"),
                ErrorContext::Browse {
                    filter: Some("nosuchcol > 1"),
                },
                None,
                |row| row.get::<_, i64>(0),
            )
            .expect_err("should fail");
        assert!(matches!(err, AppError::Query(QueryError::FilterSyntax { .. })));
    }

    #[test]
    fn test_closed_connection_rejects_queries() {
        let fixture = sample_db();
        let mut db = Database::open(fixture.path()).expect("open");
        db.close();
        assert!(!db.is_open());

        let err = db
            .query_map(
                &Statement::new("SELECT 1"),
                ErrorContext::Lookup,
                None,
                |row| row.get::<_, i64>(0),
            )
            .expect_err("closed");
        assert!(matches!(err, AppError::Query(QueryError::ConnectionClosed)));
        assert!(matches!(
            db.execute_adhoc("SELECT 1", 10, Sampling::default()),
            Err(AppError::Query(QueryError::ConnectionClosed))
        ));
    }

    #[test]
    fn test_adhoc_rows_and_truncation() {
        let fixture = sample_db();
        let mut db = Database::open(fixture.path()).expect("open");

        let result = db
            .execute_adhoc("SELECT name FROM users ORDER BY id", 3, Sampling::default())
            .expect("adhoc");
        match result {
            QueryResult::Rows {
                columns,
                rows,
                row_count,
                truncated,
            } => {
                assert_eq!(columns, vec!["name".to_string()]);
                assert_eq!(rows.len(), 3);
                assert_eq!(row_count, 3);
                assert!(truncated);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_adhoc_runtime_error_is_error_shape() {
        let fixture = sample_db();
        let mut db = Database::open(fixture.path()).expect("open");

        let result = db
            .execute_adhoc(
                "SELECT abs(-9223372036854775807 - 1)",
                10,
                Sampling::default(),
            )
            .expect("adhoc");
        match result {
            QueryResult::Error { message } => assert!(message.contains("integer overflow")),
            other => panic!("unexpected result: {:?}", other),
        }

        let result = db
            .execute_adhoc("SELEC * FROM users", 10, Sampling::default())
            .expect("adhoc");
        assert!(matches!(result, QueryResult::Error { .. }));
    }

    #[test]
    fn test_adhoc_write_is_rejected_read_only() {
        let fixture = sample_db();
        let mut db = Database::open(fixture.path()).expect("open");

        let result = db
            .execute_adhoc(
                "INSERT INTO users (name, email, age) VALUES ('T', 't@t', 1)",
                10,
                Sampling::default(),
            )
            .expect("adhoc");
        match result {
            QueryResult::Error { message } => assert!(message.contains("readonly")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_adhoc_statement_without_result_set() {
        let fixture = sample_db();
        let mut db = Database::open(fixture.path()).expect("open");

        let result = db
            .execute_adhoc("PRAGMA cache_size = 100", 10, Sampling::default())
            .expect("adhoc");
        assert_eq!(result, QueryResult::Status { rows_affected: 0 });
    }
}
