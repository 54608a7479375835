//! DuckDB database backend implementation

use crate::error::{DbError, DbResult};
use crate::traits::Database;
use async_trait::async_trait;
use duckdb::types::Value;
use duckdb::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tw_core::{Frame, FrameFormat, SqlValue};

/// DuckDB database backend
pub struct DuckDbBackend {
    conn: Mutex<Connection>,
}

impl DuckDbBackend {
    /// Create a new in-memory DuckDB connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create a new DuckDB connection from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{e}: {}", path.display())))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }

    /// Execute batch SQL synchronously
    fn execute_batch_sync(&self, sql: &str) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(sql).map_err(DbError::from)
    }

    fn execute_params_sync(&self, sql: &str, params: &[SqlValue]) -> DbResult<usize> {
        let conn = self.lock()?;
        let values: Vec<Value> = params.iter().map(to_duckdb).collect();
        conn.execute(sql, duckdb::params_from_iter(values))
            .map_err(|e| DbError::ExecutionError(format!("{e}: {sql}")))
    }

    fn query_rows_sync(&self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Vec<SqlValue>>> {
        let conn = self.lock()?;
        let values: Vec<Value> = params.iter().map(to_duckdb).collect();
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(duckdb::params_from_iter(values))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(read_row(row)?);
        }
        Ok(out)
    }

    fn transaction_control(&self, operation: &str, sql: &str) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(sql)
            .map_err(|e| DbError::TransactionError {
                operation: operation.to_string(),
                message: e.to_string(),
            })
    }

    /// Open a second connection to the same database for streaming reads so
    /// a long-running stream does not hold the primary connection's lock.
    fn stream_connection(&self) -> DbResult<Connection> {
        let conn = self.lock()?;
        conn.try_clone()
            .map_err(|e| DbError::ConnectionError(format!("failed to clone connection: {e}")))
    }
}

#[async_trait]
impl Database for DuckDbBackend {
    async fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.execute_batch_sync(sql)
    }

    async fn execute_params(&self, sql: &str, params: &[SqlValue]) -> DbResult<usize> {
        self.execute_params_sync(sql, params)
    }

    async fn query_rows(&self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Vec<SqlValue>>> {
        self.query_rows_sync(sql, params)
    }

    async fn begin(&self) -> DbResult<()> {
        self.transaction_control("BEGIN", "BEGIN TRANSACTION")
    }

    async fn commit(&self) -> DbResult<()> {
        self.transaction_control("COMMIT", "COMMIT")
    }

    async fn rollback(&self) -> DbResult<()> {
        self.transaction_control("ROLLBACK", "ROLLBACK")
    }

    fn stream_query(
        &self,
        sql: &str,
        format: FrameFormat,
        on_frame: &mut dyn FnMut(Frame) -> DbResult<()>,
    ) -> DbResult<()> {
        let conn = self.stream_connection()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;

        let mut leading_sent = false;
        let mut row_count = 0usize;
        while let Some(row) = rows.next()? {
            if !leading_sent {
                on_frame(format.leading_frame(&column_names(row.as_ref())))?;
                leading_sent = true;
            }
            on_frame(format.row_frame(&read_row(row)?))?;
            row_count += 1;
        }
        drop(rows);

        // Empty result: column metadata is only readable once the
        // statement has executed.
        if !leading_sent {
            on_frame(format.leading_frame(&column_names(&stmt)))?;
        }
        log::debug!("Streamed {row_count} rows as {format}");
        Ok(())
    }

    fn db_type(&self) -> &'static str {
        "duckdb"
    }
}

fn column_names(stmt: &duckdb::Statement<'_>) -> Vec<String> {
    (0..stmt.column_count())
        .map(|i| {
            stmt.column_name(i)
                .map_or("?".to_string(), |v| v.to_string())
        })
        .collect()
}

fn read_row(row: &duckdb::Row<'_>) -> DbResult<Vec<SqlValue>> {
    let column_count = row.as_ref().column_count();
    (0..column_count)
        .map(|i| row.get::<_, Value>(i).map(from_duckdb).map_err(DbError::from))
        .collect()
}

fn to_duckdb(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(b) => Value::Boolean(*b),
        SqlValue::Integer(n) => Value::BigInt(*n),
        SqlValue::Real(f) => Value::Double(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Blob(b) => Value::Blob(b.clone()),
    }
}

fn from_duckdb(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Boolean(b) => SqlValue::Bool(b),
        Value::TinyInt(n) => SqlValue::Integer(n.into()),
        Value::SmallInt(n) => SqlValue::Integer(n.into()),
        Value::Int(n) => SqlValue::Integer(n.into()),
        Value::BigInt(n) => SqlValue::Integer(n),
        Value::UTinyInt(n) => SqlValue::Integer(n.into()),
        Value::USmallInt(n) => SqlValue::Integer(n.into()),
        Value::UInt(n) => SqlValue::Integer(n.into()),
        Value::HugeInt(n) => i64::try_from(n).map_or_else(|_| SqlValue::Text(n.to_string()), SqlValue::Integer),
        Value::UBigInt(n) => i64::try_from(n).map_or_else(|_| SqlValue::Text(n.to_string()), SqlValue::Integer),
        Value::Float(f) => SqlValue::Real(f.into()),
        Value::Double(f) => SqlValue::Real(f),
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(b) => SqlValue::Blob(b),
        other => SqlValue::Text(format!("{other:?}")),
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
