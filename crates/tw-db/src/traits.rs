//! Database trait definition

use crate::error::DbResult;
use async_trait::async_trait;
use tw_core::{Frame, FrameFormat, SqlValue};

/// Database transport consumed by the migration engine and the result relay.
///
/// Implementations own a single logical connection. Transaction control is
/// explicit: callers pair every [`begin`](Database::begin) with exactly one
/// [`commit`](Database::commit) or [`rollback`](Database::rollback) and must
/// not interleave transactions from different tasks.
#[async_trait]
pub trait Database: Send + Sync {
    /// Execute multiple SQL statements
    async fn execute_batch(&self, sql: &str) -> DbResult<()>;

    /// Execute a parameterised statement, returns affected rows
    async fn execute_params(&self, sql: &str, params: &[SqlValue]) -> DbResult<usize>;

    /// Run a query and materialise every row
    async fn query_rows(&self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Vec<SqlValue>>>;

    /// Begin a transaction
    async fn begin(&self) -> DbResult<()>;

    /// Commit the open transaction
    async fn commit(&self) -> DbResult<()>;

    /// Roll back the open transaction
    async fn rollback(&self) -> DbResult<()>;

    /// Run a query without materialising its result.
    ///
    /// Calls `on_frame` with the leading frame, then once per row, in order.
    /// The leading frame is emitted even for an empty result. An error from
    /// `on_frame` stops the query and is returned unchanged. Blocks the
    /// calling thread; async callers run it on a blocking worker.
    fn stream_query(
        &self,
        sql: &str,
        format: FrameFormat,
        on_frame: &mut dyn FnMut(Frame) -> DbResult<()>,
    ) -> DbResult<()>;

    /// Database type identifier for logging
    fn db_type(&self) -> &'static str;
}
