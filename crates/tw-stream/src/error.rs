//! Error types for tw-stream

use thiserror::Error;
use tw_db::DbError;

/// Streaming errors
#[derive(Error, Debug)]
pub enum StreamError {
    /// Accumulated body exceeds the configured maximum (S001)
    #[error("[S001] Body exceeds the {limit} byte limit (reached at least {attempted} bytes)")]
    Oversize { limit: usize, attempted: usize },

    /// Accumulator used after it was abandoned (S002)
    #[error("[S002] Accumulation was abandoned after an earlier failure")]
    Abandoned,

    /// Inbound transport failed while reading (S003)
    #[error("[S003] Failed to read request body: {0}")]
    Source(String),

    /// Sink receiver went away (S004)
    #[error("[S004] Response sink closed")]
    SinkClosed,

    /// Sink rejected a write (S005)
    #[error("[S005] Response sink write failed: {0}")]
    SinkWrite(#[source] std::io::Error),

    /// Header declared twice on the same sink (S006)
    #[error("[S006] Response header already declared")]
    HeaderAlreadyDeclared,

    /// Pipe used after `end()` (S007)
    #[error("[S007] Pipe already ended")]
    PipeEnded,

    /// Leading frame set after data was written (S008)
    #[error("[S008] Leading frame must be set before the first write")]
    PipeStarted,

    /// Upstream query failed (S009)
    #[error("[S009] Result stream failed: {0}")]
    Query(#[from] DbError),

    /// Producer task failed to complete (S010)
    #[error("[S010] Result producer task failed: {0}")]
    Task(String),
}

/// Result type alias for StreamError
pub type StreamResult<T> = Result<T, StreamError>;
