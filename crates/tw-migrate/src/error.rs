//! Error types for the migration engine.

use thiserror::Error;
use tw_db::DbError;

/// Migration errors.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Numeric target outside `[-1, latest]` (G002).
    #[error("[G002] Migration target {index} is out of range [-1, {latest}]")]
    TargetOutOfRange { index: i64, latest: i64 },

    /// Ledger records more steps than the configured set holds (G003).
    #[error("[G003] Ledger for '{target_id}' is at position {index} but only {available} steps are configured")]
    LedgerAhead {
        target_id: String,
        index: i64,
        available: usize,
    },

    /// A ledger or audit row could not be decoded (G005).
    #[error("[G005] Malformed migration ledger data: {0}")]
    CorruptLedger(String),

    /// Database error, including a failing step's change, passed through as
    /// the driver reported it (G006).
    #[error("[G006] {0}")]
    Db(#[from] DbError),
}

/// Result type alias for [`MigrateError`].
pub type MigrateResult<T> = Result<T, MigrateError>;
