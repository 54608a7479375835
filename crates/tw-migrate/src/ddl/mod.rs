//! Storage layout for the migration ledger and audit log.
//!
//! Everything lives in the `tw_meta` schema and is created idempotently at
//! the start of every migration transaction.

/// Schema holding the ledger tables.
pub const META_SCHEMA: &str = "tw_meta";

/// One row per target: the current position and the name of the step at it.
pub const LEDGER_TABLE: &str = "tw_meta.migration_ledger";

/// Append-only record of every applied step.
pub const AUDIT_TABLE: &str = "tw_meta.migration_audit";

/// Idempotent DDL creating the ledger, the audit log, and its id sequence.
pub const LEDGER_DDL: &str = include_str!("ledger.sql");
